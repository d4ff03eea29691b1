//! Connection to the GPU search appliance.
//!
//! One synchronous TCP connection, one in-flight request. Large query
//! batches are paged through the appliance in sub-batches so that a single
//! request never exceeds what the GPU can hold, with progress reported via
//! `log`.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::matrix::{Matrix, QueryResults};
use crate::protocol::{
    self, Command, LoadDatasetBody, Metric, QueryFromFileBody, Request, Response, Status, MAX_K,
};
use std::fmt;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Default number of query vectors per request.
pub const DEFAULT_BATCH_SIZE: usize = 128;

/// Timing breakdown of the most recent client operation.
///
/// `server` is time spent on the appliance; the difference between `client`
/// (wall clock for the whole call) and `server` is network and framing
/// overhead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timings {
    /// Total time reported by the appliance.
    pub server: Duration,
    /// Total elapsed time observed by the client.
    pub client: Duration,
}

impl Timings {
    /// Network and framing overhead (client minus server time).
    #[must_use]
    pub fn overhead(&self) -> Duration {
        self.client.saturating_sub(self.server)
    }
}

fn fmt_scaled(f: &mut fmt::Formatter<'_>, label: &str, d: Duration, scale: Duration) -> fmt::Result {
    if scale < Duration::from_secs(1) {
        write!(f, "  {label:>11}: {:.0} ms", d.as_secs_f64() * 1000.0)
    } else if scale < Duration::from_secs(120) {
        write!(f, "  {label:>11}: {:.1} sec", d.as_secs_f64())
    } else {
        write!(f, "  {label:>11}: {:.1} min", d.as_secs_f64() / 60.0)
    }
}

impl fmt::Display for Timings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timing breakdown:")?;
        fmt_scaled(f, "server time", self.server, self.server)?;
        writeln!(f)?;
        fmt_scaled(f, "overhead", self.overhead(), self.server)?;
        writeln!(f)?;
        fmt_scaled(f, "total", self.client, self.server)
    }
}

/// Client for the GPU k-NN search appliance.
///
/// After a non-success response status the appliance considers the session
/// poisoned; the client shuts the socket down and every later call fails
/// with [`Error::Closed`].
pub struct GpuClient {
    stream: Option<TcpStream>,
    api_key: String,
    batch_size: usize,
    timings: Timings,
}

impl GpuClient {
    /// Connect to the appliance.
    pub fn open(host: &str, port: u16, api_key: &str) -> Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        log::debug!("connected to {host}:{port}");
        Ok(Self {
            stream: Some(stream),
            api_key: api_key.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            timings: Timings::default(),
        })
    }

    /// Connect using a full [`ClientConfig`] (timeouts, batch size).
    pub fn open_with_config(config: &ClientConfig) -> Result<Self> {
        let addr = (config.host.as_str(), config.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::NotFound(format!("no address for host {}", config.host)))?;
        let stream = match config.connect_timeout() {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_nodelay(true)?;
        stream.set_read_timeout(config.read_timeout())?;
        stream.set_write_timeout(config.read_timeout())?;
        log::debug!("connected to {}:{}", config.host, config.port);
        let mut client = Self {
            stream: Some(stream),
            api_key: config.api_key.clone(),
            batch_size: DEFAULT_BATCH_SIZE,
            timings: Timings::default(),
        };
        client.set_batch_size(config.batch_size)?;
        Ok(client)
    }

    /// Number of query vectors sent per request in [`GpuClient::query`].
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Change the client-side query batch size.
    pub fn set_batch_size(&mut self, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(Error::InvalidParameter("batch size must be nonzero".into()));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    /// Timing breakdown of the most recent operation.
    #[must_use]
    pub fn timings(&self) -> Timings {
        self.timings
    }

    /// Close the connection.
    pub fn close(mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream.shutdown(Shutdown::Both)?;
        }
        Ok(())
    }

    /// Ask the appliance to load a dataset file from its disk into GPU
    /// memory.
    ///
    /// `dataset_name` selects the dataset within an HDF5 file and is ignored
    /// for flat vector files.
    pub fn load_dataset_file(
        &mut self,
        file_name: &str,
        dataset_name: &str,
        metric: Metric,
    ) -> Result<()> {
        let t0 = Instant::now();
        let req = Request::new(Command::LoadDatasetFile, &self.api_key).with_json(
            &LoadDatasetBody {
                file_name: file_name.to_string(),
                dataset_name: dataset_name.to_string(),
                metric: metric.as_wire().to_string(),
            },
        )?;
        let resp = self.request(&req)?;
        self.timings = Timings {
            server: resp.elapsed(),
            client: t0.elapsed(),
        };
        Ok(())
    }

    /// k-NN search for a single query vector.
    pub fn query_one(&mut self, vector: &[f32], k: usize) -> Result<QueryResults> {
        self.query(&Matrix::from_row(vector), k)
    }

    /// k-NN search for a batch of query vectors, one per row.
    ///
    /// The batch is paged through the appliance [`GpuClient::batch_size`]
    /// rows at a time. Returned matrices have one row per query vector and
    /// one column per neighbor; server time accumulates across sub-batches.
    pub fn query(&mut self, vectors: &Matrix<f32>, k: usize) -> Result<QueryResults> {
        check_k(k)?;
        if vectors.is_empty() {
            return Err(Error::InvalidParameter("query batch is empty".into()));
        }

        let t0 = Instant::now();
        self.timings = Timings::default();
        let total = vectors.rows();
        let mut server = Duration::ZERO;
        let mut accumulated: Option<QueryResults> = None;

        let mut start = 0;
        while start < total {
            let end = (start + self.batch_size).min(total);
            if start > 0 {
                let per_query = t0.elapsed().as_secs_f64() / start as f64;
                log::info!(
                    "query {start}/{total} ({:.0}%), about {} remaining",
                    start as f64 / total as f64 * 100.0,
                    fmt_eta(per_query * (total - start) as f64),
                );
            }

            let batch = vectors.slice_rows(start, end)?;
            let req = Request::new(Command::Query, &self.api_key)
                .with_k(k as u32)
                .with_vectors(&batch);
            let resp = self.request(&req)?;
            server += resp.elapsed();

            let results = protocol::unpack_results(&resp.body)?;
            if results.num_queries() != end - start {
                self.poison();
                return Err(Error::Format(format!(
                    "appliance returned {} result rows for a {} vector batch",
                    results.num_queries(),
                    end - start
                )));
            }
            match &mut accumulated {
                None => accumulated = Some(results),
                Some(acc) => acc.append(&results)?,
            }
            start = end;
        }

        self.timings = Timings {
            server,
            client: t0.elapsed(),
        };
        // Loop ran at least once: total > 0.
        Ok(accumulated.expect("nonempty batch produced results"))
    }

    /// k-NN search over a query-vector file already on the appliance disk.
    ///
    /// Used to build a full neighbor graph of a dataset without shipping the
    /// vectors over the network; the appliance pages through the file
    /// `batch_size` rows at a time.
    pub fn query_from_file(
        &mut self,
        file_name: &str,
        dataset_name: &str,
        k: usize,
        batch_size: usize,
    ) -> Result<QueryResults> {
        check_k(k)?;
        if batch_size == 0 {
            return Err(Error::InvalidParameter("batch size must be nonzero".into()));
        }

        let t0 = Instant::now();
        let req = Request::new(Command::QueryFromFile, &self.api_key).with_json(
            &QueryFromFileBody {
                file_name: file_name.to_string(),
                dataset_name: dataset_name.to_string(),
                k: k as u32,
                batch_size: batch_size as u32,
            },
        )?;
        let resp = self.request(&req)?;
        let results = protocol::unpack_results(&resp.body)?;
        self.timings = Timings {
            server: resp.elapsed(),
            client: t0.elapsed(),
        };
        Ok(results)
    }

    /// Send one request and read its response.
    ///
    /// Any framing error or non-success status poisons the connection.
    fn request(&mut self, req: &Request) -> Result<Response> {
        let stream = self.stream.as_mut().ok_or(Error::Closed)?;
        log::trace!(
            "-> {:?} (k={}, body {} bytes)",
            req.command,
            req.k,
            req.body.len()
        );

        let outcome = match req.write_to(stream) {
            Ok(()) => Response::read_from(stream),
            Err(e) => Err(e),
        };
        let resp = match outcome {
            Ok(resp) => resp,
            Err(e) => {
                self.poison();
                return Err(e);
            }
        };

        log::trace!(
            "<- {:?} {:?} (body {} bytes, {:.3}s on server)",
            resp.command,
            resp.status,
            resp.body.len(),
            resp.elapsed_secs
        );
        if resp.status != Status::Success {
            self.poison();
            return Err(Error::Server(resp.status));
        }
        Ok(resp)
    }

    fn poison(&mut self) {
        if let Some(stream) = self.stream.take() {
            log::warn!("closing connection after error");
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for GpuClient {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 || k > MAX_K {
        return Err(Error::InvalidParameter(format!(
            "k must be between 1 and {MAX_K}, got {k}"
        )));
    }
    Ok(())
}

/// Format an estimated number of seconds for progress messages.
fn fmt_eta(secs: f64) -> String {
    if secs < 90.0 {
        format!("{secs:.0} sec")
    } else {
        format!("{:.0} min", secs / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_bounds() {
        assert!(check_k(1).is_ok());
        assert!(check_k(MAX_K).is_ok());
        assert!(check_k(0).is_err());
        assert!(check_k(MAX_K + 1).is_err());
    }

    #[test]
    fn eta_scales_to_minutes() {
        assert_eq!(fmt_eta(42.0), "42 sec");
        assert_eq!(fmt_eta(240.0), "4 min");
    }

    #[test]
    fn timings_overhead_saturates() {
        let t = Timings {
            server: Duration::from_secs(2),
            client: Duration::from_secs(1),
        };
        assert_eq!(t.overhead(), Duration::ZERO);
    }

    #[test]
    fn timings_display_picks_unit_from_server_scale() {
        let t = Timings {
            server: Duration::from_millis(250),
            client: Duration::from_millis(300),
        };
        let text = t.to_string();
        assert!(text.contains("ms"), "{text}");

        let t = Timings {
            server: Duration::from_secs(300),
            client: Duration::from_secs(305),
        };
        let text = t.to_string();
        assert!(text.contains("min"), "{text}");
    }
}
