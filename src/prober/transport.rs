use std::fmt;
use std::net::IpAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::info;

use crate::error::ProbeError;
use crate::request::RawRequest;
use crate::resolver::{Endpoint, ResolvedTarget};
use crate::timestamp::{Clock, RunStart, Stage, TimingTrace, as_millis_f64};

/// Where the TCP connection is opened.
///
/// With `lookup_on_send` the `host:port` string as given is dialled, so the
/// dial sample includes a fresh name lookup. Otherwise the address resolved
/// before the ping round is used with the given port.
pub fn dial_target(endpoint: &Endpoint, target: &ResolvedTarget, lookup_on_send: bool) -> String {
    if lookup_on_send {
        return endpoint.as_str().to_string();
    }
    match target.ip {
        IpAddr::V4(ip) => format!("{}:{}", ip, endpoint.port()),
        IpAddr::V6(ip) => format!("[{}]:{}", ip, endpoint.port()),
    }
}

/// Everything the peer sent before closing, plus what we sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub bytes_written: usize,
    data: Vec<u8>,
}

impl RawResponse {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Display for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

/// Runs one dial/write/read exchange and stamps every stage boundary.
pub struct TimedTransport<C> {
    clock: C,
}

impl<C: Clock> TimedTransport<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn mark(&self, trace: &mut TimingTrace, start: RunStart, stage: Stage) {
        let elapsed = start.elapsed(&self.clock);
        trace.record(stage, elapsed);
        info!("{}: {:.3} ms", stage.label(), as_millis_f64(elapsed));
    }

    /// The stream lives only inside this call, so it is closed on every
    /// return path. Samples recorded before a failure stay in `trace`.
    pub async fn exchange(
        &self,
        target: &str,
        request: &RawRequest,
        start: RunStart,
        trace: &mut TimingTrace,
    ) -> Result<RawResponse, ProbeError> {
        let mut stream = TcpStream::connect(target)
            .await
            .map_err(|source| ProbeError::ConnectFailure {
                target: target.to_string(),
                source,
            })?;
        self.mark(trace, start, Stage::Dial);

        // write_all reports a short write as WriteZero
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(ProbeError::WriteFailure)?;
        let bytes_written = request.len();
        info!("bytes written: {}", bytes_written);
        self.mark(trace, start, Stage::Write);

        let mut first = [0u8; 1];
        stream
            .read_exact(&mut first)
            .await
            .map_err(ProbeError::ReadFailure)?;
        self.mark(trace, start, Stage::FirstByte);

        let mut data = Vec::from(first);
        // EOF terminates the drain; the request asked for Connection: close
        stream
            .read_to_end(&mut data)
            .await
            .map_err(ProbeError::DrainFailure)?;
        self.mark(trace, start, Stage::Complete);

        Ok(RawResponse {
            bytes_written,
            data,
        })
    }
}
