use tracing::{debug, info};

use crate::error::ProbeError;
use crate::metrics;
use crate::prober::transport::{RawResponse, TimedTransport, dial_target};
use crate::prober::{PingStatistics, ReachabilityProbe};
use crate::request::RequestBuilder;
use crate::resolver::{Endpoint, resolve};
use crate::timestamp::{Clock, RunStart, TimingTrace};

/// Inputs of one measurement run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub address: String,
    /// Host header; the address is used when absent.
    pub hostname: Option<String>,
    pub token: String,
    /// Resolve the address again when dialling instead of reusing the
    /// address the ping round went to.
    pub lookup_on_send: bool,
    pub transaction: String,
}

#[derive(Debug)]
pub struct RunReport {
    pub endpoint: Endpoint,
    pub ping: PingStatistics,
    pub dial_target: String,
    pub response: RawResponse,
}

pub struct Runner<P, C> {
    probe: P,
    transport: TimedTransport<C>,
}

impl<P: ReachabilityProbe, C: Clock> Runner<P, C> {
    pub fn new(probe: P, clock: C) -> Self {
        Self {
            probe,
            transport: TimedTransport::new(clock),
        }
    }

    /// Runs every stage in order and stops at the first failure. Stage
    /// samples go to `trace`, which the caller keeps on either outcome.
    pub async fn run(&self, opts: &RunOptions, trace: &mut TimingTrace) -> Result<RunReport, ProbeError> {
        let endpoint = Endpoint::parse(&opts.address)?;
        let target = resolve(&endpoint).await?;
        info!("resolved {} to {}", endpoint.host(), target.ip);

        let ping = self.probe.probe(target.ip).await?;
        info!(
            "Ping to {}: {:.3} ms ({}/{} received)",
            ping.address,
            ping.avg_millis(),
            ping.received,
            ping.transmitted
        );
        // recorded here so a later failed stage still exports the round
        metrics::observe_ping(endpoint.as_str(), &ping);

        let host = opts.hostname.as_deref().unwrap_or(endpoint.as_str());
        let request = RequestBuilder::new(host)
            .token(&opts.token)
            .transaction(&opts.transaction)
            .build()?;
        info!(
            "POST {} Host: {} ({} byte body)",
            request.path(),
            request.host(),
            request.content_length()
        );
        debug!("body: {}", request.body());

        let dial = dial_target(&endpoint, &target, opts.lookup_on_send);
        let start = RunStart::now(self.transport.clock());
        let response = self.transport.exchange(&dial, &request, start, trace).await?;

        Ok(RunReport {
            endpoint,
            ping,
            dial_target: dial,
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::{MonotonicClock, Stage};
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct FakeProbe {
        fail: bool,
        calls: AtomicUsize,
    }

    impl ReachabilityProbe for FakeProbe {
        async fn probe(&self, ip: IpAddr) -> Result<PingStatistics, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProbeError::probe(ip, "destination host unreachable"));
            }
            Ok(PingStatistics::from_rtts(ip, 2, &[Duration::from_millis(1); 2]))
        }
    }

    fn options(address: &str) -> RunOptions {
        RunOptions {
            address: address.to_string(),
            hostname: None,
            token: String::new(),
            lookup_on_send: false,
            transaction: "abcd".to_string(),
        }
    }

    /// Reads the request head and its body, answers, closes.
    async fn rpc_peer() -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed early");
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some((head, body)) = text.split_once("\r\n\r\n") {
                    let len: usize = head
                        .lines()
                        .find_map(|l| l.strip_prefix("Content-Length: "))
                        .unwrap()
                        .parse()
                        .unwrap();
                    if body.len() >= len {
                        break;
                    }
                }
            }
            sock.write_all(b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n{\"result\":\"sig\"}")
                .await
                .unwrap();
            String::from_utf8(buf).unwrap()
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn end_to_end_against_loopback_peer() {
        let (addr, server) = rpc_peer().await;
        let runner = Runner::new(FakeProbe::default(), MonotonicClock);
        let mut trace = TimingTrace::new();

        let report = runner.run(&options(&addr), &mut trace).await.unwrap();

        assert_eq!(report.dial_target, addr);
        assert_eq!(report.ping.received, 2);
        assert!(report.response.to_string().ends_with("{\"result\":\"sig\"}"));

        let sent = server.await.unwrap();
        assert!(sent.starts_with("POST / HTTP/1.1\r\n"), "{sent}");
        assert!(sent.contains(&format!("Host: {}\r\n", addr)), "{sent}");
        assert!(sent.contains(r#""params":["abcd","#), "{sent}");

        let d = trace.get(Stage::Dial).unwrap();
        let w = trace.get(Stage::Write).unwrap();
        let f = trace.get(Stage::FirstByte).unwrap();
        let c = trace.get(Stage::Complete).unwrap();
        assert!(d <= w && w <= f && f <= c);
    }

    #[tokio::test]
    async fn hostname_overrides_host_header_only() {
        let (addr, server) = rpc_peer().await;
        let runner = Runner::new(FakeProbe::default(), MonotonicClock);
        let mut opts = options(&addr);
        opts.hostname = Some("rpc.example.com".to_string());
        opts.token = "secret".to_string();
        opts.lookup_on_send = true;

        let report = runner.run(&opts, &mut TimingTrace::new()).await.unwrap();

        assert_eq!(report.dial_target, addr);
        let sent = server.await.unwrap();
        assert!(sent.starts_with("POST /secret HTTP/1.1\r\n"), "{sent}");
        assert!(sent.contains("Host: rpc.example.com\r\n"), "{sent}");
    }

    #[tokio::test]
    async fn probe_failure_stops_before_dial() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let probe = FakeProbe {
            fail: true,
            ..FakeProbe::default()
        };
        let runner = Runner::new(probe, MonotonicClock);
        let mut trace = TimingTrace::new();

        let err = runner.run(&options(&addr), &mut trace).await.unwrap_err();

        assert!(matches!(err, ProbeError::ProbeFailure { .. }), "{err:?}");
        assert!(trace.get(Stage::Dial).is_none());
        assert!(trace.is_empty());
        let accepted = tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
        assert!(accepted.is_err(), "no connection may be attempted");
    }

    #[tokio::test]
    async fn bad_address_never_reaches_the_probe() {
        let runner = Runner::new(FakeProbe::default(), MonotonicClock);
        let mut trace = TimingTrace::new();

        let err = runner.run(&options("127.0.0.1"), &mut trace).await.unwrap_err();

        assert!(matches!(err, ProbeError::InvalidAddressFormat(_)), "{err:?}");
        assert_eq!(runner.probe.calls.load(Ordering::SeqCst), 0);
        assert!(trace.is_empty());
    }

    #[tokio::test]
    async fn ping_is_exported_even_when_the_dial_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let runner = Runner::new(FakeProbe::default(), MonotonicClock);
        let mut trace = TimingTrace::new();

        let err = runner.run(&options(&addr), &mut trace).await.unwrap_err();

        assert!(matches!(err, ProbeError::ConnectFailure { .. }), "{err:?}");
        let text = metrics::render().unwrap();
        let line = format!(r#"rpc_probe_ping_rtt_milliseconds{{target="{}"}} 1"#, addr);
        assert!(text.lines().any(|l| l == line), "{text}");
    }
}
