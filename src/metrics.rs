use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::path::Path;
use tracing::{info, warn};

use crate::prober::PingStatistics;
use crate::timestamp::{TimingTrace, as_millis_f64};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static STAGE_GAUGE: Lazy<GaugeVec> = Lazy::new(|| {
    let opts = Opts::new(
        "rpc_probe_stage_elapsed_milliseconds",
        "Time from run start to the end of each request stage",
    );
    let gauge = GaugeVec::new(opts, &["target", "stage"]).expect("stage gauge");
    REGISTRY.register(Box::new(gauge.clone())).expect("register stage gauge");
    gauge
});

static PING_GAUGE: Lazy<GaugeVec> = Lazy::new(|| {
    let opts = Opts::new("rpc_probe_ping_rtt_milliseconds", "Average ICMP round trip time");
    let gauge = GaugeVec::new(opts, &["target"]).expect("ping gauge");
    REGISTRY.register(Box::new(gauge.clone())).expect("register ping gauge");
    gauge
});

static RESPONSE_BYTES: Lazy<IntGaugeVec> = Lazy::new(|| {
    let opts = Opts::new("rpc_probe_response_bytes", "Bytes received before the peer closed");
    let gauge = IntGaugeVec::new(opts, &["target"]).expect("response gauge");
    REGISTRY.register(Box::new(gauge.clone())).expect("register response gauge");
    gauge
});

static FAILURE_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("rpc_probe_failures_total", "Runs aborted, by failed stage");
    let ctr = IntCounterVec::new(opts, &["target", "stage"]).expect("failure counter");
    REGISTRY.register(Box::new(ctr.clone())).expect("register failure counter");
    ctr
});

pub fn observe_trace(target: &str, trace: &TimingTrace) {
    for s in trace.samples() {
        STAGE_GAUGE
            .with_label_values(&[target, s.stage.label()])
            .set(as_millis_f64(s.elapsed));
    }
}

pub fn observe_ping(target: &str, stats: &PingStatistics) {
    PING_GAUGE.with_label_values(&[target]).set(stats.avg_millis());
}

pub fn observe_response(target: &str, bytes: usize) {
    RESPONSE_BYTES
        .with_label_values(&[target])
        .set(bytes as i64);
}

pub fn inc_failure(target: &str, stage: &str) {
    FAILURE_COUNTER.with_label_values(&[target, stage]).inc();
}

/// Text exposition of everything observed so far.
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let mf = REGISTRY.gather();
    let mut buf = Vec::new();
    encoder.encode(&mf, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Writes the exposition for the node_exporter textfile collector. The
/// file is replaced by rename so a scrape never sees half of it.
pub async fn write_textfile(path: &Path) -> Result<()> {
    let body = render()?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Like [`write_textfile`], but a failed export is only logged so it never
/// hides the outcome of the run itself.
pub async fn export(path: &Path) -> bool {
    match write_textfile(path).await {
        Ok(()) => {
            info!("metrics written to {}", path.display());
            true
        }
        Err(e) => {
            warn!("failed to write metrics to {}: {:?}", path.display(), e);
            false
        }
    }
}
