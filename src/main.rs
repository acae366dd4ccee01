mod cli;
mod config;
mod error;
mod metrics;
mod prober;
mod request;
mod resolver;
mod runner;
mod timestamp;

use clap::Parser;
use cli::Cli;
use config::ProbeConfig;
use prober::icmp::IcmpProbe;
use runner::Runner;
use timestamp::{MonotonicClock, Stage, TimingTrace, as_millis_f64};

use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config first to get log level
    let config = ProbeConfig::load(cli.config.as_deref()).await?;
    let log_level = config.get_tracing_level()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
                         .add_directive(format!("rpc_latency_probe={}", log_level.as_str().to_lowercase()).parse()?))
        .init();

    let opts = cli.run_options();
    let runner = Runner::new(IcmpProbe::from_config(&config), MonotonicClock);
    let mut trace = TimingTrace::new();

    let result = runner.run(&opts, &mut trace).await;
    metrics::observe_trace(&opts.address, &trace);

    let outcome = match result {
        Ok(report) => {
            let ping = &report.ping;
            println!(
                "Ping to {}: min/avg/max {:.3}/{:.3}/{:.3} ms, {}/{} received, {:.1}% loss",
                ping.address,
                as_millis_f64(ping.min_rtt),
                ping.avg_millis(),
                as_millis_f64(ping.max_rtt),
                ping.received,
                ping.transmitted,
                ping.loss_percent()
            );
            println!(
                "Dialled {} for {} ({} bytes written)",
                report.dial_target, report.endpoint, report.response.bytes_written
            );
            print!("{}", trace);
            if let (Some(write), Some(first)) = (trace.get(Stage::Write), trace.get(Stage::FirstByte)) {
                println!("Server wait:    {:>10.3} ms", as_millis_f64(first.saturating_sub(write)));
            }
            println!("Data: {}", report.response);

            metrics::observe_response(&opts.address, report.response.len());
            Ok(())
        }
        Err(e) => {
            error!("{} stage failed: {}", e.stage(), e);
            if !trace.is_empty() {
                eprint!("{}", trace);
            }
            metrics::inc_failure(&opts.address, e.stage());
            Err(e)
        }
    };

    if let Some(path) = &cli.metrics_file {
        metrics::export(path).await;
    }

    outcome?;
    Ok(())
}
