use clap::Parser;
use std::path::PathBuf;

use crate::runner::RunOptions;

/// Measure dial, write, first-byte and full-response latency of a
/// sendTransaction call against a JSON-RPC endpoint.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The server address in the format <host>:<port>
    #[arg(long, value_name = "host:port")]
    pub address: String,

    /// The Host header for the request, defaults to the address
    #[arg(long)]
    pub hostname: Option<String>,

    /// Token appended to the request path
    #[arg(long, default_value = "")]
    pub token: String,

    /// Resolve the host again when dialling, so the dial time includes DNS
    #[arg(long)]
    pub dnslookup: bool,

    /// The transaction data to send (base64 encoded)
    #[arg(long, default_value = "<your transaction data>")]
    pub transaction: String,

    /// JSON file with probe settings
    #[arg(long, env = "PROBE_CONFIG", value_name = "file")]
    pub config: Option<PathBuf>,

    /// Write Prometheus text exposition of the run to this file
    #[arg(long, value_name = "file")]
    pub metrics_file: Option<PathBuf>,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            address: self.address.clone(),
            hostname: self.hostname.clone().filter(|h| !h.is_empty()),
            token: self.token.clone(),
            lookup_on_send: self.dnslookup,
            transaction: self.transaction.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["rpc-latency-probe", "--address", "127.0.0.1:8899"]).unwrap();
        let opts = cli.run_options();
        assert_eq!(opts.address, "127.0.0.1:8899");
        assert_eq!(opts.hostname, None);
        assert_eq!(opts.token, "");
        assert!(!opts.lookup_on_send);
        assert_eq!(opts.transaction, "<your transaction data>");
        assert!(cli.metrics_file.is_none());
    }

    #[test]
    fn all_flags() {
        let cli = Cli::try_parse_from([
            "rpc-latency-probe",
            "--address",
            "rpc.example.com:8899",
            "--hostname",
            "rpc.example.com",
            "--token",
            "abc",
            "--dnslookup",
            "--transaction",
            "AQID",
            "--metrics-file",
            "/tmp/probe.prom",
        ])
        .unwrap();
        let opts = cli.run_options();
        assert_eq!(opts.hostname.as_deref(), Some("rpc.example.com"));
        assert_eq!(opts.token, "abc");
        assert!(opts.lookup_on_send);
        assert_eq!(opts.transaction, "AQID");
    }

    #[test]
    fn address_is_required() {
        assert!(Cli::try_parse_from(["rpc-latency-probe"]).is_err());
    }

    #[test]
    fn empty_hostname_falls_back_to_address() {
        let cli = Cli::try_parse_from([
            "rpc-latency-probe",
            "--address",
            "127.0.0.1:8899",
            "--hostname",
            "",
        ])
        .unwrap();
        assert_eq!(cli.run_options().hostname, None);
    }
}
