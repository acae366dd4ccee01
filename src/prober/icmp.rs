use std::net::IpAddr;
use std::time::Duration;

use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};
use tracing::debug;

use super::{PingStatistics, ReachabilityProbe};
use crate::config::ProbeConfig;
use crate::error::ProbeError;

const PAYLOAD: [u8; 56] = [0; 56];

/// ICMP echo prober. A reply that misses its timeout counts as lost; any
/// other error aborts the round.
#[derive(Debug, Clone)]
pub struct IcmpProbe {
    count: u16,
    timeout: Duration,
    interval: Duration,
}

impl IcmpProbe {
    pub fn new(count: u16, timeout: Duration, interval: Duration) -> Self {
        Self {
            count,
            timeout,
            interval,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.ping_count, config.ping_timeout(), config.ping_interval())
    }
}

impl ReachabilityProbe for IcmpProbe {
    async fn probe(&self, ip: IpAddr) -> Result<PingStatistics, ProbeError> {
        let config = match ip {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };
        let client = Client::new(&config).map_err(|e| ProbeError::probe(ip, e))?;

        // using process ID as identifier, same as ping(8)
        let ident = PingIdentifier(std::process::id() as u16);
        let mut pinger = client.pinger(ip, ident).await;
        pinger.timeout(self.timeout);

        let mut rtts = Vec::with_capacity(self.count as usize);
        for seq in 0..self.count {
            if seq > 0 {
                tokio::time::sleep(self.interval).await;
            }
            match pinger.ping(PingSequence(seq), &PAYLOAD).await {
                Ok((_packet, rtt)) => {
                    debug!("icmp_seq={} reply from {}: {:?}", seq, ip, rtt);
                    rtts.push(rtt);
                }
                Err(SurgeError::Timeout { .. }) => {
                    debug!("icmp_seq={} to {} timed out", seq, ip);
                }
                Err(e) => return Err(ProbeError::probe(ip, e)),
            }
        }

        Ok(PingStatistics::from_rtts(ip, self.count, &rtts))
    }
}
