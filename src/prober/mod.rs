use std::net::IpAddr;
use std::time::Duration;

use crate::error::ProbeError;
use crate::timestamp::as_millis_f64;

pub mod icmp;
pub mod transport;

/// Aggregate result of one round of echo probes.
#[derive(Debug, Clone, PartialEq)]
pub struct PingStatistics {
    pub address: IpAddr,
    pub transmitted: u16,
    pub received: u16,
    pub min_rtt: Duration,
    pub max_rtt: Duration,
    pub avg_rtt: Duration,
}

impl PingStatistics {
    /// Summarises the round trips of the replies that came back.
    pub fn from_rtts(address: IpAddr, transmitted: u16, rtts: &[Duration]) -> Self {
        let received = rtts.len() as u16;
        let total: Duration = rtts.iter().sum();
        let avg_rtt = if rtts.is_empty() {
            Duration::ZERO
        } else {
            total / rtts.len() as u32
        };
        Self {
            address,
            transmitted,
            received,
            min_rtt: rtts.iter().min().copied().unwrap_or_default(),
            max_rtt: rtts.iter().max().copied().unwrap_or_default(),
            avg_rtt,
        }
    }

    pub fn loss_percent(&self) -> f64 {
        if self.transmitted == 0 {
            return 0.0;
        }
        f64::from(self.transmitted - self.received) * 100.0 / f64::from(self.transmitted)
    }

    pub fn avg_millis(&self) -> f64 {
        as_millis_f64(self.avg_rtt)
    }
}

/// "Send N echo probes, return round-trip statistics."
pub trait ReachabilityProbe {
    async fn probe(&self, ip: IpAddr) -> Result<PingStatistics, ProbeError>;
}
