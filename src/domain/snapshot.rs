use serde::{Deserialize, Serialize};

/// Counters sampled from the radio stack once per reporting period.
///
/// Owned by the producer; the publisher only borrows it for the duration of a
/// single publish call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSnapshot {
    pub phy: PhyMetrics,
    pub stack: StackMetrics,
    pub sys: SysMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhyMetrics {
    /// One entry per downlink carrier; carrier 0 is the primary cell.
    pub dl: Vec<PhyDlMetrics>,
    pub ul: Vec<PhyUlMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhyDlMetrics {
    pub mcs: f64,
    pub snr: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhyUlMetrics {
    pub mcs: f64,
}

/// Per-user layer-2/layer-3 metrics.
///
/// `mac[i]` and `rrc[i]` describe the same user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackMetrics {
    pub mac: Vec<MacUserMetrics>,
    pub rrc: Vec<RrcUserMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacUserMetrics {
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub tx_pkts: u64,
    pub rx_pkts: u64,
    pub tx_errors: u64,
    pub rx_errors: u64,
    /// Time over which the byte counters were accumulated.
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RrcUserMetrics {
    pub rnti: u16,
    pub state: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SysMetrics {
    pub process_realmem_kb: u64,
    pub process_virtualmem_kb: u64,
    pub process_realmem_pct: f64,
    pub process_cpu_usage: f64,
    pub thread_count: u32,
}
