use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::model::col;

pub const NA: &str = "NA";
pub const DEFAULT_OUTPUT: &str = "microkit_output.csv";

/// Fixed inputs to the derived metrics. None of these are measured by the
/// benchmark harness; they describe how it was configured.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Assumptions {
    pub total_packets: u64,
    /// Per-packet framing bytes not counted in the reported packet size.
    pub frame_overhead_bytes: u64,
    pub warm_up_secs: u64,
    pub cool_down_secs: u64,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            total_packets: 200_000,
            frame_overhead_bytes: 56,
            warm_up_secs: 10,
            cool_down_secs: 10,
        }
    }
}

impl Assumptions {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("parse assumptions JSON from {}", path.display()))
    }
}

/// Canonical ascending order of throughput test points in aggregate counter logs.
pub fn throughput_labels() -> &'static [&'static str] {
    &[
        "10Mb/s", "20Mb/s", "50Mb/s", "100Mb/s", "200Mb/s", "300Mb/s", "400Mb/s", "500Mb/s",
        "600Mb/s", "700Mb/s", "800Mb/s", "900Mb/s", "1000Mb/s",
    ]
}

/// Components whose utilisation columns are copied from aggregate counter logs.
pub fn components_of_interest() -> &'static [&'static str] {
    &[
        "ethernet_driver",
        "net_virt_tx",
        "net_virt_rx",
        "client0",
        "client0_net_copier",
    ]
}

/// Output columns always written, in this order, before any discovered columns.
pub fn base_columns() -> &'static [&'static str] {
    &[
        col::REQU_THRPUT,
        col::RECV_THRPUT,
        col::SEND_THRPUT,
        col::PACKET_SIZE,
        col::MIN_RTT,
        col::MEAN_RTT,
        col::MAX_RTT,
        col::RTT_STDEV,
        col::MED_RTT,
        col::IDLE_CYCLES,
        col::TOTAL_CYCLES,
        col::CPU_UTIL_FRACTION,
        col::KERNEL_CYCLES,
        col::USER_CYCLES,
        col::KERNEL_ENTRIES,
        col::SCHEDULES,
        col::WARM_UP,
        col::COOL_DOWN,
        col::TEST_DURATION,
        col::TOTAL_TIME,
        col::PACKETS_SENT,
        col::PACKET_RATE,
        col::TOTAL_PACKETS,
        col::L1_ICACHE_MISSES,
        col::L1_DCACHE_MISSES,
        col::L1_ITLB_MISSES,
        col::L1_DTLB_MISSES,
        col::INSTRUCTIONS,
        col::INSTRUCTIONS_PER_SECOND,
        col::BRANCH_MISPREDICTIONS,
        col::CYCLES_PER_PACKET,
        col::USER_CYCLES_PER_PACKET,
        col::KERNEL_CYCLES_PER_PACKET,
        col::KERNEL_ENTRIES_PER_PACKET,
        col::L1_ICACHE_MISSES_PER_PACKET,
        col::L1_DCACHE_MISSES_PER_PACKET,
        col::L1_ITLB_MISSES_PER_PACKET,
        col::L1_DTLB_MISSES_PER_PACKET,
        col::INSTRUCTIONS_PER_PACKET,
        col::BRANCH_MISPRED_PER_PACKET,
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompareMetric {
    pub column: String,
    pub title: String,
    pub scale: f64,
}

impl CompareMetric {
    pub fn raw(column: &str) -> Self {
        Self {
            column: column.to_string(),
            title: column.to_string(),
            scale: 1.0,
        }
    }

    fn scaled(column: &str, title: &str, scale: f64) -> Self {
        Self {
            column: column.to_string(),
            title: title.to_string(),
            scale,
        }
    }
}

pub fn default_compare_metrics() -> Vec<CompareMetric> {
    vec![
        CompareMetric::raw(col::RECV_THRPUT),
        CompareMetric::scaled(col::CPU_UTIL_FRACTION, "CPU Utilization (%)", 100.0),
        CompareMetric::scaled(
            col::INSTRUCTIONS_PER_SECOND,
            "Instructions per Second (G/s)",
            1e-9,
        ),
        CompareMetric::raw(col::CYCLES_PER_PACKET),
        CompareMetric::raw(col::INSTRUCTIONS_PER_PACKET),
        CompareMetric::raw(col::L1_ICACHE_MISSES_PER_PACKET),
        CompareMetric::raw(col::L1_DCACHE_MISSES_PER_PACKET),
        CompareMetric::raw(col::BRANCH_MISPRED_PER_PACKET),
    ]
}
