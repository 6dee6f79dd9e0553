use std::collections::BTreeMap;
use std::fmt;

pub mod col {
    pub const REQU_THRPUT: &str = "Requ Thrput (Mb/s)";
    pub const RECV_THRPUT: &str = "Recv Thrput (Mb/s)";
    pub const SEND_THRPUT: &str = "Send Thrput (Mb/s)";
    pub const PACKET_SIZE: &str = "Packet Size (bytes)";
    pub const MIN_RTT: &str = "Min RTT (μs)";
    pub const MEAN_RTT: &str = "Mean RTT (μs)";
    pub const MAX_RTT: &str = "Max RTT (μs)";
    pub const RTT_STDEV: &str = "RTT stdev (μs)";
    pub const MED_RTT: &str = "Med RTT (μs)";
    pub const BAD_PACKETS: &str = "Bad Packets";
    pub const IDLE_CYCLES: &str = "Idle Cycles";
    pub const TOTAL_CYCLES: &str = "Total Cycles";

    pub const CORE_CYCLES: &str = "Core Cycles";
    pub const SYSTEM_CYCLES: &str = "System Cycles";
    pub const KERNEL_CYCLES: &str = "Kernel Cycles";
    pub const USER_CYCLES: &str = "User Cycles";
    pub const KERNEL_ENTRIES: &str = "Kernel Entries";
    pub const SCHEDULES: &str = "Schedules";
    pub const L1_ICACHE_MISSES: &str = "L1 I-cache misses";
    pub const L1_DCACHE_MISSES: &str = "L1 D-cache misses";
    pub const L1_ITLB_MISSES: &str = "L1 I-TLB misses";
    pub const L1_DTLB_MISSES: &str = "L1 D-TLB misses";
    pub const INSTRUCTIONS: &str = "Instructions";
    pub const BRANCH_MISPREDICTIONS: &str = "Branch mispredictions";

    pub const CPU_UTIL_FRACTION: &str = "CPU Util (Fraction)";
    pub const WARM_UP: &str = "Warm-up (s)";
    pub const COOL_DOWN: &str = "Cool-down (s)";
    pub const TEST_DURATION: &str = "Test Duration (s)";
    pub const TOTAL_TIME: &str = "Total Time (s)";
    pub const PACKETS_SENT: &str = "Packets Sent";
    pub const PACKET_RATE: &str = "Packet Rate (p/s)";
    pub const TOTAL_PACKETS: &str = "Total Packets";
    pub const INSTRUCTIONS_PER_SECOND: &str = "Instructions per Second";
    pub const CYCLES_PER_PACKET: &str = "Cycles Per Packet";
    pub const USER_CYCLES_PER_PACKET: &str = "User cycles per packet";
    pub const KERNEL_CYCLES_PER_PACKET: &str = "Kernel cycles per packet";
    pub const KERNEL_ENTRIES_PER_PACKET: &str = "Kernel entries per packet";
    pub const L1_ICACHE_MISSES_PER_PACKET: &str = "L1 I-cache misses per packet";
    pub const L1_DCACHE_MISSES_PER_PACKET: &str = "L1 D-cache misses per packet";
    pub const L1_ITLB_MISSES_PER_PACKET: &str = "L1 I-TLB misses per packet";
    pub const L1_DTLB_MISSES_PER_PACKET: &str = "L1 D-TLB misses per packet";
    pub const INSTRUCTIONS_PER_PACKET: &str = "instructions per packet";
    pub const BRANCH_MISPRED_PER_PACKET: &str = "Branch mis-pred per packet";
}

/// A single cell of a merged row. Absent cells are simply not in the row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }

    /// Parses a table cell: integers first, then floats.
    pub fn parse(cell: &str) -> Option<Value> {
        let cell = cell.trim();
        if let Ok(v) = cell.parse::<i64>() {
            return Some(Value::Int(v));
        }
        cell.parse::<f64>().ok().map(Value::Float)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{:.1}", v)
            }
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Column name -> value. Columns missing from the map are written as the NA marker.
pub type MergedRow = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct TestPointRecord {
    pub requested_mbps: f64,
    pub received_mbps: f64,
    pub sent_mbps: f64,
    pub packet_size: i64,
    pub min_rtt: i64,
    pub mean_rtt: i64,
    pub max_rtt: i64,
    pub stdev_rtt: f64,
    pub median_rtt: i64,
    pub bad_packets: i64,
    pub idle_cycles: i64,
    pub total_cycles: i64,
}

impl TestPointRecord {
    pub fn to_row(&self) -> MergedRow {
        let mut row = MergedRow::new();
        row.insert(col::REQU_THRPUT.into(), Value::Float(self.requested_mbps));
        row.insert(col::RECV_THRPUT.into(), Value::Float(self.received_mbps));
        row.insert(col::SEND_THRPUT.into(), Value::Float(self.sent_mbps));
        row.insert(col::PACKET_SIZE.into(), Value::Int(self.packet_size));
        row.insert(col::MIN_RTT.into(), Value::Int(self.min_rtt));
        row.insert(col::MEAN_RTT.into(), Value::Int(self.mean_rtt));
        row.insert(col::MAX_RTT.into(), Value::Int(self.max_rtt));
        row.insert(col::RTT_STDEV.into(), Value::Float(self.stdev_rtt));
        row.insert(col::MED_RTT.into(), Value::Int(self.median_rtt));
        row.insert(col::BAD_PACKETS.into(), Value::Int(self.bad_packets));
        row.insert(col::IDLE_CYCLES.into(), Value::Int(self.idle_cycles));
        row.insert(col::TOTAL_CYCLES.into(), Value::Int(self.total_cycles));
        row
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareCounters {
    pub l1_icache_misses: i64,
    pub l1_dcache_misses: i64,
    pub l1_itlb_misses: i64,
    pub l1_dtlb_misses: i64,
    pub instructions: i64,
    pub branch_mispredictions: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComponentUtil {
    pub cpu: f64,
    pub kernel: f64,
    pub user: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CounterRecord {
    /// Throughput label the record was keyed by, when the log names one.
    pub label: Option<String>,
    pub core_cycles: i64,
    pub system_cycles: Option<i64>,
    pub kernel_cycles: i64,
    pub user_cycles: i64,
    pub kernel_entries: i64,
    pub schedules: i64,
    pub hardware: Option<HardwareCounters>,
    pub components: BTreeMap<String, ComponentUtil>,
}

impl CounterRecord {
    pub fn fields(&self) -> Vec<(String, Value)> {
        let mut out = vec![(col::CORE_CYCLES.to_string(), Value::Int(self.core_cycles))];
        if let Some(system) = self.system_cycles {
            out.push((col::SYSTEM_CYCLES.to_string(), Value::Int(system)));
        }
        out.push((col::KERNEL_CYCLES.to_string(), Value::Int(self.kernel_cycles)));
        out.push((col::USER_CYCLES.to_string(), Value::Int(self.user_cycles)));
        out.push((col::KERNEL_ENTRIES.to_string(), Value::Int(self.kernel_entries)));
        out.push((col::SCHEDULES.to_string(), Value::Int(self.schedules)));

        if let Some(hw) = &self.hardware {
            for (key, v) in [
                (col::L1_ICACHE_MISSES, hw.l1_icache_misses),
                (col::L1_DCACHE_MISSES, hw.l1_dcache_misses),
                (col::L1_ITLB_MISSES, hw.l1_itlb_misses),
                (col::L1_DTLB_MISSES, hw.l1_dtlb_misses),
                (col::INSTRUCTIONS, hw.instructions),
                (col::BRANCH_MISPREDICTIONS, hw.branch_mispredictions),
            ] {
                out.push((key.to_string(), Value::Int(v)));
            }
        }

        for (name, util) in &self.components {
            out.push((format!("{}_CPU_Util", name), Value::Float(util.cpu)));
            out.push((format!("{}_Kernel_Util", name), Value::Float(util.kernel)));
            out.push((format!("{}_User_Util", name), Value::Float(util.user)));
        }
        out
    }
}
