use std::collections::HashSet;

use crate::config::Assumptions;
use crate::model::{col, CounterRecord, MergedRow, TestPointRecord, Value};
use crate::stats::round_to;

/// Keeps the first record seen for each requested throughput.
pub fn dedup_by_requested<I>(records: I) -> (Vec<TestPointRecord>, usize)
where
    I: IntoIterator<Item = TestPointRecord>,
{
    let mut seen: HashSet<u64> = HashSet::new();
    let mut unique = Vec::new();
    let mut removed = 0usize;
    for record in records {
        if seen.insert(record.requested_mbps.to_bits()) {
            unique.push(record);
        } else {
            removed += 1;
        }
    }
    (unique, removed)
}

/// Merges summary and counter records by position and fills in derived metrics.
/// Summary values win when both sources carry the same column.
pub fn combine(
    summary: &[TestPointRecord],
    counters: &[CounterRecord],
    assumptions: &Assumptions,
) -> Vec<MergedRow> {
    if counters.len() < summary.len() {
        log::warn!(
            "{} summary rows but only {} counter records; trailing rows get no counters",
            summary.len(),
            counters.len()
        );
    }

    summary
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let mut row = record.to_row();
            if let Some(counter) = counters.get(i) {
                if let Some(label) = &counter.label {
                    log::debug!(
                        "{} Mb/s merged with counters for {}",
                        record.requested_mbps,
                        label
                    );
                }
                for (key, value) in counter.fields() {
                    row.entry(key).or_insert(value);
                }
            }
            backfill_cycles(&mut row);
            derive_metrics(&mut row, assumptions);
            row
        })
        .collect()
}

fn get(row: &MergedRow, key: &str) -> Option<f64> {
    row.get(key).map(|v| v.as_f64())
}

fn set(row: &mut MergedRow, key: &str, value: Option<Value>) {
    match value {
        Some(v) => {
            row.insert(key.to_string(), v);
        }
        None => {
            row.remove(key);
        }
    }
}

fn backfill_cycles(row: &mut MergedRow) {
    if !row.contains_key(col::TOTAL_CYCLES) {
        if let Some(core) = row.get(col::CORE_CYCLES).copied() {
            row.insert(col::TOTAL_CYCLES.to_string(), core);
        }
    }

    let user_missing = get(row, col::USER_CYCLES).map_or(true, |u| u == 0.0);
    if !user_missing {
        return;
    }
    let total = row.get(col::TOTAL_CYCLES).copied().unwrap_or(Value::Int(0));
    let kernel = row.get(col::KERNEL_CYCLES).copied().unwrap_or(Value::Int(0));
    if total.as_f64() <= 0.0 || kernel.as_f64() <= 0.0 {
        return;
    }
    let idle = row.get(col::IDLE_CYCLES).copied().unwrap_or(Value::Int(0));
    let user = match (total, kernel, idle) {
        (Value::Int(t), Value::Int(k), Value::Int(i)) => {
            t.checked_sub(k).and_then(|u| u.checked_sub(i))
        }
        _ => None,
    }
    .unwrap_or_else(|| (total.as_f64() - kernel.as_f64() - idle.as_f64()) as i64);
    row.insert(col::USER_CYCLES.to_string(), Value::Int(user));
}

fn derive_metrics(row: &mut MergedRow, a: &Assumptions) {
    let cpu_util = match (get(row, col::TOTAL_CYCLES), get(row, col::IDLE_CYCLES)) {
        (Some(total), Some(idle)) if total > 0.0 => {
            Some(Value::Float(round_to(1.0 - idle / total, 4)))
        }
        _ => None,
    };
    set(row, col::CPU_UTIL_FRACTION, cpu_util);

    let total_packets = a.total_packets as f64;
    row.insert(col::TOTAL_PACKETS.to_string(), Value::Int(a.total_packets as i64));
    row.insert(col::PACKETS_SENT.to_string(), Value::Int(a.total_packets as i64));

    let packet_rate = match (get(row, col::RECV_THRPUT), get(row, col::PACKET_SIZE)) {
        (Some(mbps), Some(size)) => {
            let frame_bits = (size + a.frame_overhead_bytes as f64) * 8.0;
            Some(mbps * 1_000_000.0 / frame_bits).filter(|r| r.is_finite())
        }
        _ => None,
    };
    set(row, col::PACKET_RATE, packet_rate.map(|r| Value::Float(round_to(r, 2))));

    let per_packet_int = |row: &MergedRow, key: &str| -> Option<Value> {
        if total_packets <= 0.0 {
            return None;
        }
        get(row, key).map(|v| Value::Int((v / total_packets) as i64))
    };
    let per_packet_rate = |row: &MergedRow, key: &str| -> Option<Value> {
        if total_packets <= 0.0 {
            return None;
        }
        get(row, key).map(|v| Value::Float(round_to(v / total_packets, 2)))
    };

    let cycles = per_packet_int(row, col::TOTAL_CYCLES);
    let user = match get(row, col::USER_CYCLES) {
        Some(u) if u > 0.0 => per_packet_int(row, col::USER_CYCLES),
        _ => None,
    };
    let kernel = per_packet_int(row, col::KERNEL_CYCLES);
    let entries = per_packet_rate(row, col::KERNEL_ENTRIES);
    let icache = per_packet_rate(row, col::L1_ICACHE_MISSES);
    let dcache = per_packet_rate(row, col::L1_DCACHE_MISSES);
    let itlb = per_packet_rate(row, col::L1_ITLB_MISSES);
    let dtlb = per_packet_rate(row, col::L1_DTLB_MISSES);
    let instructions = per_packet_int(row, col::INSTRUCTIONS);
    let branches = per_packet_rate(row, col::BRANCH_MISPREDICTIONS);

    set(row, col::CYCLES_PER_PACKET, cycles);
    set(row, col::USER_CYCLES_PER_PACKET, user);
    set(row, col::KERNEL_CYCLES_PER_PACKET, kernel);
    set(row, col::KERNEL_ENTRIES_PER_PACKET, entries);
    set(row, col::L1_ICACHE_MISSES_PER_PACKET, icache);
    set(row, col::L1_DCACHE_MISSES_PER_PACKET, dcache);
    set(row, col::L1_ITLB_MISSES_PER_PACKET, itlb);
    set(row, col::L1_DTLB_MISSES_PER_PACKET, dtlb);
    set(row, col::INSTRUCTIONS_PER_PACKET, instructions);
    set(row, col::BRANCH_MISPRED_PER_PACKET, branches);

    row.insert(col::WARM_UP.to_string(), Value::Int(a.warm_up_secs as i64));
    row.insert(col::COOL_DOWN.to_string(), Value::Int(a.cool_down_secs as i64));

    match packet_rate {
        Some(rate) if rate > 0.0 => {
            let duration = total_packets / rate;
            let total_time = duration + (a.warm_up_secs + a.cool_down_secs) as f64;
            row.insert(col::TEST_DURATION.to_string(), Value::Float(round_to(duration, 2)));
            row.insert(col::TOTAL_TIME.to_string(), Value::Float(round_to(total_time, 2)));
            let ips = match get(row, col::INSTRUCTIONS) {
                Some(instr) if instr > 0.0 => Some(Value::Int((instr / total_time) as i64)),
                _ => None,
            };
            set(row, col::INSTRUCTIONS_PER_SECOND, ips);
        }
        _ => {
            row.remove(col::TEST_DURATION);
            row.remove(col::TOTAL_TIME);
            row.remove(col::INSTRUCTIONS_PER_SECOND);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HardwareCounters;

    fn point(requested: f64, received: f64, idle: i64, total: i64) -> TestPointRecord {
        TestPointRecord {
            requested_mbps: requested,
            received_mbps: received,
            sent_mbps: requested,
            packet_size: 1518,
            min_rtt: 50,
            mean_rtt: 60,
            max_rtt: 90,
            stdev_rtt: 3.5,
            median_rtt: 58,
            bad_packets: 0,
            idle_cycles: idle,
            total_cycles: total,
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let raw = vec![
            point(10.0, 9.8, 100, 1000),
            point(20.0, 19.0, 100, 1000),
            point(10.0, 1.0, 100, 1000),
        ];
        let (unique, removed) = dedup_by_requested(raw.clone());
        assert_eq!(removed, 1);
        assert_eq!(unique.len(), 2);
        assert!(unique.len() <= raw.len());
        assert_eq!(unique[0].received_mbps, 9.8);
        assert_eq!(unique[1].requested_mbps, 20.0);
    }

    #[test]
    fn test_cpu_util_and_user_cycles_derivation() {
        let summary = vec![point(10.0, 9.8, 100, 1000)];
        let counters = vec![CounterRecord {
            kernel_cycles: 300,
            ..Default::default()
        }];
        let rows = combine(&summary, &counters, &Assumptions::default());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row[col::CPU_UTIL_FRACTION], Value::Float(0.9));
        assert_eq!(row[col::USER_CYCLES], Value::Int(600));
        assert_eq!(row[col::TOTAL_CYCLES], Value::Int(1000));
        assert_eq!(row[col::CYCLES_PER_PACKET], Value::Int(0));
    }

    #[test]
    fn test_packet_rate_and_duration() {
        let summary = vec![point(100.0, 100.0, 0, 1000)];
        let counters = vec![CounterRecord {
            hardware: Some(HardwareCounters {
                instructions: 4_000_000_000,
                l1_icache_misses: 300_000,
                ..Default::default()
            }),
            ..Default::default()
        }];
        let rows = combine(&summary, &counters, &Assumptions::default());
        let row = &rows[0];
        // 100e6 / ((1518 + 56) * 8)
        assert_eq!(row[col::PACKET_RATE], Value::Float(7941.55));
        assert_eq!(row[col::TEST_DURATION], Value::Float(25.18));
        assert_eq!(row[col::TOTAL_TIME], Value::Float(45.18));
        assert_eq!(row[col::WARM_UP], Value::Int(10));
        assert_eq!(row[col::TOTAL_PACKETS], Value::Int(200_000));
        assert_eq!(row[col::PACKETS_SENT], Value::Int(200_000));
        assert_eq!(row[col::INSTRUCTIONS_PER_PACKET], Value::Int(20_000));
        assert_eq!(row[col::L1_ICACHE_MISSES_PER_PACKET], Value::Float(1.5));
        assert_eq!(row[col::INSTRUCTIONS_PER_SECOND], Value::Int(88_526_912));
    }

    #[test]
    fn test_missing_counters_degrade_to_absent() {
        let summary = vec![point(10.0, 9.8, 100, 1000), point(20.0, 0.0, 0, 0)];
        let rows = combine(&summary, &[], &Assumptions::default());
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert!(!first.contains_key(col::USER_CYCLES));
        assert!(!first.contains_key(col::KERNEL_CYCLES_PER_PACKET));
        assert!(!first.contains_key(col::INSTRUCTIONS_PER_SECOND));
        assert!(!first.contains_key(col::BRANCH_MISPRED_PER_PACKET));
        assert!(first.contains_key(col::TEST_DURATION));

        let second = &rows[1];
        assert!(!second.contains_key(col::CPU_UTIL_FRACTION));
        assert_eq!(second[col::PACKET_RATE], Value::Float(0.0));
        assert!(!second.contains_key(col::TEST_DURATION));
        assert!(!second.contains_key(col::TOTAL_TIME));
    }

    #[test]
    fn test_summary_wins_on_collision() {
        let summary = vec![point(10.0, 9.8, 100, 1000)];
        let counters = vec![CounterRecord {
            core_cycles: 5000,
            kernel_cycles: 300,
            user_cycles: 250,
            ..Default::default()
        }];
        let rows = combine(&summary, &counters, &Assumptions::default());
        assert_eq!(rows[0][col::TOTAL_CYCLES], Value::Int(1000));
        assert_eq!(rows[0][col::CORE_CYCLES], Value::Int(5000));
        assert_eq!(rows[0][col::USER_CYCLES], Value::Int(250));
    }

    #[test]
    fn test_core_cycles_alias_total() {
        let mut row = MergedRow::new();
        row.insert(col::CORE_CYCLES.to_string(), Value::Int(800));
        row.insert(col::KERNEL_CYCLES.to_string(), Value::Int(200));
        backfill_cycles(&mut row);
        assert_eq!(row[col::TOTAL_CYCLES], Value::Int(800));
        assert_eq!(row[col::USER_CYCLES], Value::Int(600));
    }

    #[test]
    fn test_user_cycles_exact_for_large_counts() {
        let mut row = MergedRow::new();
        row.insert(col::TOTAL_CYCLES.to_string(), Value::Int(9_007_199_254_740_993));
        row.insert(col::KERNEL_CYCLES.to_string(), Value::Int(2));
        row.insert(col::IDLE_CYCLES.to_string(), Value::Int(0));
        backfill_cycles(&mut row);
        assert_eq!(row[col::USER_CYCLES], Value::Int(9_007_199_254_740_991));
    }

    #[test]
    fn test_user_cycles_from_float_inputs() {
        let mut row = MergedRow::new();
        row.insert(col::TOTAL_CYCLES.to_string(), Value::Float(1000.0));
        row.insert(col::KERNEL_CYCLES.to_string(), Value::Int(300));
        row.insert(col::IDLE_CYCLES.to_string(), Value::Float(100.5));
        backfill_cycles(&mut row);
        assert_eq!(row[col::USER_CYCLES], Value::Int(599));
    }

    #[test]
    fn test_combine_is_deterministic() {
        let summary = vec![point(10.0, 9.8, 100, 1000), point(20.0, 19.5, 50, 1000)];
        let counters = vec![CounterRecord {
            kernel_cycles: 300,
            ..Default::default()
        }];
        let a = combine(&summary, &counters, &Assumptions::default());
        let b = combine(&summary, &counters, &Assumptions::default());
        assert_eq!(a, b);
    }
}
