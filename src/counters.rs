//! Hardware counter / cycle accounting log extraction.
//!
//! The measurement tooling changed its report layout between versions, and
//! archived logs of both layouts still need to be processed.

use std::collections::{BTreeMap, HashMap};

use crate::config::{components_of_interest, throughput_labels};
use crate::model::{ComponentUtil, CounterRecord, HardwareCounters};

const SYSTEM_TOTAL_PREFIX: &str = "System Total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Per-label `System Total` aggregates plus CSV counter and component tables.
    Aggregate,
    /// Brace-delimited counter and utilisation blocks, one pair per test point.
    Legacy,
}

impl LogFormat {
    pub fn detect(content: &str) -> LogFormat {
        let first_line = content.lines().next().unwrap_or("");
        if first_line.contains("Core Cycles") && content.contains(SYSTEM_TOTAL_PREFIX) {
            LogFormat::Aggregate
        } else {
            LogFormat::Legacy
        }
    }
}

pub fn extract_counters(content: &str) -> Vec<CounterRecord> {
    let format = LogFormat::detect(content);
    log::info!("counter log format: {:?}", format);
    match format {
        LogFormat::Aggregate => extract_aggregate(content),
        LogFormat::Legacy => extract_legacy(content),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CycleTotals {
    core: i64,
    system: i64,
    kernel: i64,
    user: i64,
    kernel_entries: i64,
    schedules: i64,
}

fn parse_system_total(line: &str) -> Option<(String, CycleTotals)> {
    let parts: Vec<&str> = line.trim().split(',').collect();
    if parts.len() < 7 {
        return None;
    }
    let label = parts[0].replace("System Total ", "");
    let int = |i: usize| parts[i].trim().parse::<i64>().ok();
    Some((
        label,
        CycleTotals {
            core: int(1)?,
            system: int(2)?,
            kernel: int(3)?,
            user: int(4)?,
            kernel_entries: int(5)?,
            schedules: int(6)?,
        },
    ))
}

fn parse_hardware_line(line: &str) -> Option<HardwareCounters> {
    let parts: Vec<&str> = line.trim().split(',').collect();
    if parts.len() < 6 {
        return None;
    }
    let int = |i: usize| -> Option<i64> {
        match parts[i].trim() {
            "" => Some(0),
            s => s.parse::<i64>().ok(),
        }
    };
    Some(HardwareCounters {
        l1_icache_misses: int(0)?,
        l1_dcache_misses: int(1)?,
        l1_itlb_misses: int(2)?,
        l1_dtlb_misses: int(3)?,
        instructions: int(4)?,
        branch_mispredictions: int(5)?,
    })
}

fn parse_hardware_section(lines: &[&str]) -> Vec<HardwareCounters> {
    let header = lines
        .iter()
        .position(|l| l.contains("L1 i-cache misses") && l.contains("L1 d-cache misses"));
    let Some(header) = header else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for line in &lines[header + 1..] {
        if line.trim().is_empty() {
            break;
        }
        match parse_hardware_line(line) {
            Some(hw) => out.push(hw),
            None => log::debug!("skipping hardware counter line: {}", line.trim()),
        }
    }
    out
}

fn parse_component_line(line: &str) -> Option<ComponentUtil> {
    let parts: Vec<&str> = line.trim().split(',').collect();
    if parts.len() < 9 {
        return None;
    }
    let user = match parts.get(9) {
        Some(s) => s.trim().parse::<f64>().ok()?,
        None => 0.0,
    };
    Some(ComponentUtil {
        cpu: parts[7].trim().parse::<f64>().ok()?,
        kernel: parts[8].trim().parse::<f64>().ok()?,
        user,
    })
}

/// Splits component utilisation lines into one bucket per `TEST` marker.
fn parse_component_buckets(lines: &[&str]) -> Vec<BTreeMap<String, ComponentUtil>> {
    let mut buckets: Vec<BTreeMap<String, ComponentUtil>> = Vec::new();
    for line in lines {
        if line.starts_with("TEST") {
            buckets.push(BTreeMap::new());
        }
        for component in components_of_interest() {
            let is_component = line
                .strip_prefix(component)
                .map(|rest| rest.starts_with(','))
                .unwrap_or(false);
            if !is_component {
                continue;
            }
            let (Some(bucket), Some(util)) = (buckets.last_mut(), parse_component_line(line)) else {
                continue;
            };
            bucket.insert(component.to_string(), util);
        }
    }
    buckets
}

fn extract_aggregate(content: &str) -> Vec<CounterRecord> {
    let lines: Vec<&str> = content.lines().collect();

    let mut totals: HashMap<String, CycleTotals> = HashMap::new();
    for line in &lines {
        if !line.starts_with(SYSTEM_TOTAL_PREFIX) {
            continue;
        }
        match parse_system_total(line) {
            Some((label, t)) => {
                totals.insert(label, t);
            }
            None => log::debug!("skipping system total line: {}", line.trim()),
        }
    }

    let hardware = parse_hardware_section(&lines);
    let buckets = parse_component_buckets(&lines);
    log::debug!(
        "aggregate log: {} labelled totals, {} hardware rows, {} component buckets",
        totals.len(),
        hardware.len(),
        buckets.len()
    );

    let mut records = Vec::new();
    for (i, label) in throughput_labels().iter().enumerate() {
        let Some(t) = totals.get(*label) else {
            continue;
        };
        records.push(CounterRecord {
            label: Some(label.to_string()),
            core_cycles: t.core,
            system_cycles: Some(t.system),
            kernel_cycles: t.kernel,
            user_cycles: t.user,
            kernel_entries: t.kernel_entries,
            schedules: t.schedules,
            hardware: hardware.get(i).copied(),
            components: buckets.get(i).cloned().unwrap_or_default(),
        });
    }
    records
}

fn extract_legacy(content: &str) -> Vec<CounterRecord> {
    let hw_re = regex!(
        r"\{[\s\n]*L1 i-cache misses:\s*(\d+)[\s\n]*L1 d-cache misses:\s*(\d+)[\s\n]*L1 i-tlb misses:\s*(\d+)[\s\n]*L1 d-tlb misses:\s*(\d+)[\s\n]*Instructions:\s*(\d+)[\s\n]*Branch mispredictions:\s*(\d+)[\s\n]*\}"
    );
    let util_re = regex!(
        r"Total utilisation details:[\s\n]*\{[\s\n]*KernelUtilisation:\s*(\d+)[\s\n]*KernelEntries:\s*(\d+)[\s\n]*NumberSchedules:\s*(\d+)[\s\n]*TotalUtilisation:\s*(\d+)"
    );

    let hardware: Vec<HardwareCounters> = hw_re
        .captures_iter(content)
        .filter_map(|caps| {
            let int = |i: usize| caps[i].parse::<i64>().ok();
            Some(HardwareCounters {
                l1_icache_misses: int(1)?,
                l1_dcache_misses: int(2)?,
                l1_itlb_misses: int(3)?,
                l1_dtlb_misses: int(4)?,
                instructions: int(5)?,
                branch_mispredictions: int(6)?,
            })
        })
        .collect();

    // (kernel utilisation, kernel entries, schedules, total utilisation)
    let utilisation: Vec<[i64; 4]> = util_re
        .captures_iter(content)
        .filter_map(|caps| {
            let int = |i: usize| caps[i].parse::<i64>().ok();
            Some([int(1)?, int(2)?, int(3)?, int(4)?])
        })
        .collect();

    if hardware.len() != utilisation.len() {
        log::warn!(
            "legacy counter log has {} hardware blocks but {} utilisation blocks, using {}",
            hardware.len(),
            utilisation.len(),
            hardware.len().min(utilisation.len())
        );
    }

    hardware
        .into_iter()
        .zip(utilisation)
        .map(|(hw, [kernel, entries, schedules, total])| CounterRecord {
            label: None,
            core_cycles: total,
            system_cycles: None,
            kernel_cycles: kernel,
            user_cycles: 0,
            kernel_entries: entries,
            schedules,
            hardware: Some(hw),
            components: BTreeMap::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate_log() -> String {
        let mut log = String::from("Name,Core Cycles,System Cycles,Kernel Cycles,User Cycles,Kernel Entries,Schedules\n");
        log.push_str("TEST 10Mb/s\n");
        log.push_str("ethernet_driver,1,2,3,4,5,6,0.10,0.05,0.05\n");
        log.push_str("client0,1,2,3,4,5,6,0.20,0.15\n");
        log.push_str("client0_net_copier,1,2,3,4,5,6,0.30,0.10,0.20\n");
        log.push_str("System Total 10Mb/s,1000,1100,300,0,40,50\n");
        log.push_str("TEST 20Mb/s\n");
        log.push_str("net_virt_rx,1,2,3,4,5,6,0.40,0.30,0.10\n");
        log.push_str("System Total 20Mb/s,2000,2100,500,700,80,90\n");
        log.push_str("TEST 50Mb/s\n");
        log.push_str("System Total 50Mb/s,5000,5100,900,1200,160,190\n");
        log.push_str("\nL1 i-cache misses,L1 d-cache misses,L1 i-tlb misses,L1 d-tlb misses,Instructions,Branch mispredictions\n");
        log.push_str("100,200,3,4,500000,60\n");
        log.push_str("110,210,,5,510000,61\n");
        log.push_str("120,220,5,6,520000,62\n");
        log.push_str("\n999,999,999,999,999,999\n");
        log
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(LogFormat::detect(&aggregate_log()), LogFormat::Aggregate);
        assert_eq!(
            LogFormat::detect("Core Cycles header only\nno totals\n"),
            LogFormat::Legacy
        );
        assert_eq!(
            LogFormat::detect("first line\nSystem Total 10Mb/s,1,2,3,4,5,6\nCore Cycles\n"),
            LogFormat::Legacy
        );
        assert_eq!(LogFormat::detect(""), LogFormat::Legacy);
    }

    #[test]
    fn test_aggregate_records_follow_canonical_order() {
        let records = extract_counters(&aggregate_log());
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].label.as_deref(), Some("10Mb/s"));
        assert_eq!(records[0].core_cycles, 1000);
        assert_eq!(records[0].system_cycles, Some(1100));
        assert_eq!(records[0].kernel_cycles, 300);
        assert_eq!(records[1].user_cycles, 700);
        assert_eq!(records[2].schedules, 190);

        let hw = records[1].hardware.unwrap();
        assert_eq!(hw.l1_itlb_misses, 0);
        assert_eq!(hw.instructions, 510000);
        assert_eq!(records[2].hardware.unwrap().branch_mispredictions, 62);
    }

    #[test]
    fn test_hardware_section_stops_at_blank_line() {
        let lines: Vec<&str> = "L1 i-cache misses,L1 d-cache misses\n1,2,3,4,5,6\n\n7,8,9,10,11,12\n"
            .lines()
            .collect();
        let hw = parse_hardware_section(&lines);
        assert_eq!(hw.len(), 1);
        assert_eq!(hw[0].branch_mispredictions, 6);
    }

    #[test]
    fn test_component_buckets() {
        let records = extract_counters(&aggregate_log());
        let first = &records[0].components;
        assert_eq!(first.len(), 3);
        assert_eq!(first["ethernet_driver"].cpu, 0.10);
        assert_eq!(first["client0"].kernel, 0.15);
        assert_eq!(first["client0"].user, 0.0);
        assert_eq!(first["client0_net_copier"].user, 0.20);
        assert_eq!(records[1].components["net_virt_rx"].cpu, 0.40);
        assert!(records[2].components.is_empty());
    }

    #[test]
    fn test_component_lines_before_first_test_are_ignored() {
        let lines = ["ethernet_driver,1,2,3,4,5,6,0.1,0.1,0.0", "TEST 10Mb/s"];
        let buckets = parse_component_buckets(&lines);
        assert_eq!(buckets.len(), 1);
        assert!(buckets[0].is_empty());
    }

    #[test]
    fn test_missing_label_keeps_canonical_index() {
        let log = "Name,Core Cycles\n\
                   System Total 10Mb/s,1000,1100,300,0,40,50\n\
                   System Total 50Mb/s,5000,5100,900,1200,160,190\n\
                   L1 i-cache misses,L1 d-cache misses\n\
                   1,1,1,1,1,1\n2,2,2,2,2,2\n3,3,3,3,3,3\n";
        let records = extract_counters(log);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].label.as_deref(), Some("50Mb/s"));
        assert_eq!(records[1].hardware.unwrap().instructions, 3);
    }

    #[test]
    fn test_aggregate_is_bounded_by_label_list() {
        let mut log = String::from("Core Cycles\n");
        for label in throughput_labels() {
            log.push_str(&format!("System Total {},1,1,1,1,1,1\n", label));
        }
        log.push_str("System Total 2000Mb/s,1,1,1,1,1,1\n");
        log.push_str("System Total 10Mb/s,bad,1,1,1,1,1\n");
        let records = extract_counters(&log);
        assert_eq!(records.len(), throughput_labels().len());
        assert!(records.len() <= 13);
    }

    #[test]
    fn test_legacy_format_zips_to_shorter() {
        let log = "\
run 1
{
  L1 i-cache misses: 10
  L1 d-cache misses: 20
  L1 i-tlb misses: 3
  L1 d-tlb misses: 4
  Instructions: 5000
  Branch mispredictions: 6
}
Total utilisation details:
{
  KernelUtilisation: 300
  KernelEntries: 40
  NumberSchedules: 50
  TotalUtilisation: 1000
}
run 2
{
  L1 i-cache misses: 11
  L1 d-cache misses: 21
  L1 i-tlb misses: 4
  L1 d-tlb misses: 5
  Instructions: 6000
  Branch mispredictions: 7
}
";
        let records = extract_counters(log);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.label, None);
        assert_eq!(r.kernel_cycles, 300);
        assert_eq!(r.kernel_entries, 40);
        assert_eq!(r.schedules, 50);
        assert_eq!(r.core_cycles, 1000);
        assert_eq!(r.user_cycles, 0);
        assert_eq!(r.system_cycles, None);
        assert_eq!(r.hardware.unwrap().instructions, 5000);
    }
}
