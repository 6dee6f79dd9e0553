//! Throughput/RTT summary log extraction.
//!
//! Two layouts are seen in archived logs:
//! 1. a `Result Summary:` section with a CSV header followed by one line per test point
//! 2. older runs with no marker, where each test point repeats the header before its row

use regex::CaptureMatches;
use std::str::Lines;

use crate::model::TestPointRecord;

const SUMMARY_MARKER: &str = "Result Summary:";
const FIELD_COUNT: usize = 12;

/// Lazily yields the test points of a summary log in file order.
pub struct SummaryRows<'a> {
    source: Source<'a>,
}

enum Source<'a> {
    Block(Lines<'a>),
    Scan(CaptureMatches<'static, 'a>),
    Empty,
}

pub fn extract_summary(content: &str) -> SummaryRows<'_> {
    let source = match content.find(SUMMARY_MARKER) {
        Some(start) => {
            let block = regex!(
                r"Requested_Throughput,Receive_Throughput,Send_Throughput,Packet_Size,Minimum_RTT,Average_RTT,Maximum_RTT,Stdev_RTT,Median_RTT,Bad_Packets,Idle_Cycles,Total_Cycles\r?\n((?:\d+,\d+,\d+,\d+,\d+,\d+,\d+,[\d.]+,\d+,\d+,\d+,\d+(?:\r?\n)?)+)"
            );
            match block.captures(&content[start..]) {
                Some(caps) => match caps.get(1) {
                    Some(m) => Source::Block(m.as_str().lines()),
                    None => Source::Empty,
                },
                None => {
                    log::debug!("summary marker found but no result block follows it");
                    Source::Empty
                }
            }
        }
        None => {
            let row = regex!(
                r"Requested_Throughput,Receive_Throughput,Send_Throughput,Packet_Size,Minimum_RTT,Average_RTT,Maximum_RTT,Stdev_RTT,Median_RTT,Bad_Packets,Idle_Cycles,Total_Cycles\r?\n\s*(\d+),(\d+),(\d+),(\d+),(\d+),(\d+),(\d+),([\d.]+),(\d+),(\d+),(\d+),(\d+)"
            );
            Source::Scan(row.captures_iter(content))
        }
    };
    SummaryRows { source }
}

impl<'a> Iterator for SummaryRows<'a> {
    type Item = TestPointRecord;

    fn next(&mut self) -> Option<TestPointRecord> {
        loop {
            let parsed = match &mut self.source {
                Source::Block(lines) => {
                    let line = lines.next()?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let fields: Vec<&str> = line.trim().split(',').collect();
                    if fields.len() < FIELD_COUNT {
                        continue;
                    }
                    parse_fields(&fields[..FIELD_COUNT])
                }
                Source::Scan(matches) => {
                    let caps = matches.next()?;
                    let fields: Vec<&str> = (1..=FIELD_COUNT)
                        .filter_map(|i| caps.get(i).map(|m| m.as_str()))
                        .collect();
                    parse_fields(&fields)
                }
                Source::Empty => return None,
            };
            match parsed {
                Some(record) => return Some(record),
                None => log::debug!("skipping unparseable summary row"),
            }
        }
    }
}

fn parse_fields(fields: &[&str]) -> Option<TestPointRecord> {
    if fields.len() != FIELD_COUNT {
        return None;
    }
    let int = |i: usize| fields[i].trim().parse::<i64>().ok();
    let mbps = |i: usize| int(i).map(|bps| bps as f64 / 1_000_000.0);

    Some(TestPointRecord {
        requested_mbps: mbps(0)?,
        received_mbps: mbps(1)?,
        sent_mbps: mbps(2)?,
        packet_size: int(3)?,
        min_rtt: int(4)?,
        mean_rtt: int(5)?,
        max_rtt: int(6)?,
        stdev_rtt: fields[7].trim().parse::<f64>().ok()?,
        median_rtt: int(8)?,
        bad_packets: int(9)?,
        idle_cycles: int(10)?,
        total_cycles: int(11)?,
    })
}
