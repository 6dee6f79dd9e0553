//! Cross-configuration comparison of parsed tables, aligned on requested throughput.

use crate::config::CompareMetric;
use crate::model::{col, MergedRow};
use crate::stats::{displayed, relative_diff};

#[derive(Debug)]
pub struct Dataset {
    pub label: String,
    pub rows: Vec<MergedRow>,
}

impl Dataset {
    fn row_for(&self, requested: f64) -> Option<&MergedRow> {
        self.rows.iter().find(|r| {
            r.get(col::REQU_THRPUT)
                .map(|v| v.as_f64() == requested)
                .unwrap_or(false)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonPoint {
    pub requested: f64,
    /// One entry per dataset, baseline first.
    pub values: Vec<Option<f64>>,
    /// One entry per non-baseline dataset.
    pub diffs: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricComparison {
    pub title: String,
    pub points: Vec<ComparisonPoint>,
}

/// Drops rows without kernel cycle accounting, which cannot be compared on CPU cost.
pub fn drop_incomplete(rows: &mut Vec<MergedRow>) -> usize {
    let before = rows.len();
    rows.retain(|r| r.contains_key(col::KERNEL_CYCLES));
    before - rows.len()
}

pub fn compare(datasets: &[Dataset], metrics: &[CompareMetric]) -> Vec<MetricComparison> {
    let Some(baseline) = datasets.first() else {
        return Vec::new();
    };

    metrics
        .iter()
        .map(|metric| {
            let points = baseline
                .rows
                .iter()
                .filter_map(|row| row.get(col::REQU_THRPUT).map(|v| v.as_f64()))
                .map(|requested| {
                    let values: Vec<Option<f64>> = datasets
                        .iter()
                        .map(|d| {
                            d.row_for(requested)
                                .and_then(|r| r.get(&metric.column))
                                .map(|v| displayed(v.as_f64() * metric.scale))
                        })
                        .collect();
                    let diffs = values[1..]
                        .iter()
                        .map(|other| match (values[0], *other) {
                            (Some(base), Some(other)) => relative_diff(base, other),
                            _ => None,
                        })
                        .collect();
                    ComparisonPoint {
                        requested,
                        values,
                        diffs,
                    }
                })
                .collect();
            MetricComparison {
                title: metric.title.clone(),
                points,
            }
        })
        .collect()
}
