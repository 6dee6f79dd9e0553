use anyhow::{Context, Result};
use prettytable::{Cell, Row, Table};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::compare::{Dataset, MetricComparison};
use crate::config::{base_columns, NA};
use crate::model::{col, MergedRow};
use crate::stats::{display_decimals, summarize};

/// Base columns in fixed order, then every other column seen in any row, sorted.
pub fn table_columns(rows: &[MergedRow]) -> Vec<String> {
    let base = base_columns();
    let extra: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.keys().map(|k| k.as_str()))
        .filter(|k| !base.contains(k))
        .collect();

    base.iter()
        .copied()
        .chain(extra)
        .map(|c| c.to_string())
        .collect()
}

pub fn write_rows<W: Write>(rows: &[MergedRow], writer: W) -> Result<()> {
    let columns = table_columns(rows);
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&columns)?;
    for row in rows {
        let cells = columns.iter().map(|c| match row.get(c) {
            Some(v) => v.to_string(),
            None => NA.to_string(),
        });
        wtr.write_record(cells)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_table(rows: &[MergedRow], path: &Path) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_rows(rows, std::io::BufWriter::new(file))
        .with_context(|| format!("write table {}", path.display()))
}

fn fmt_value(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.*}", display_decimals(v), v),
        None => NA.to_string(),
    }
}

fn fmt_diff(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:+.1}%", v),
        None => NA.to_string(),
    }
}

pub fn build_comparison_table(cmp: &MetricComparison, datasets: &[Dataset]) -> Table {
    let mut table = Table::new();
    let baseline = datasets.first().map(|d| d.label.as_str()).unwrap_or("baseline");

    let mut titles = vec![Cell::new(col::REQU_THRPUT)];
    for d in datasets {
        titles.push(Cell::new(&d.label));
    }
    for d in datasets.iter().skip(1) {
        titles.push(Cell::new(&format!("{} vs {}", d.label, baseline)));
    }
    table.set_titles(Row::new(titles));

    for p in &cmp.points {
        let mut cells = vec![Cell::new(&format!("{}", p.requested))];
        cells.extend(p.values.iter().map(|v| Cell::new(&fmt_value(*v))));
        cells.extend(p.diffs.iter().map(|d| Cell::new(&fmt_diff(*d))));
        table.add_row(Row::new(cells));
    }

    // Mean relative difference per compared configuration, with its range.
    if datasets.len() > 1 {
        let mut cells = vec![Cell::new("mean diff")];
        cells.extend(datasets.iter().map(|_| Cell::new("")));
        for i in 0..datasets.len() - 1 {
            let diffs: Vec<f64> = cmp.points.iter().filter_map(|p| p.diffs[i]).collect();
            let text = match summarize(&diffs) {
                Some(s) => format!("{} ({:+.1}..{:+.1})", fmt_diff(Some(s.avg)), s.min, s.max),
                None => NA.to_string(),
            };
            cells.push(Cell::new(&text));
        }
        table.add_row(Row::new(cells));
    }
    table
}

pub fn print_comparisons(comparisons: &[MetricComparison], datasets: &[Dataset]) {
    for cmp in comparisons {
        println!("{}", cmp.title);
        build_comparison_table(cmp, datasets).printstd();
        println!();
    }
}
