use std::cmp::Ordering;

pub fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (v * scale).round() / scale
}

/// Decimals shown in comparison tables: one from magnitude 10 upwards, two below.
pub fn display_decimals(v: f64) -> usize {
    if v.abs() >= 10.0 {
        1
    } else {
        2
    }
}

pub fn displayed(v: f64) -> f64 {
    round_to(v, display_decimals(v) as i32)
}

/// Percentage change of `other` relative to `base`; `None` for a zero base.
pub fn relative_diff(base: f64, other: f64) -> Option<f64> {
    if base == 0.0 || !base.is_finite() || !other.is_finite() {
        return None;
    }
    Some((other - base) / base * 100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffSummary {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

pub fn summarize(values: &[f64]) -> Option<DiffSummary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let cnt = sorted.len();
    let sum: f64 = sorted.iter().sum();
    Some(DiffSummary {
        avg: round_to(sum / cnt as f64, 2),
        min: sorted[0],
        max: sorted[cnt - 1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(7941.550190597204, 2), 7941.55);
        assert_eq!(round_to(25.184, 2), 25.18);
    }

    #[test]
    fn test_displayed() {
        assert_eq!(displayed(12.345), 12.3);
        assert_eq!(displayed(1.2345), 1.23);
        assert_eq!(displayed(-12.345), -12.3);
        assert_eq!(displayed(-1.2345), -1.23);
    }

    #[test]
    fn test_relative_diff() {
        assert_eq!(relative_diff(10.0, 12.0), Some(20.0));
        assert_eq!(relative_diff(10.0, 5.0), Some(-50.0));
        assert_eq!(relative_diff(0.0, 5.0), None);
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(&[]), None);
        let s = summarize(&[4.0, -1.0, 3.0]).unwrap();
        assert_eq!(s.avg, 2.0);
        assert_eq!(s.min, -1.0);
        assert_eq!(s.max, 4.0);
    }
}
