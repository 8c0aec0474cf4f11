/// Incremental mean: fold `value` into an average that previously covered
/// `count - 1` samples.
pub fn rolling_mean(prev_mean: f64, count: u32, value: f64) -> f64 {
    match count {
        0 => prev_mean,
        n => (prev_mean * (n - 1) as f64 + value) / n as f64,
    }
}

/// Format a duration in whole seconds as `m:ss`.
pub fn clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_mean() {
        assert_eq!(rolling_mean(40.0, 3, 52.0), 44.0);
        assert_eq!(rolling_mean(0.0, 1, 17.0), 17.0);
    }

    #[test]
    fn test_rolling_mean_matches_batch_mean() {
        let values = [10., 20., 30., 15., 22.];
        let mut avg = 0.0;
        for (i, v) in values.iter().enumerate() {
            avg = rolling_mean(avg, i as u32 + 1, *v);
        }
        assert!((avg - 19.4).abs() < 1e-9);
    }

    #[test]
    fn test_rolling_mean_zero_count_is_noop() {
        assert_eq!(rolling_mean(12.5, 0, 99.0), 12.5);
    }

    #[test]
    fn test_clock() {
        assert_eq!(clock(0), "0:00");
        assert_eq!(clock(59), "0:59");
        assert_eq!(clock(60), "1:00");
        assert_eq!(clock(125), "2:05");
    }
}
