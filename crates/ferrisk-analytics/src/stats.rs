//! Numeric helpers shared by the engines.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator); `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let sum_sq = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Population standard deviation (n denominator).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let sum_sq = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    Some((sum_sq / values.len() as f64).sqrt())
}

/// Percentile `q` in `[0, 100]` with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// `ln(p_t / p_{t-1})` for consecutive prices.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

/// `p_t / p_{t-1} - 1` for consecutive prices.
pub fn pct_change(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Mean of the last `n` values, or `None` when fewer than `n` exist.
pub fn trailing_mean(values: &[f64], n: usize) -> Option<f64> {
    if n == 0 || values.len() < n {
        return None;
    }
    mean(&values[values.len() - n..])
}

/// Mean of the last `n` values, using all of them when fewer exist.
pub fn tail_mean(values: &[f64], n: usize) -> Option<f64> {
    mean(&values[values.len().saturating_sub(n)..])
}

/// Largest peak-to-trough decline of `cumprod(1 + r)`, as a non-positive fraction.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut wealth = 1.0;
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for r in returns {
        wealth *= 1.0 + r;
        peak = peak.max(wealth);
        worst = worst.min(wealth / peak - 1.0);
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_linearly() {
        let values = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 50.0), Some(3.0));
        assert_eq!(percentile(&values, 100.0), Some(5.0));
        let p5 = percentile(&values, 5.0).expect("non-empty");
        assert!((p5 - 1.2).abs() < 1e-12);
        assert_eq!(percentile(&[], 5.0), None);
    }

    #[test]
    fn sample_and_population_std_differ_by_denominator() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(population_std(&values), Some(2.0));
        let sample = sample_std(&values).expect("enough values");
        assert!((sample - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn max_drawdown_tracks_running_peak() {
        let drawdown = max_drawdown(&[0.1, -0.5, 0.2]);
        assert!((drawdown - (-0.5)).abs() < 1e-12);
        assert_eq!(max_drawdown(&[0.0, 0.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn trailing_mean_requires_full_window() {
        assert_eq!(trailing_mean(&[1.0, 2.0, 3.0], 2), Some(2.5));
        assert_eq!(trailing_mean(&[1.0], 2), None);
        assert_eq!(tail_mean(&[1.0], 2), Some(1.0));
    }
}
