use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

//a point in the equity curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,

    //running peak minus equity, in currency
    pub drawdown: f64,

    //drawdown relative to the running peak
    pub drawdown_pct: f64,

    //day-over-day percentage change, 0 on the first sample
    pub returns: f64,
}

impl EquityPoint {
    pub fn new(date: NaiveDate, equity: f64, drawdown: f64, drawdown_pct: f64, returns: f64) -> Self {
        EquityPoint {
            date,
            equity,
            drawdown,
            drawdown_pct,
            returns,
        }
    }
}

//calculates the equity curve with drawdowns; the peak starts at the first sample
pub fn calculate_equity_curve(samples: &[(NaiveDate, f64)]) -> Vec<EquityPoint> {
    let mut curve = Vec::with_capacity(samples.len());
    let mut peak = f64::NEG_INFINITY;
    let mut prev_equity: Option<f64> = None;

    for &(date, equity) in samples {
        peak = peak.max(equity);

        let drawdown = peak - equity;
        let drawdown_pct = if peak > 0.0 { drawdown / peak } else { 0.0 };

        let returns = prev_equity.map_or(0.0, |prev| pct_return(prev, equity).unwrap_or(0.0));

        curve.push(EquityPoint::new(date, equity, drawdown, drawdown_pct, returns));
        prev_equity = Some(equity);
    }

    curve
}

//largest drawdown in currency and as a fraction of the running peak
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> (f64, f64) {
    equity_curve.iter().fold((0.0, 0.0), |(abs, pct), point| {
        (f64::max(abs, point.drawdown), f64::max(pct, point.drawdown_pct))
    })
}

//day-over-day returns; steps from a zero or non-finite base are skipped
pub fn calculate_returns(equity_values: &[f64]) -> Vec<f64> {
    equity_values
        .windows(2)
        .filter_map(|pair| pct_return(pair[0], pair[1]))
        .collect()
}

fn pct_return(prev: f64, current: f64) -> Option<f64> {
    let r = (current - prev) / prev;
    (prev != 0.0 && r.is_finite()).then_some(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(values: &[f64]) -> Vec<(NaiveDate, f64)> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (start + chrono::Duration::days(i as i64), v))
            .collect()
    }

    #[test]
    fn drawdown_is_measured_from_running_peak() {
        let curve = calculate_equity_curve(&samples(&[100.0, 120.0, 90.0, 130.0, 117.0]));
        assert_eq!(curve[2].drawdown, 30.0);
        assert_eq!(curve[2].drawdown_pct, 0.25);
        assert_eq!(curve[3].drawdown, 0.0);

        let (abs, pct) = max_drawdown(&curve);
        assert_eq!(abs, 30.0);
        assert_eq!(pct, 0.25);
    }

    #[test]
    fn first_return_is_zero() {
        let curve = calculate_equity_curve(&samples(&[100.0, 110.0]));
        assert_eq!(curve[0].returns, 0.0);
        assert!((curve[1].returns - 0.1).abs() < 1e-12);
    }

    #[test]
    fn empty_curve_has_no_drawdown() {
        assert!(calculate_equity_curve(&[]).is_empty());
        assert_eq!(max_drawdown(&[]), (0.0, 0.0));
    }

    #[test]
    fn zero_base_returns_are_skipped() {
        assert_eq!(calculate_returns(&[0.0, 10.0, 20.0]), vec![1.0]);
        assert!(calculate_returns(&[5.0]).is_empty());
    }
}
