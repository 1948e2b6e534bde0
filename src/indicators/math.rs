//indicator math over price columns
//every function returns a vector the same length as its input, NaN wherever the
//value is undefined (warmup, NaN input in the window, zero denominator)

//simple moving average; any NaN in the window yields NaN
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |window| {
        window.iter().sum::<f64>() / window.len() as f64
    })
}

//sample standard deviation over a rolling window
pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    if period < 2 {
        return vec![f64::NAN; values.len()];
    }
    rolling(values, period, |window| {
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    })
}

pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |window| {
        window.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

pub fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |window| {
        window.iter().copied().fold(f64::INFINITY, f64::min)
    })
}

fn rolling(values: &[f64], period: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    for end in period..=values.len() {
        let window = &values[end - period..end];
        if window.iter().all(|v| v.is_finite()) {
            out[end - 1] = f(window);
        }
    }
    out
}

//exponentially weighted mean, recursive form: y = a*x + (1-a)*y_prev
//the first min_periods finite observations are reported as NaN
pub fn ewm(values: &[f64], alpha: f64, min_periods: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if !(alpha > 0.0 && alpha <= 1.0) {
        return out;
    }

    let mut state: Option<f64> = None;
    let mut seen = 0usize;

    for (i, &x) in values.iter().enumerate() {
        if !x.is_finite() {
            continue;
        }
        seen += 1;
        let next = match state {
            Some(prev) => alpha * x + (1.0 - alpha) * prev,
            None => x,
        };
        state = Some(next);
        if seen >= min_periods.max(1) {
            out[i] = next;
        }
    }
    out
}

//span-based ema (alpha = 2 / (span + 1)), defined from the first observation
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 {
        return vec![f64::NAN; values.len()];
    }
    ewm(values, 2.0 / (span as f64 + 1.0), 1)
}

//wilder smoothing (alpha = 1 / period) with a full-period warmup
pub fn wilder(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    ewm(values, 1.0 / period as f64, period)
}

//first difference; index 0 is NaN
pub fn diff(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        out[i] = values[i] - values[i - 1];
    }
    out
}

//percentage change over `periods` rows; zero base yields NaN
pub fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if periods == 0 {
        return out;
    }
    for i in periods..values.len() {
        out[i] = safe_div(values[i] - values[i - periods], values[i - periods]);
    }
    out
}

//elementwise a / b, NaN where b is zero or either side is undefined
pub fn ratio(numerator: &[f64], denominator: &[f64]) -> Vec<f64> {
    numerator
        .iter()
        .zip(denominator)
        .map(|(&a, &b)| safe_div(a, b))
        .collect()
}

pub fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 || !a.is_finite() || !b.is_finite() {
        f64::NAN
    } else {
        a / b
    }
}

//relative strength index with wilder smoothing
//zero average loss is a zero denominator and resolves to NaN
pub fn wilder_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let delta = diff(closes);
    let gains: Vec<f64> = delta
        .iter()
        .map(|&d| if d > 0.0 { d } else { 0.0 })
        .collect();
    let losses: Vec<f64> = delta
        .iter()
        .map(|&d| if d < 0.0 { -d } else { 0.0 })
        .collect();

    let avg_gain = wilder(&gains, period);
    let avg_loss = wilder(&losses, period);

    ratio(&avg_gain, &avg_loss)
        .into_iter()
        .map(|rs| 100.0 - 100.0 / (1.0 + rs))
        .collect()
}

pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    (0..high.len())
        .map(|i| {
            let hl = high[i] - low[i];
            if i == 0 {
                return hl;
            }
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        })
        .collect()
}

//average true range as a rolling mean of true range
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    sma(&true_range(high, low, close), period)
}

//average directional index
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = high.len();
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];

    for i in 1..n {
        let up = high[i] - high[i - 1];
        let down = low[i - 1] - low[i];
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let smoothed_tr = wilder(&true_range(high, low, close), period);
    let plus_di: Vec<f64> = ratio(&wilder(&plus_dm, period), &smoothed_tr)
        .into_iter()
        .map(|v| v * 100.0)
        .collect();
    let minus_di: Vec<f64> = ratio(&wilder(&minus_dm, period), &smoothed_tr)
        .into_iter()
        .map(|v| v * 100.0)
        .collect();

    let dx: Vec<f64> = plus_di
        .iter()
        .zip(&minus_di)
        .map(|(&p, &m)| 100.0 * safe_div((p - m).abs(), p + m))
        .collect();

    wilder(&dx, period)
}

//cumulative volume-weighted typical price; rows with undefined volume add nothing
pub fn vwap(high: &[f64], low: &[f64], close: &[f64], volume: &[f64]) -> Vec<f64> {
    let mut weighted = 0.0;
    let mut total = 0.0;

    (0..close.len())
        .map(|i| {
            if volume[i].is_finite() {
                weighted += (high[i] + low[i] + close[i]) / 3.0 * volume[i];
                total += volume[i];
            }
            safe_div(weighted, total)
        })
        .collect()
}
