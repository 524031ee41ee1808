//! Trend Fitting Module
//! The capability interface the trend presenters draw through: a fitter
//! takes (x, y) samples and returns fitted samples at the same x values.

/// A curve fitted to scatter samples. Output is aligned with the input:
/// one fitted point per sample, same x, same order.
pub trait CurveFit {
    fn fit(&self, samples: &[(f64, f64)]) -> Vec<(f64, f64)>;
}

/// Ordinary least-squares line.
pub struct LinearFit;

impl CurveFit for LinearFit {
    fn fit(&self, samples: &[(f64, f64)]) -> Vec<(f64, f64)> {
        let n = samples.len() as f64;
        if samples.is_empty() {
            return Vec::new();
        }

        let mean_x = samples.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = samples.iter().map(|(_, y)| y).sum::<f64>() / n;
        let var_x = samples.iter().map(|(x, _)| (x - mean_x).powi(2)).sum::<f64>();
        let cov = samples
            .iter()
            .map(|(x, y)| (x - mean_x) * (y - mean_y))
            .sum::<f64>();

        // Degenerate x (single sample or identical xs): horizontal line.
        let slope = if var_x > 0.0 { cov / var_x } else { 0.0 };
        let intercept = mean_y - slope * mean_x;

        samples
            .iter()
            .map(|&(x, _)| (x, intercept + slope * x))
            .collect()
    }
}

/// Centered moving average, a simple stand-in for library smoothing.
/// The window shrinks near the edges so the curve spans the full range.
pub struct MovingAverage {
    pub window: usize,
}

impl CurveFit for MovingAverage {
    fn fit(&self, samples: &[(f64, f64)]) -> Vec<(f64, f64)> {
        let half = self.window.max(1) / 2;
        samples
            .iter()
            .enumerate()
            .map(|(i, &(x, _))| {
                let lo = i.saturating_sub(half);
                let hi = (i + half + 1).min(samples.len());
                let mean = samples[lo..hi].iter().map(|(_, y)| y).sum::<f64>()
                    / (hi - lo) as f64;
                (x, mean)
            })
            .collect()
    }
}
