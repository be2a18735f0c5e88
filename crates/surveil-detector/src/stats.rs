//! Welford rolling statistics.

/// Running mean and sample variance (Welford's algorithm).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RollingStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RollingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate every value of an iterator.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut stats = Self::new();
        for v in values {
            stats.push(v);
        }
        stats
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation; 0 with fewer than two values.
    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).max(0.0).sqrt()
    }

    /// Standard score of `value`; 0 when the deviation is below `epsilon`.
    pub fn zscore(&self, value: f64, epsilon: f64) -> f64 {
        let std = self.std_dev();
        if std < epsilon || !std.is_finite() {
            return 0.0;
        }
        (value - self.mean) / std
    }
}
