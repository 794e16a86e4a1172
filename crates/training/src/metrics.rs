//! Running scalar metrics.

/// Running mean of a scalar across iterations.
///
/// Reset once per training epoch and once per validation pass. `average`
/// returns `0.0` before the first update rather than NaN, so progress lines
/// printed on empty loaders stay readable.
#[derive(Debug, Default, Clone, Copy)]
pub struct AverageMeter {
    sum: f64,
    count: usize,
}

impl AverageMeter {
    pub fn update(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}
