//! Fixed-range 1D histogram used by the grouping engine.
//!
//! One histogram is built per `process` call and discarded afterwards; the
//! engine fills it with truncated Gaussian kernels and removes extracted
//! peaks by subtracting them again. Bin lookup clips to the outermost bins,
//! so even a degenerate zero-width range is safe to query.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

/// `sqrt(2 * pi)`, the normalization constant of the Gaussian density.
pub const SQRT_TWO_PI: f64 = 2.506_628_274_631_000_2;

/// Value of the normalized Gaussian density at `x`.
///
/// `sigma` must be positive; the engine guarantees this for every call.
#[inline]
#[must_use]
pub fn gaussian_density(x: f64, center: f64, sigma: f64) -> f64 {
    let z = (x - center) / sigma;
    (-0.5 * z * z).exp() / (sigma * SQRT_TWO_PI)
}

/// Equal-width binned histogram over a closed time range.
#[derive(Debug, Clone, PartialEq)]
pub struct Hist1d {
    low: f64,
    high: f64,
    width: f64,
    contents: Vec<f64>,
}

impl Hist1d {
    /// Creates an empty histogram with `n_bins` bins over `[low, high]`.
    ///
    /// `n_bins` must be at least 1.
    #[must_use]
    pub fn new(n_bins: usize, low: f64, high: f64) -> Self {
        assert!(n_bins >= 1, "histogram needs at least one bin");
        #[allow(clippy::cast_precision_loss)]
        let width = (high - low) / n_bins as f64;
        Self {
            low,
            high,
            width,
            contents: vec![0.0; n_bins],
        }
    }

    /// Number of bins.
    #[inline]
    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.contents.len()
    }

    /// Lower edge of the range.
    #[inline]
    #[must_use]
    pub fn low_edge(&self) -> f64 {
        self.low
    }

    /// Upper edge of the range.
    #[inline]
    #[must_use]
    pub fn high_edge(&self) -> f64 {
        self.high
    }

    /// Center of bin `index`.
    #[inline]
    #[must_use]
    pub fn bin_center(&self, index: usize) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let offset = (index as f64 + 0.5) * self.width;
        self.low + offset
    }

    /// Content of bin `index`.
    #[inline]
    #[must_use]
    pub fn content(&self, index: usize) -> f64 {
        self.contents[index]
    }

    /// The bin containing `x`, clipped to the first/last bin for values at
    /// or beyond the range edges.
    #[must_use]
    pub fn find_bin(&self, x: f64) -> usize {
        let last = self.contents.len() - 1;
        if x <= self.low {
            return 0;
        }
        if x >= self.high {
            return last;
        }
        // Here low < x < high, hence width > 0.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = ((x - self.low) / self.width) as usize;
        index.min(last)
    }

    /// The first bin holding the maximum content, with that content.
    #[must_use]
    pub fn maximum_bin(&self) -> (usize, f64) {
        let mut best = 0;
        let mut best_value = self.contents[0];
        for (index, &value) in self.contents.iter().enumerate().skip(1) {
            if value > best_value {
                best = index;
                best_value = value;
            }
        }
        (best, best_value)
    }

    /// Sum of all bin contents.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.contents.iter().sum()
    }

    /// Bin centers and contents for bins whose centers lie in `[low, high]`.
    #[must_use]
    pub fn samples_within(&self, low: f64, high: f64) -> (Vec<f64>, Vec<f64>) {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for (index, &content) in self.contents.iter().enumerate() {
            let center = self.bin_center(index);
            if center >= low && center <= high {
                xs.push(center);
                ys.push(content);
            }
        }
        (xs, ys)
    }

    /// Adds a unit count to the bin containing `x`.
    ///
    /// Values outside the range are dropped; there are no underflow or
    /// overflow bins.
    pub fn fill(&mut self, x: f64) {
        if x < self.low || x > self.high {
            return;
        }
        let index = self.find_bin(x);
        self.contents[index] += 1.0;
    }

    /// Adds a Gaussian of the given integral, truncated beyond
    /// `sigma_n` standard deviations; each covered bin receives the density
    /// value at its center.
    pub fn add_gaussian(&mut self, integral: f64, center: f64, sigma: f64, sigma_n: f64) {
        self.accumulate(integral, center, sigma, sigma_n);
    }

    /// Removes a previously added (or fitted) Gaussian.
    pub fn subtract_gaussian(&mut self, integral: f64, center: f64, sigma: f64, sigma_n: f64) {
        self.accumulate(-integral, center, sigma, sigma_n);
    }

    fn accumulate(&mut self, signed_integral: f64, center: f64, sigma: f64, sigma_n: f64) {
        let reach = sigma_n * sigma;
        if center + reach < self.low || center - reach > self.high {
            return;
        }
        let start = self.find_bin(center - reach);
        let end = self.find_bin(center + reach);
        for index in start..=end {
            let x = self.bin_center(index);
            self.contents[index] += signed_integral * gaussian_density(x, center, sigma);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_density_peak_value() {
        // Peak of the normalized Gaussian is 1/(sigma * sqrt(2*pi)).
        assert_relative_eq!(gaussian_density(0.0, 0.0, 2.0), 0.199_471_140_2, epsilon = 1e-9);
        // Symmetric around the center.
        assert_relative_eq!(
            gaussian_density(1.5, 0.0, 2.0),
            gaussian_density(-1.5, 0.0, 2.0)
        );
    }

    #[test]
    fn test_bin_lookup_clips_to_edges() {
        let hist = Hist1d::new(10, -260.0, -250.0);
        assert_eq!(hist.find_bin(-300.0), 0);
        assert_eq!(hist.find_bin(-260.0), 0);
        assert_eq!(hist.find_bin(-255.5), 4);
        assert_eq!(hist.find_bin(-250.0), 9);
        assert_eq!(hist.find_bin(0.0), 9);
    }

    #[test]
    fn test_degenerate_range_is_queryable() {
        let hist = Hist1d::new(2, -255.0, -255.0);
        assert_eq!(hist.find_bin(-255.0), 0);
        assert_eq!(hist.find_bin(-254.0), 1);
        assert_eq!(hist.find_bin(-256.0), 0);
        assert_eq!(hist.bin_center(0), -255.0);
    }

    #[test]
    fn test_fill_concentrates_at_kernel_center() {
        let mut hist = Hist1d::new(20, -10.0, 10.0);
        hist.add_gaussian(1.0, 0.5, 2.0, 3.0);
        let (peak_bin, peak) = hist.maximum_bin();
        assert_eq!(hist.bin_center(peak_bin), 0.5);
        assert_relative_eq!(peak, gaussian_density(0.5, 0.5, 2.0));
        // Unit integral, bin width 1: contents sum to roughly one.
        assert_relative_eq!(hist.total(), 1.0, epsilon = 0.02);
    }

    #[test]
    fn test_fill_counts_per_bin_and_drops_out_of_range() {
        let mut hist = Hist1d::new(10, 0.0, 10.0);
        hist.fill(2.5);
        hist.fill(2.7);
        hist.fill(9.99);
        hist.fill(-1.0);
        hist.fill(11.0);
        assert_eq!(hist.content(2), 2.0);
        assert_eq!(hist.content(9), 1.0);
        assert_relative_eq!(hist.total(), 3.0);
    }

    #[test]
    fn test_truncation_leaves_far_bins_empty() {
        let mut hist = Hist1d::new(40, -20.0, 20.0);
        hist.add_gaussian(1.0, 0.0, 1.0, 3.0);
        // 3-sigma truncation: bins beyond |x| > 3 stay exactly zero.
        assert_eq!(hist.content(hist.find_bin(-5.0)), 0.0);
        assert_eq!(hist.content(hist.find_bin(5.0)), 0.0);
        assert!(hist.content(hist.find_bin(0.0)) > 0.0);
    }

    #[test]
    fn test_kernel_fully_outside_range_is_dropped() {
        let mut hist = Hist1d::new(10, 0.0, 10.0);
        hist.add_gaussian(1.0, 100.0, 2.0, 3.0);
        assert_eq!(hist.total(), 0.0);
    }

    #[test]
    fn test_subtraction_cancels_addition() {
        let mut hist = Hist1d::new(30, -15.0, 15.0);
        hist.add_gaussian(4.0, -2.0, 2.5, 5.0);
        hist.subtract_gaussian(4.0, -2.0, 2.5, 5.0);
        for index in 0..hist.n_bins() {
            assert_relative_eq!(hist.content(index), 0.0);
        }
    }

    #[test]
    fn test_maximum_bin_prefers_lowest_index_on_ties() {
        let mut hist = Hist1d::new(4, 0.0, 4.0);
        // Symmetric kernel centered between bins 1 and 2 gives a tie.
        hist.add_gaussian(1.0, 2.0, 1.0, 3.0);
        let (bin, _) = hist.maximum_bin();
        assert_eq!(bin, 1);
    }
}
