//! Linear interpolation on a measured Q grid with a validity mask.
//!
//! Sampled convolution strategies need the reflectivity between grid
//! points. Values are interpolated linearly between the enclosing knots and
//! held constant beyond the grid ends. A sample is only available when the
//! knots it reads from are valid.

/// Masked piecewise-linear interpolant over a non-decreasing grid.
#[derive(Debug, Clone, Copy)]
pub struct MaskedLinear<'a> {
    xs: &'a [f64],
    ys: &'a [f64],
    valid: &'a [bool],
}

impl<'a> MaskedLinear<'a> {
    /// # Arguments
    /// * `xs` - Non-decreasing knot positions.
    /// * `ys` - Values at the knots (same length as `xs`).
    /// * `valid` - Whether each knot may be read (same length as `xs`).
    ///
    /// Lengths are the caller's responsibility; the convolver checks them
    /// before constructing an interpolant.
    pub fn new(xs: &'a [f64], ys: &'a [f64], valid: &'a [bool]) -> Self {
        debug_assert!(xs.len() == ys.len() && xs.len() == valid.len());
        Self { xs, ys, valid }
    }

    fn knot(&self, i: usize) -> Option<f64> {
        self.valid[i].then_some(self.ys[i])
    }

    /// Value at `x`, or `None` if it depends on an invalid knot or the grid
    /// is empty.
    pub fn evaluate(&self, x: f64) -> Option<f64> {
        let n = self.xs.len();
        if n == 0 {
            return None;
        }
        // first knot strictly above x
        let hi = self.xs.partition_point(|&k| k <= x);
        if hi == 0 {
            return self.knot(0);
        }
        if hi == n {
            return self.knot(n - 1);
        }
        let lo = hi - 1;
        let t = (x - self.xs[lo]) / (self.xs[hi] - self.xs[lo]);
        if t == 0.0 {
            return self.knot(lo);
        }
        let a = self.knot(lo)?;
        let b = self.knot(hi)?;
        Some(a + t * (b - a))
    }
}
