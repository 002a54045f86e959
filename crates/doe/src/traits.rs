use linfa::Float;
use ndarray::{Array2, ArrayView1};

/// A sampler able to draw `ns` points in the box `[lb_i, ub_i]^nx`.
///
/// Implementors only have to draw points in the unit hypercube, scaling to
/// the actual bounds is shared.
pub trait SamplingMethod<F: Float> {
    /// The `(nx, 2)` box the samples are drawn in.
    fn sampling_space(&self) -> &Array2<F>;

    /// Draws a `(ns, nx)` array of points in `[0, 1]^nx`.
    fn normalized_sample(&self, ns: usize) -> Array2<F>;

    /// Draws a `(ns, nx)` array of points scaled into [`SamplingMethod::sampling_space`].
    fn sample(&self, ns: usize) -> Array2<F> {
        let (lower, upper) = bounds(self.sampling_space());
        let span = &upper - &lower;
        self.normalized_sample(ns) * &span + &lower
    }
}

fn bounds<F: Float>(xlimits: &Array2<F>) -> (ArrayView1<F>, ArrayView1<F>) {
    (xlimits.column(0), xlimits.column(1))
}
