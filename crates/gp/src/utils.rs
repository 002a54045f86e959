use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use ndarray_stats::QuantileExt;

/// Affine map of the input box onto the unit hypercube.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct InputScaler {
    lower: Array1<f64>,
    span: Array1<f64>,
}

impl InputScaler {
    /// Scaler from a `(nx, 2)` array of `[lower, upper]` bounds
    pub fn from_bounds(bounds: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Self {
        let lower = bounds.column(0).to_owned();
        let span = (&bounds.column(1) - &lower).mapv(non_degenerate);
        InputScaler { lower, span }
    }

    /// Scaler from the componentwise min/max of the `(n, nx)` data
    pub fn from_data(x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Self {
        let lower = Array1::from_iter(x.columns().into_iter().map(|c| *c.min_skipnan()));
        let upper = Array1::from_iter(x.columns().into_iter().map(|c| *c.max_skipnan()));
        let span = (&upper - &lower).mapv(non_degenerate);
        InputScaler { lower, span }
    }

    #[cfg(test)]
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn transform(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
        (x - &self.lower) / &self.span
    }
}

fn non_degenerate(v: f64) -> f64 {
    if v > f64::EPSILON {
        v
    } else {
        1.
    }
}
