//! Acquisition optimizers returning a batch of candidate points.
//!
//! * [optimize_acqf_gradient]: multistart SLSQP over the joint batch coordinates
//!   of a single acquisition function,
//! * [optimize_acqf_evolutionary]: population search treating each acquisition
//!   function as an objective, the batch is taken from the final population.
mod batch;
mod evolutionary;
mod gradient;

pub use batch::{assemble_batch, set_difference, SET_DIFFERENCE_TOL};
pub use evolutionary::*;
pub use gradient::*;
