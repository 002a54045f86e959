//! Numerical helpers: normal distribution, label standardization and
//! stable log expected improvement.
mod logei_helper;
mod misc;

pub(crate) use logei_helper::*;
pub use misc::*;
