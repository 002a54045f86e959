//! This library implements a sequential Bayesian optimization designer.
//!
//! A [BoDesigner] proposes trials of a [ProblemStatement] through [Designer::suggest]
//! and learns from the completed ones fed back with [Designer::update]:
//!
//! * while fewer than `n_init` trials were completed, trials are drawn at random
//!   by a [RandomDesigner],
//! * afterwards each suggestion fits a [Gaussian process](bbo_gp::GaussianProcess) on
//!   the standardized history, builds the configured [acquisition functions](criteria)
//!   and returns the batch of `q` points found by an [acquisition optimizer](optimizers):
//!   multistart gradient ascent, or an NSGA-II population search whose final
//!   population is assembled into a batch.
//!
//! The model-based phase handles double parameters and a single metric only.
//!
//! ```no_run
//! use bbo_designers::*;
//!
//! let mut space = SearchSpace::new();
//! space.add_float_param("x", -5., 10.)?.add_float_param("y", 0., 15.)?;
//! let mut objective = Objective::new();
//! objective.add_metric("branin", ObjectiveMetricGoal::Minimize)?;
//! let problem = ProblemStatement::new(space, objective);
//!
//! let config = BoConfig::default()
//!     .q(2)
//!     .acqf(AcqfSpec::Multi(vec![AcqfType::QEi, AcqfType::QUcb]))
//!     .acqf_optimizer(AcqfOptimizer::Evolutionary)
//!     .seed(42);
//! let mut designer = BoDesigner::new(&problem, config)?;
//! let trials = designer.suggest(None)?;
//! # Ok::<(), BboError>(())
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod bo;
mod converter;
pub mod criteria;
mod designer;
mod errors;
mod experimenter;
mod nsga2;
pub mod optimizers;
mod pareto;
mod problem;
mod random;
mod trial;
mod types;
pub mod utils;

pub use bo::*;
pub use converter::*;
pub use designer::*;
pub use errors::*;
pub use experimenter::*;
pub use nsga2::*;
pub use problem::*;
pub use random::*;
pub use trial::*;
pub use types::*;
