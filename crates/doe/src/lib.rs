/*!
Space-filling samplers used by the designers of the `bbo` workspace.

A sampler draws a set of points within a box `xlimits`, given as a `(nx, 2)` array
where row `i` holds `[lower_bound, upper_bound]` of the i-th component.

Two methods are provided:
* [Random sampling](crate::random::Random), used to draw bootstrap points and raw
  restart candidates,
* [Latin Hypercube sampling](crate::lhs::Lhs), used to seed populations and multistart
  hyperparameter searches.

```
use bbo_doe::{Lhs, LhsKind, Random, SamplingMethod};
use ndarray::arr2;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

let xlimits = arr2(&[[-5., 10.], [0., 15.]]);
let lhs = Lhs::new(&xlimits)
    .kind(LhsKind::Centered)
    .with_rng(Xoshiro256Plus::seed_from_u64(0))
    .sample(8);
let rnd = Random::new(&xlimits)
    .with_rng(Xoshiro256Plus::seed_from_u64(0))
    .sample(8);
assert_eq!(lhs.dim(), rnd.dim());
```
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod lhs;
mod random;
mod traits;
mod utils;

pub use lhs::*;
pub use random::*;
pub use traits::*;
pub use utils::min_pairwise_distance;
