pub mod factors;
pub mod homography;
pub mod linear;
pub mod solver;

pub use homography::*;
pub use linear::*;
pub use solver::*;
