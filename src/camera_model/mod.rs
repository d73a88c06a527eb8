pub mod opencv8;

pub use opencv8::{OpenCVModel8, rotate_point, transform_point};
