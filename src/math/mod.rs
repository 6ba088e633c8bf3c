//! Small value math used for controller orientation

pub mod quaternion;
pub mod vect3;

pub use quaternion::Quaternion;
pub use vect3::Vect3;
