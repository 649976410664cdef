pub mod catalog;
pub mod deployments;
pub mod sequence;
pub mod versions;
