pub mod announcement;
pub mod commitment_tree;

pub use announcement::*;
pub use commitment_tree::*;
