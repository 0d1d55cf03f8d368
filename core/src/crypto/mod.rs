pub mod curve;
pub mod dksap;
pub mod field;
pub mod keys;
pub mod poseidon;

pub use curve::*;
pub use dksap::*;
pub use field::*;
pub use keys::*;
pub use poseidon::*;
