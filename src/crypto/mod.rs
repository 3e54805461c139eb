/// Hashing and secret-handling primitives for batch anchoring.
pub mod hash;
pub mod keys;
pub mod sensitive;
