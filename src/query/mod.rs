pub mod selector;

pub use selector::{hash_positions, select_candidates};
