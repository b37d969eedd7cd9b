pub mod advantages;
pub mod env;
pub mod error;
pub mod policies;
pub mod rng;
pub mod rollout_buffer;
pub mod tensor;

pub use error::{Error, Result};
