use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the rollout buffer and its minibatch generators.
///
/// Every variant is detected eagerly, either when a buffer or a generator is
/// constructed or before an `insert` writes anything, and none of them is
/// retried.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(
        "PPO requires the number of processes ({num_envs}) * number of steps \
         ({rollout_steps}) = {batch_size} to be greater than or equal to the number of \
         PPO minibatches ({num_minibatches})"
    )]
    TooFewTransitions {
        num_envs: usize,
        rollout_steps: usize,
        batch_size: usize,
        num_minibatches: usize,
    },

    #[error(
        "PPO requires the number of processes ({num_envs}) to be greater than or equal to the \
         number of PPO minibatches ({num_minibatches})"
    )]
    TooFewEnvs {
        num_envs: usize,
        num_minibatches: usize,
    },

    #[error(
        "number of processes ({num_envs}) is not divisible by the number of PPO \
         minibatches ({num_minibatches})"
    )]
    UnevenEnvSplit {
        num_envs: usize,
        num_minibatches: usize,
    },

    #[error("shape mismatch for {field}: expected {expected} values, got {got}")]
    ShapeMismatch {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("action batch does not match the buffer's action kind ({expected})")]
    ActionKindMismatch { expected: &'static str },

    #[error("not implemented: {0}")]
    Unimplemented(String),
}

impl Error {
    pub(crate) fn check_len(field: &'static str, expected: usize, got: usize) -> Result<()> {
        if expected == got {
            Ok(())
        } else {
            Err(Self::ShapeMismatch {
                field,
                expected,
                got,
            })
        }
    }
}
