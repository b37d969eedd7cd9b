pub mod ppo;
pub mod tensors;
