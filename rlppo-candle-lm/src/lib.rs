pub mod actor_critic;
pub mod distributions;
pub mod mlp;
pub mod optimizer;
