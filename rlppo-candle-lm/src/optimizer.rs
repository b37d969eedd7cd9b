use crate::actor_critic::StatelessActorCritic;
use anyhow::Result;
use candle_core::{Tensor, Var, backprop::GradStore};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use rlppo_core::policies::{GroupedOptimizer, ParamGroup};
use std::fmt::Debug;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupParams {
    pub lr: f64,
    pub eps: f64,
}

/// Adam over one parameter group.
pub struct GroupOptimizer {
    optimizer: AdamW,
    vars: Vec<Var>,
}

impl GroupOptimizer {
    pub fn new(varmap: &VarMap, params: GroupParams) -> Result<Self> {
        let vars = varmap.all_vars();
        let adam = ParamsAdamW {
            lr: params.lr,
            eps: params.eps,
            weight_decay: 0.,
            ..Default::default()
        };
        let optimizer = AdamW::new(vars.clone(), adam)?;
        Ok(Self { optimizer, vars })
    }

    /// Joint L2 norm of the gradients this group has in `grads`.
    pub fn grad_norm(&self, grads: &GradStore) -> Result<f32> {
        let mut total_norm_squared = 0.0f32;
        for var in self.vars.iter() {
            if let Some(grad) = grads.get(var.as_tensor()) {
                total_norm_squared += grad.sqr()?.sum_all()?.to_scalar::<f32>()?;
            }
        }
        Ok(total_norm_squared.sqrt())
    }

    /// Scales the group's gradients by `max_norm / (norm + 1e-6)` when their
    /// norm exceeds `max_norm`. Returns the norm before clipping.
    pub fn clip_grad_norm(&self, grads: &mut GradStore, max_norm: f32) -> Result<f32> {
        let total_norm = self.grad_norm(grads)?;
        if total_norm > max_norm {
            let clip_coef = (max_norm / (total_norm + 1e-6)) as f64;
            for var in self.vars.iter() {
                let clipped = match grads.get(var.as_tensor()) {
                    Some(grad) => grad.affine(clip_coef, 0.)?,
                    None => continue,
                };
                grads.insert(var.as_tensor(), clipped);
            }
        }
        Ok(total_norm)
    }
}

impl Debug for GroupOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupOptimizer")
            .field("optimizer", &self.optimizer)
            .field("num_vars", &self.vars.len())
            .finish()
    }
}

/// Two Adam instances, one per parameter group, stepped from a single
/// backward pass.
#[derive(Debug)]
pub struct ActorCriticOptimizer {
    actor: GroupOptimizer,
    critic: GroupOptimizer,
}

impl ActorCriticOptimizer {
    pub fn new(
        actor_varmap: &VarMap,
        critic_varmap: &VarMap,
        actor: GroupParams,
        critic: GroupParams,
    ) -> Result<Self> {
        Ok(Self {
            actor: GroupOptimizer::new(actor_varmap, actor)?,
            critic: GroupOptimizer::new(critic_varmap, critic)?,
        })
    }

    pub fn for_actor_critic(
        actor_critic: &StatelessActorCritic,
        actor: GroupParams,
        critic: GroupParams,
    ) -> Result<Self> {
        Self::new(
            actor_critic.actor_varmap(),
            actor_critic.critic_varmap(),
            actor,
            critic,
        )
    }

    pub fn group(&self, group: ParamGroup) -> &GroupOptimizer {
        match group {
            ParamGroup::Actor => &self.actor,
            ParamGroup::Critic => &self.critic,
        }
    }

    fn group_mut(&mut self, group: ParamGroup) -> &mut GroupOptimizer {
        match group {
            ParamGroup::Actor => &mut self.actor,
            ParamGroup::Critic => &mut self.critic,
        }
    }
}

impl GroupedOptimizer for ActorCriticOptimizer {
    type Tensor = Tensor;
    type Gradients = GradStore;

    fn backward(&mut self, loss: &Tensor) -> Result<GradStore> {
        Ok(loss.backward()?)
    }

    fn clip_grad_norm(
        &self,
        grads: &mut GradStore,
        group: ParamGroup,
        max_norm: f32,
    ) -> Result<f32> {
        let norm = self.group(group).clip_grad_norm(grads, max_norm)?;
        trace!(group = group.name(), norm, max_norm, "clipped gradients");
        Ok(norm)
    }

    fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.actor.optimizer.step(grads)?;
        self.critic.optimizer.step(grads)?;
        Ok(())
    }

    fn learning_rate(&self, group: ParamGroup) -> f64 {
        self.group(group).optimizer.learning_rate()
    }

    fn set_learning_rate(&mut self, group: ParamGroup, lr: f64) {
        self.group_mut(group).optimizer.set_learning_rate(lr)
    }
}
