use anyhow::Result;
use rlppo_core::{
    Error,
    env::{ActionKind, Space},
    rng,
    rollout_buffer::{MinibatchSpec, RolloutBuffer},
    tensor::{ActionBatch, TensorBuffer},
};
use std::collections::HashSet;

// Observation of env `e` in slot `t` starts with `offset + 10 * e + t` and is
// zero elsewhere, its recurrent state is `[offset + 100 * e + t]`.
fn fill(buffer: &mut RolloutBuffer, offset: f32) -> Result<()> {
    let n = buffer.num_envs();
    let steps = buffer.rollout_steps();
    let obs_width: usize = buffer.obs_shape().iter().product();
    for step in 0..steps {
        let slot = (step + 1) as f32;
        let mut obs = vec![0.; n * obs_width];
        for e in 0..n {
            obs[e * obs_width] = offset + 10. * e as f32 + slot;
        }
        let states: Vec<f32> = (0..n).map(|e| offset + 100. * e as f32 + slot).collect();
        let actions = match buffer.action_kind() {
            ActionKind::Discrete => ActionBatch::Discrete((0..n as i64).collect()),
            ActionKind::Continuous { dim } => {
                let data = vec![step as f32; n * dim];
                ActionBatch::Continuous(TensorBuffer::new(data, vec![n, dim]))
            }
        };
        let log_probs: Vec<f32> = (0..n).map(|e| -(e as f32) - step as f32).collect();
        let values: Vec<f32> = (0..n).map(|e| (step * n + e) as f32).collect();
        buffer.insert(
            &obs,
            &states,
            &actions,
            &log_probs,
            &values,
            &vec![1.; n],
            &vec![1.; n],
            &vec![1.; n],
        )?;
    }
    Ok(())
}

#[test]
fn feed_forward_minibatches_are_disjoint_and_full() -> Result<()> {
    rng::seed(7);
    let (steps, envs) = (5, 3);
    let mut buffer = RolloutBuffer::new(steps, envs, &[1], &Space::Discrete(4), 1)?;
    fill(&mut buffer, 0.)?;
    buffer.compute_returns(&vec![0.; envs], true, 0.99, 0.95, true)?;
    let advantages = buffer.advantages();

    let minibatches: Vec<_> = buffer
        .feed_forward_generator(&advantages, MinibatchSpec::Size(4))?
        .collect();
    assert_eq!(minibatches.len(), steps * envs / 4);
    let mut seen = HashSet::new();
    for minibatch in &minibatches {
        assert_eq!(minibatch.len(), 4);
        assert_eq!(minibatch.observations.shape, vec![4, 1]);
        assert_eq!(minibatch.recurrent_states.shape, vec![4, 1]);
        assert_eq!(minibatch.advantages.shape, vec![4, 1]);
        for (row, &index) in minibatch.indices.iter().enumerate() {
            assert!(seen.insert(index));
            let (t, env) = (index / envs, index % envs);
            let expected_obs = if t == 0 { 0. } else { 10. * env as f32 + t as f32 };
            assert_eq!(minibatch.observations.row(row), &[expected_obs]);
            let expected_state = if t == 0 { 0. } else { 100. * env as f32 + t as f32 };
            assert_eq!(minibatch.recurrent_states.row(row), &[expected_state]);
            assert_eq!(minibatch.value_preds.row(row), &[index as f32]);
            assert_eq!(minibatch.old_action_log_probs.row(row), &[-(env as f32) - t as f32]);
            assert_eq!(minibatch.advantages.row(row), &[advantages[index]]);
            assert_eq!(minibatch.returns.row(row), &[buffer.return_at(t, env)]);
        }
        let ActionBatch::Discrete(actions) = &minibatch.actions else {
            panic!("expected discrete actions");
        };
        for (action, index) in actions.iter().zip(&minibatch.indices) {
            assert_eq!(*action, (index % envs) as i64);
        }
    }
    Ok(())
}

#[test]
fn feed_forward_count_splits_evenly() -> Result<()> {
    let envs = 3;
    let mut buffer = RolloutBuffer::new(4, envs, &[3], &Space::continuous_from_dims(vec![2]), 1)?;
    fill(&mut buffer, 0.)?;
    let advantages = buffer.advantages();
    let generator = buffer.feed_forward_generator(&advantages, MinibatchSpec::Count(3))?;
    assert_eq!(generator.minibatch_size(), 4);
    assert_eq!(generator.size_hint(), (3, Some(3)));
    let minibatches: Vec<_> = generator.collect();
    assert_eq!(minibatches.len(), 3);
    for minibatch in &minibatches {
        assert_eq!(minibatch.observations.shape, vec![4, 3]);
        for (row, &index) in minibatch.indices.iter().enumerate() {
            let (t, env) = (index / envs, index % envs);
            let first = if t == 0 { 0. } else { 10. * env as f32 + t as f32 };
            assert_eq!(minibatch.observations.row(row), &[first, 0., 0.]);
        }
        let ActionBatch::Continuous(actions) = &minibatch.actions else {
            panic!("expected continuous actions");
        };
        assert_eq!(actions.shape, vec![4, 2]);
    }
    Ok(())
}

#[test]
fn feed_forward_rejects_bad_splits() -> Result<()> {
    let buffer = RolloutBuffer::new(2, 3, &[1], &Space::Discrete(2), 1)?;
    let advantages = buffer.advantages();
    assert!(matches!(
        buffer.feed_forward_generator(&advantages, MinibatchSpec::Count(0)),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        buffer.feed_forward_generator(&advantages, MinibatchSpec::Count(7)),
        Err(Error::TooFewTransitions { batch_size: 6, .. })
    ));
    assert!(matches!(
        buffer.feed_forward_generator(&advantages, MinibatchSpec::Size(0)),
        Err(Error::Config(_))
    ));
    let wrong = rlppo_core::advantages::Advantages(vec![0.; 5]);
    assert!(matches!(
        buffer.feed_forward_generator(&wrong, MinibatchSpec::Count(2)),
        Err(Error::ShapeMismatch { field: "advantages", .. })
    ));
    Ok(())
}

#[test]
fn recurrent_minibatches_hold_whole_trajectories() -> Result<()> {
    rng::seed(3);
    let (steps, envs) = (3, 4);
    let mut buffer = RolloutBuffer::new(steps, envs, &[1], &Space::Discrete(4), 1)?;
    fill(&mut buffer, 0.)?;
    buffer.after_update();
    fill(&mut buffer, 1000.)?;
    let advantages = buffer.advantages();

    let minibatches: Vec<_> = buffer.recurrent_generator(&advantages, 2)?.collect();
    assert_eq!(minibatches.len(), 2);
    let mut envs_seen = HashSet::new();
    for minibatch in &minibatches {
        assert_eq!(minibatch.len(), steps * 2);
        assert_eq!(minibatch.observations.shape, vec![steps * 2, 1]);
        assert_eq!(minibatch.recurrent_states.shape, vec![2, 1]);
        let group: Vec<usize> = minibatch.indices[..2].to_vec();
        for (j, &env) in group.iter().enumerate() {
            assert!(envs_seen.insert(env));
            // slot 0 carries the last state of the previous rollout
            assert_eq!(
                minibatch.recurrent_states.row(j),
                &[100. * env as f32 + steps as f32]
            );
        }
        for t in 0..steps {
            for (j, &env) in group.iter().enumerate() {
                let row = t * 2 + j;
                assert_eq!(minibatch.indices[row], t * envs + env);
                let expected = if t == 0 {
                    10. * env as f32 + steps as f32
                } else {
                    1000. + 10. * env as f32 + t as f32
                };
                assert_eq!(minibatch.observations.row(row), &[expected]);
            }
        }
    }
    assert_eq!(envs_seen.len(), envs);
    Ok(())
}

#[test]
fn recurrent_rejects_bad_splits() -> Result<()> {
    let buffer = RolloutBuffer::new(2, 4, &[1], &Space::Discrete(2), 1)?;
    let advantages = buffer.advantages();
    assert!(matches!(
        buffer.recurrent_generator(&advantages, 0),
        Err(Error::Config(_))
    ));
    assert_eq!(
        buffer.recurrent_generator(&advantages, 5).err(),
        Some(Error::TooFewEnvs {
            num_envs: 4,
            num_minibatches: 5
        })
    );
    assert_eq!(
        buffer.recurrent_generator(&advantages, 3).err(),
        Some(Error::UnevenEnvSplit {
            num_envs: 4,
            num_minibatches: 3
        })
    );
    Ok(())
}

#[test]
fn normalized_buffer_advantages() -> Result<()> {
    let mut buffer = RolloutBuffer::new(8, 4, &[1], &Space::Discrete(2), 1)?;
    fill(&mut buffer, 0.)?;
    buffer.compute_returns(&[1., 2., 3., 4.], true, 0.99, 0.95, true)?;
    let mut advantages = buffer.advantages();
    advantages.normalize();
    assert!(advantages.mean().abs() < 1e-4);
    assert!((advantages.std() - 1.).abs() < 1e-3);
    Ok(())
}
