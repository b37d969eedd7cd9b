use crate::error::{Error, Result};

/// Shape of an observation or action space as reported by the environment.
#[derive(Debug, Clone, PartialEq)]
pub enum Space {
    Discrete(usize),
    Continuous {
        low: Option<Vec<f32>>,
        high: Option<Vec<f32>>,
        shape: Vec<usize>,
    },
    MultiDiscrete(Vec<usize>),
    MultiBinary(usize),
}

impl Space {
    pub fn continuous_from_dims(shape: Vec<usize>) -> Self {
        Self::Continuous {
            low: None,
            high: None,
            shape,
        }
    }

    /// Number of scalars needed to represent one element of the space.
    pub fn size(&self) -> usize {
        match self {
            Self::Discrete(_) => 1,
            Self::Continuous { shape, .. } => shape.iter().product(),
            Self::MultiDiscrete(nvec) => nvec.len(),
            Self::MultiBinary(n) => *n,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Self::Continuous { shape, .. } => shape.clone(),
            _ => vec![self.size()],
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Discrete(_) => "Discrete",
            Self::Continuous { .. } => "Box",
            Self::MultiDiscrete(_) => "MultiDiscrete",
            Self::MultiBinary(_) => "MultiBinary",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentDescription {
    pub observation_space: Space,
    pub action_space: Space,
}

impl EnvironmentDescription {
    pub fn new(observation_space: Space, action_space: Space) -> Self {
        Self {
            observation_space,
            action_space,
        }
    }

    pub fn observation_size(&self) -> usize {
        self.observation_space.size()
    }

    pub fn action_size(&self) -> usize {
        self.action_space.size()
    }
}

/// How actions are stored by the rollout buffer. Resolved once from the action
/// space and fixed for the lifetime of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// One integer action per step and environment.
    Discrete,
    /// A real vector of `dim` entries per step and environment.
    Continuous { dim: usize },
}

impl ActionKind {
    /// Number of stored scalars per step and environment.
    pub fn width(&self) -> usize {
        match self {
            Self::Discrete => 1,
            Self::Continuous { dim } => *dim,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Discrete => "discrete",
            Self::Continuous { .. } => "continuous",
        }
    }
}

impl TryFrom<&Space> for ActionKind {
    type Error = Error;

    fn try_from(space: &Space) -> Result<Self> {
        match space {
            Space::Discrete(_) => Ok(Self::Discrete),
            Space::Continuous { shape, .. } => Ok(Self::Continuous {
                dim: shape.first().copied().unwrap_or(1),
            }),
            other => Err(Error::Unimplemented(format!(
                "{} action spaces are not supported",
                other.name()
            ))),
        }
    }
}
