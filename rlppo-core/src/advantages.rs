use derive_more::{Deref, DerefMut};

const NORMALIZATION_EPS: f32 = 1e-5;

/// Per-transition advantages, flattened time-major (`t * N + env`).
#[derive(Debug, Clone, PartialEq, Deref, DerefMut)]
pub struct Advantages(pub Vec<f32>);

impl Advantages {
    pub fn mean(&self) -> f32 {
        if self.0.is_empty() {
            return 0.;
        }
        self.0.iter().sum::<f32>() / self.0.len() as f32
    }

    /// Sample standard deviation. Zero when there are fewer than two entries.
    pub fn std(&self) -> f32 {
        let n = self.0.len();
        if n < 2 {
            return 0.;
        }
        let mean = self.mean();
        let var = self.0.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / (n - 1) as f32;
        var.sqrt()
    }

    pub fn normalize(&mut self) {
        let mean = self.mean();
        let std = self.std();
        for a in self.0.iter_mut() {
            *a = (*a - mean) / (std + NORMALIZATION_EPS);
        }
    }
}
