//! Migration barrier prediction
//!
//! The simulation only depends on the [`BarrierPredictor`] trait. Two
//! implementations ship with the crate:
//! - [`MlpPredictor`]: dense network with batch normalization, weights from JSON
//! - [`ConstantPredictor`]: the same barrier for every direction, useful for
//!   random-walk baselines and tests

pub mod mlp;
#[allow(clippy::module_name_repetitions)]
mod r#trait;

pub use mlp::{DenseLayer, HiddenLayer, MlpPredictor, ModelError, ModelWeights};
pub use r#trait::BarrierPredictor;

use crate::encoding::FeatureMaps;
use crate::error::KmcError;

/// Predicts one fixed barrier for every direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantPredictor {
    pub barrier: f64,
}

impl ConstantPredictor {
    pub fn new(barrier: f64) -> Self {
        Self { barrier }
    }
}

impl BarrierPredictor for ConstantPredictor {
    fn predict(&self, features: &FeatureMaps) -> Result<Vec<f64>, KmcError> {
        Ok(vec![self.barrier; features.len()])
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}
