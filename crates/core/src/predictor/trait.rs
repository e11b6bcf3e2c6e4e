//! Barrier predictor trait

use crate::encoding::FeatureMaps;
use crate::error::KmcError;

/// Maps the eight aligned feature maps to eight migration barriers (eV)
///
/// Output index `d` must correspond to feature map `d`, which in turn
/// corresponds to diffusion direction `d`. Implementations are opaque to the
/// engine; the simulation rejects any response that is not exactly eight
/// values long.
pub trait BarrierPredictor: Send + Sync {
    /// Predict one barrier per feature map
    ///
    /// # Errors
    ///
    /// Returns [`KmcError::PredictorContract`] if the input cannot be
    /// evaluated (for example a feature length the model was not built for).
    fn predict(&self, features: &FeatureMaps) -> Result<Vec<f64>, KmcError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

impl<P: BarrierPredictor + ?Sized> BarrierPredictor for Box<P> {
    fn predict(&self, features: &FeatureMaps) -> Result<Vec<f64>, KmcError> {
        (**self).predict(features)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
