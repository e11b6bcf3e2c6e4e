//! Dense feed-forward barrier model
//!
//! Each hidden layer computes `relu(batchnorm(x * W + b))` with
//! `batchnorm(z) = gamma * (z - mean) / sqrt(variance + 0.001) + beta`.
//! The output layer is linear with a single unit. The eight feature maps are
//! evaluated as one 8-row batch.
//!
//! Weights are stored as JSON; `weights` matrices are `[inputs][outputs]`.
//!
//! Inputs follow the lattice's `[i][j][k] = (x, y, z)` order, flattened with
//! `z` fastest. Models trained on cubes laid out `[y][x][z]` (the default
//! `meshgrid` ordering) must have the rows of their first weight matrix
//! permuted by swapping the `x` and `y` window axes before loading.
//!
//! ```json
//! {
//!   "hidden": [
//!     { "weights": [[...]], "bias": [...],
//!       "gamma": [...], "beta": [...], "mean": [...], "variance": [...] }
//!   ],
//!   "output": { "weights": [[...]], "bias": [...] }
//! }
//! ```

use super::BarrierPredictor;
use crate::encoding::FeatureMaps;
use crate::error::KmcError;
use nalgebra::{DMatrix, RowDVector};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Added to the running variance before the square root
pub const BATCH_NORM_EPSILON: f64 = 0.001;

/// Affine layer in storage form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

/// Affine layer followed by batch normalization and ReLU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HiddenLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub gamma: Vec<f64>,
    pub beta: Vec<f64>,
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
}

/// Serialized network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelWeights {
    #[serde(default)]
    pub hidden: Vec<HiddenLayer>,
    pub output: DenseLayer,
}

/// Model loading errors
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Failed to read the weights file
    LoadFailed(String),
    /// Failed to parse the weights file
    ParseFailed(String),
    /// Layer dimensions do not chain
    Shape(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::LoadFailed(msg) => write!(f, "Failed to load model: {msg}"),
            ModelError::ParseFailed(msg) => write!(f, "Failed to parse model: {msg}"),
            ModelError::Shape(msg) => write!(f, "Inconsistent model shape: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}

/// Layer in evaluation form
#[derive(Debug, Clone)]
struct Layer {
    weights: DMatrix<f64>,
    bias: RowDVector<f64>,
    /// Per-unit `(scale, shift)` folding batch normalization into one affine map
    norm: Option<(RowDVector<f64>, RowDVector<f64>)>,
}

impl Layer {
    fn forward(&self, input: &DMatrix<f64>) -> DMatrix<f64> {
        let mut z = input * &self.weights;
        for mut row in z.row_iter_mut() {
            row += &self.bias;
            if let Some((scale, shift)) = &self.norm {
                row.component_mul_assign(scale);
                row += shift;
                row.apply(|v| *v = v.max(0.0));
            }
        }
        z
    }
}

fn to_matrix(name: &str, rows: &[Vec<f64>]) -> Result<DMatrix<f64>, ModelError> {
    let n_in = rows.len();
    let n_out = rows.first().map_or(0, Vec::len);
    if n_in == 0 || n_out == 0 {
        return Err(ModelError::Shape(format!("{name}: empty weight matrix")));
    }
    if let Some(bad) = rows.iter().position(|r| r.len() != n_out) {
        return Err(ModelError::Shape(format!(
            "{name}: row {bad} has {} columns, expected {n_out}",
            rows[bad].len()
        )));
    }
    Ok(DMatrix::from_fn(n_in, n_out, |r, c| rows[r][c]))
}

fn to_row(name: &str, field: &str, values: &[f64], len: usize) -> Result<RowDVector<f64>, ModelError> {
    if values.len() != len {
        return Err(ModelError::Shape(format!(
            "{name}: {field} has {} entries, expected {len}",
            values.len()
        )));
    }
    Ok(RowDVector::from_row_slice(values))
}

/// Multilayer perceptron barrier predictor
#[derive(Debug, Clone)]
pub struct MlpPredictor {
    layers: Vec<Layer>,
    input_len: usize,
}

impl MlpPredictor {
    /// Build the evaluation form of a network
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Shape`] if any matrix is ragged, a vector length
    /// does not match its layer, consecutive layers do not chain, or the
    /// output layer does not have exactly one unit.
    pub fn new(weights: &ModelWeights) -> Result<Self, ModelError> {
        let mut layers = Vec::with_capacity(weights.hidden.len() + 1);

        for (n, hidden) in weights.hidden.iter().enumerate() {
            let name = format!("hidden layer {n}");
            let w = to_matrix(&name, &hidden.weights)?;
            let units = w.ncols();
            let bias = to_row(&name, "bias", &hidden.bias, units)?;
            let gamma = to_row(&name, "gamma", &hidden.gamma, units)?;
            let beta = to_row(&name, "beta", &hidden.beta, units)?;
            let mean = to_row(&name, "mean", &hidden.mean, units)?;
            let variance = to_row(&name, "variance", &hidden.variance, units)?;

            let scale = gamma.zip_map(&variance, |g, v| g / (v + BATCH_NORM_EPSILON).sqrt());
            let shift = beta - mean.component_mul(&scale);
            layers.push(Layer {
                weights: w,
                bias,
                norm: Some((scale, shift)),
            });
        }

        let w = to_matrix("output layer", &weights.output.weights)?;
        if w.ncols() != 1 {
            return Err(ModelError::Shape(format!(
                "output layer has {} units, expected 1",
                w.ncols()
            )));
        }
        let bias = to_row("output layer", "bias", &weights.output.bias, 1)?;
        layers.push(Layer {
            weights: w,
            bias,
            norm: None,
        });

        for pair in layers.windows(2) {
            if pair[0].weights.ncols() != pair[1].weights.nrows() {
                return Err(ModelError::Shape(format!(
                    "layer with {} outputs feeds layer with {} inputs",
                    pair[0].weights.ncols(),
                    pair[1].weights.nrows()
                )));
            }
        }

        let input_len = layers[0].weights.nrows();
        Ok(Self { layers, input_len })
    }

    /// Parse JSON weights
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ParseFailed`] or any shape error from [`MlpPredictor::new`].
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let weights: ModelWeights =
            serde_json::from_str(json).map_err(|e| ModelError::ParseFailed(e.to_string()))?;
        Self::new(&weights)
    }

    /// Load JSON weights from a file
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::LoadFailed`] if the file cannot be read, otherwise
    /// as [`MlpPredictor::from_json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| ModelError::LoadFailed(format!("{}: {e}", path.display())))?;
        let model = Self::from_json(&json)?;
        info!(
            "Loaded barrier model from {}: {} layers, {} inputs",
            path.display(),
            model.layers.len(),
            model.input_len
        );
        Ok(model)
    }

    /// Length of one flattened feature map the model expects
    #[inline]
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// Evaluate a batch, one sample per row, one output per row
    pub fn forward(&self, input: &DMatrix<f64>) -> Vec<f64> {
        let mut x = input.clone();
        for layer in &self.layers {
            x = layer.forward(&x);
        }
        x.column(0).iter().copied().collect()
    }
}

impl BarrierPredictor for MlpPredictor {
    fn predict(&self, features: &FeatureMaps) -> Result<Vec<f64>, KmcError> {
        if features.feature_len() != self.input_len {
            return Err(KmcError::PredictorContract(format!(
                "model expects {} features per map, got {}",
                self.input_len,
                features.feature_len()
            )));
        }
        Ok(self.forward(&features.to_matrix()))
    }

    fn name(&self) -> &'static str {
        "mlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_input_model() -> ModelWeights {
        ModelWeights {
            hidden: vec![HiddenLayer {
                weights: vec![vec![1.0, -1.0], vec![2.0, 0.5]],
                bias: vec![0.5, 0.0],
                gamma: vec![2.0, 1.0],
                beta: vec![0.1, -0.2],
                mean: vec![1.0, 0.0],
                variance: vec![3.999, 0.999],
            }],
            output: DenseLayer {
                weights: vec![vec![1.0], vec![-3.0]],
                bias: vec![0.25],
            },
        }
    }

    #[test]
    fn test_forward_matches_hand_computation() {
        let model = MlpPredictor::new(&two_input_model()).unwrap();
        let input = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, -1.0, 0.0]);
        let out = model.forward(&input);

        // Row 0: z = [3.5, -0.5]
        //   bn = [2 * 2.5 / 2 + 0.1, -0.5 / 1 - 0.2] = [2.6, -0.7] -> relu [2.6, 0]
        //   out = 2.6 + 0.25
        assert_relative_eq!(out[0], 2.85, epsilon = 1e-12);
        // Row 1: z = [-0.5, 1.0]
        //   bn = [2 * -1.5 / 2 + 0.1, 1.0 - 0.2] = [-1.4, 0.8] -> relu [0, 0.8]
        //   out = -2.4 + 0.25
        assert_relative_eq!(out[1], -2.15, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_only_model() {
        let weights = ModelWeights {
            hidden: Vec::new(),
            output: DenseLayer {
                weights: vec![vec![0.5], vec![0.5], vec![0.0]],
                bias: vec![0.1],
            },
        };
        let model = MlpPredictor::new(&weights).unwrap();
        assert_eq!(model.input_len(), 3);
        let out = model.forward(&DMatrix::from_row_slice(1, 3, &[2.0, 4.0, 9.0]));
        assert_relative_eq!(out[0], 3.1, epsilon = 1e-12);
    }

    #[test]
    fn test_shape_errors() {
        let mut ragged = two_input_model();
        ragged.hidden[0].weights[1].push(1.0);
        assert!(matches!(MlpPredictor::new(&ragged), Err(ModelError::Shape(_))));

        let mut short_gamma = two_input_model();
        short_gamma.hidden[0].gamma.pop();
        assert!(matches!(MlpPredictor::new(&short_gamma), Err(ModelError::Shape(_))));

        let mut unchained = two_input_model();
        unchained.output.weights.push(vec![1.0]);
        assert!(matches!(MlpPredictor::new(&unchained), Err(ModelError::Shape(_))));

        let mut wide_output = two_input_model();
        wide_output.output.weights = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        wide_output.output.bias = vec![0.0, 0.0];
        assert!(matches!(MlpPredictor::new(&wide_output), Err(ModelError::Shape(_))));
    }

    #[test]
    fn test_json_round_trip_and_unknown_fields() {
        let json = serde_json::to_string(&two_input_model()).unwrap();
        let model = MlpPredictor::from_json(&json).unwrap();
        assert_eq!(model.input_len(), 2);

        let bad = r#"{"output": {"weights": [[1.0]], "bias": [0.0], "extra": 1}}"#;
        assert!(matches!(
            MlpPredictor::from_json(bad),
            Err(ModelError::ParseFailed(_))
        ));
    }
}
