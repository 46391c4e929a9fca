use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activation::ActivationFunction;
use crate::error::Result;
use crate::layers::{Dense, Dropout, Layer};
use crate::loss::LossType;

/// Describes one layer of a model architecture. Input widths are implied by
/// the position in the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        units: usize,
        #[serde(default)]
        activation: Option<ActivationFunction>,
    },
    Dropout { rate: f64 },
}

impl LayerSpec {
    pub fn build(&self) -> Result<Layer> {
        Ok(match *self {
            LayerSpec::Dense { units, activation } => Dense::new(units, activation).into(),
            LayerSpec::Dropout { rate } => Dropout::new(rate)?.into(),
        })
    }

    pub fn from_layer(layer: &Layer) -> LayerSpec {
        match layer {
            Layer::Dense(dense) => LayerSpec::Dense {
                units: dense.size(),
                activation: dense.activation(),
            },
            Layer::Dropout(dropout) => LayerSpec::Dropout { rate: dropout.rate() },
        }
    }
}

/// A serializable description of a model architecture plus its loss.
///
/// `ModelSpec` can be saved to / loaded from JSON independently of trained
/// weights, so architectures can be stored before training starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Human-readable name used as the model file stem.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub input_dim: usize,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub loss: LossType,
    /// Seeds weight initialization when set.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ModelSpec {
    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `ModelSpec` from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<ModelSpec> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Model;

    const SPEC: &str = r#"{
        "name": "sine",
        "input_dim": 1,
        "layers": [
            { "type": "dense", "units": 10, "activation": { "type": "tanh" } },
            { "type": "dropout", "rate": 0.1 },
            { "type": "dense", "units": 1 }
        ],
        "loss": { "type": "square" },
        "seed": 7
    }"#;

    #[test]
    fn parses_and_builds() {
        let spec: ModelSpec = serde_json::from_str(SPEC).unwrap();
        assert_eq!(spec.layers.len(), 3);
        assert_eq!(spec.layers[2], LayerSpec::Dense { units: 1, activation: None });

        let model = Model::from_spec(&spec).unwrap();
        assert_eq!(model.output_dim(), 1);
        assert_eq!(model.num_params(), 2 * 10 + 11);
        assert_eq!(model.spec("sine").layers, spec.layers);
    }

    #[test]
    fn same_seed_same_weights() {
        let spec: ModelSpec = serde_json::from_str(SPEC).unwrap();
        let a = Model::from_spec(&spec).unwrap();
        let b = Model::from_spec(&spec).unwrap();
        assert_eq!(a.weights_snapshot(), b.weights_snapshot());
    }

    #[test]
    fn bad_dropout_rate_fails_to_build() {
        let spec = LayerSpec::Dropout { rate: 1.5 };
        assert!(spec.build().is_err());
    }
}
