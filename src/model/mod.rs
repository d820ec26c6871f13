//! Model module for classic CNN architectures using the Burn framework
//!
//! This module provides:
//! - VGG16/VGG19 and Xception as composable `Config` + `Module` builders
//! - Static shape inference and layer summaries (no weights allocated)
//! - A serializable top-level [`ModelConfig`] that dispatches to either builder
//!
//! ## Layout
//!
//! Inputs are described as `(height, width, channels)` and tensors flow in
//! Burn's `[batch, channels, height, width]` layout.

pub mod config;
pub mod layers;
pub mod shape;
pub mod summary;
pub mod vgg;
pub mod xception;

use std::str::FromStr;

use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};

use crate::utils::ZooError;

// Re-export main types for convenience
pub use config::ModelConfig;
pub use shape::{FeatureShape, OutputShape};
pub use summary::{LayerKind, LayerSummary, ModelSummary};
pub use vgg::{Vgg, VggConfig, VggDepth};
pub use xception::{Xception, XceptionConfig};

/// Default number of classes (ImageNet)
pub const DEFAULT_NUM_CLASSES: usize = 1000;

/// Default VGG input as `(height, width, channels)`
pub const VGG_INPUT_SHAPE: [usize; 3] = [224, 224, 3];

/// Default Xception input as `(height, width, channels)`
pub const XCEPTION_INPUT_SHAPE: [usize; 3] = [229, 229, 3];

/// Supported architecture families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    Vgg,
    Xception,
}

impl Architecture {
    /// Input shape used when none is configured
    pub fn default_input_shape(&self) -> [usize; 3] {
        match self {
            Architecture::Vgg => VGG_INPUT_SHAPE,
            Architecture::Xception => XCEPTION_INPUT_SHAPE,
        }
    }
}

impl FromStr for Architecture {
    type Err = ZooError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vgg" => Ok(Architecture::Vgg),
            "xception" => Ok(Architecture::Xception),
            other => Err(ZooError::InvalidConfig(format!(
                "unknown architecture '{}' (expected vgg or xception)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Architecture::Vgg => write!(f, "vgg"),
            Architecture::Xception => write!(f, "xception"),
        }
    }
}

/// Any model built from a [`ModelConfig`]
#[derive(Module, Debug)]
pub enum ZooModel<B: Backend> {
    Vgg(Vgg<B>),
    Xception(Xception<B>),
}

impl<B: Backend> ZooModel<B> {
    /// Class logits of shape `[batch, num_classes]`
    pub fn forward_logits(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            ZooModel::Vgg(model) => model.forward_logits(input),
            ZooModel::Xception(model) => model.forward_logits(input),
        }
    }

    /// Class probabilities of shape `[batch, num_classes]`
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            ZooModel::Vgg(model) => model.forward(input),
            ZooModel::Xception(model) => model.forward(input),
        }
    }

    pub fn num_classes(&self) -> usize {
        match self {
            ZooModel::Vgg(model) => model.num_classes(),
            ZooModel::Xception(model) => model.num_classes(),
        }
    }

    pub fn architecture(&self) -> Architecture {
        match self {
            ZooModel::Vgg(_) => Architecture::Vgg,
            ZooModel::Xception(_) => Architecture::Xception,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_parse() {
        assert_eq!("vgg".parse::<Architecture>().unwrap(), Architecture::Vgg);
        assert_eq!(
            "Xception".parse::<Architecture>().unwrap(),
            Architecture::Xception
        );
        assert!("resnet".parse::<Architecture>().is_err());
    }

    #[test]
    fn test_architecture_display_round_trip() {
        for arch in [Architecture::Vgg, Architecture::Xception] {
            assert_eq!(arch.to_string().parse::<Architecture>().unwrap(), arch);
        }
    }

    #[test]
    fn test_architecture_serde() {
        let json = serde_json::to_string(&Architecture::Xception).unwrap();
        assert_eq!(json, "\"xception\"");
    }
}
