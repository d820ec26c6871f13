//! Layer-by-layer description of a built architecture
//!
//! A [`ModelSummary`] is produced by shape inference alone, so a full-size
//! VGG or Xception can be inspected without allocating its weights.

use serde::{Deserialize, Serialize};

use super::shape::{FeatureShape, OutputShape};
use crate::utils::format_number;

/// Kind of layer recorded in a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    Conv2d,
    SeparableConv2d,
    BatchNorm,
    Relu,
    MaxPool2d,
    GlobalAvgPool2d,
    Flatten,
    Dense,
    Softmax,
    Add,
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LayerKind::Conv2d => "Conv2d",
            LayerKind::SeparableConv2d => "SeparableConv2d",
            LayerKind::BatchNorm => "BatchNorm",
            LayerKind::Relu => "ReLU",
            LayerKind::MaxPool2d => "MaxPool2d",
            LayerKind::GlobalAvgPool2d => "GlobalAvgPool2d",
            LayerKind::Flatten => "Flatten",
            LayerKind::Dense => "Dense",
            LayerKind::Softmax => "Softmax",
            LayerKind::Add => "Add",
        };
        f.write_str(name)
    }
}

/// One row of a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSummary {
    /// Hierarchical name, e.g. `entry_flow/block2/shortcut_conv`
    pub name: String,
    pub kind: LayerKind,
    pub output: OutputShape,
    /// Trainable parameters
    pub params: usize,
}

/// Ordered description of every layer in a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub name: String,
    pub input: FeatureShape,
    pub layers: Vec<LayerSummary>,
}

impl ModelSummary {
    pub fn new(name: &str, input: FeatureShape) -> Self {
        Self {
            name: name.to_string(),
            input,
            layers: Vec::new(),
        }
    }

    /// Append a layer
    pub fn push(
        &mut self,
        name: impl Into<String>,
        kind: LayerKind,
        output: impl Into<OutputShape>,
        params: usize,
    ) {
        self.layers.push(LayerSummary {
            name: name.into(),
            kind,
            output: output.into(),
            params,
        });
    }

    /// Output shape of the last layer, or the input shape if empty
    pub fn output(&self) -> OutputShape {
        self.layers
            .last()
            .map(|layer| layer.output)
            .unwrap_or(OutputShape::Spatial(self.input))
    }

    /// Total trainable parameters
    pub fn total_params(&self) -> usize {
        self.layers.iter().map(|layer| layer.params).sum()
    }

    /// Number of layers of the given kind
    pub fn count(&self, kind: LayerKind) -> usize {
        self.layers.iter().filter(|layer| layer.kind == kind).count()
    }

    /// Layers whose name starts with `prefix`
    pub fn layers_in<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a LayerSummary> {
        self.layers
            .iter()
            .filter(move |layer| layer.name.starts_with(prefix))
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rule = "═".repeat(88);
        let thin = "─".repeat(88);

        writeln!(f, "Model: {}", self.name)?;
        writeln!(f, "{}", rule)?;
        writeln!(
            f,
            "{:<40} {:<16} {:<20} {:>10}",
            "Layer", "Type", "Output Shape", "Params"
        )?;
        writeln!(f, "{}", rule)?;
        writeln!(
            f,
            "{:<40} {:<16} {:<20} {:>10}",
            "input",
            "Input",
            self.input.to_string(),
            0
        )?;
        for layer in &self.layers {
            writeln!(
                f,
                "{:<40} {:<16} {:<20} {:>10}",
                layer.name,
                layer.kind.to_string(),
                layer.output.to_string(),
                format_number(layer.params)
            )?;
        }
        writeln!(f, "{}", thin)?;
        writeln!(f, "Layers: {}", self.layers.len())?;
        writeln!(f, "Trainable params: {}", format_number(self.total_params()))?;
        writeln!(f, "{}", rule)
    }
}

/// Trainable parameters of a square convolution
pub fn conv_params(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    groups: usize,
    bias: bool,
) -> usize {
    let weights = kernel * kernel * (in_channels / groups) * out_channels;
    if bias {
        weights + out_channels
    } else {
        weights
    }
}

/// Trainable parameters of a depthwise + pointwise separable convolution
pub fn separable_params(in_channels: usize, out_channels: usize, kernel: usize) -> usize {
    conv_params(in_channels, in_channels, kernel, in_channels, false)
        + conv_params(in_channels, out_channels, 1, 1, true)
}

/// Trainable parameters of a dense layer
pub fn dense_params(inputs: usize, outputs: usize) -> usize {
    inputs * outputs + outputs
}

/// Trainable parameters of a batch norm layer (gamma and beta)
pub fn batch_norm_params(channels: usize) -> usize {
    2 * channels
}
