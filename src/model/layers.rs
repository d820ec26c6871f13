//! Building blocks shared by the architectures
//!
//! Each block comes as a `*Config` (built with Burn's `Config` derive) and a
//! `Module`. The config knows how to initialize the module and how to record
//! the block in a [`ModelSummary`] while inferring its output shape.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use super::shape::{same_padding, FeatureShape};
use super::summary::{batch_norm_params, conv_params, separable_params, LayerKind, ModelSummary};
use crate::utils::{Result, ZooError};

/// Glorot/Xavier uniform with unit gain
pub fn glorot_uniform() -> Initializer {
    Initializer::XavierUniform { gain: 1.0 }
}

/// Batch norm with epsilon 1e-3 and a 0.99 moving average
///
/// Burn's momentum weights the new batch statistics, so a 0.99 decay of the
/// running statistics is a momentum of 0.01.
pub fn batch_norm_config(channels: usize) -> BatchNormConfig {
    BatchNormConfig::new(channels)
        .with_epsilon(1e-3)
        .with_momentum(0.01)
}

/// Symmetric padding config for a per-side padding amount
pub fn padding_config(padding: usize) -> PaddingConfig2d {
    if padding == 0 {
        PaddingConfig2d::Valid
    } else {
        PaddingConfig2d::Explicit(padding, padding)
    }
}

pub(crate) fn check_channels(block: &str, expected: usize, input: FeatureShape) -> Result<()> {
    if input.channels != expected {
        return Err(ZooError::InvalidConfig(format!(
            "{} expects {} input channels, got {}",
            block, expected, input.channels
        )));
    }
    Ok(())
}

/// Configuration for a convolution followed by batch norm and optional ReLU
#[derive(Config, Debug)]
pub struct ConvNormBlockConfig {
    /// Input and output channels
    pub channels: [usize; 2],
    /// Square kernel size
    pub kernel_size: usize,
    #[config(default = "1")]
    pub stride: usize,
    /// Per-side zero padding
    #[config(default = "0")]
    pub padding: usize,
    #[config(default = "true")]
    pub activation: bool,
    #[config(default = "glorot_uniform()")]
    pub initializer: Initializer,
}

impl ConvNormBlockConfig {
    /// Record the block and return its output shape
    pub fn summarize(
        &self,
        name: &str,
        input: FeatureShape,
        summary: &mut ModelSummary,
    ) -> Result<FeatureShape> {
        let [in_channels, out_channels] = self.channels;
        check_channels(name, in_channels, input)?;

        let out = input.window(out_channels, self.kernel_size, self.stride, self.padding)?;
        summary.push(
            format!("{}/conv", name),
            LayerKind::Conv2d,
            out,
            conv_params(in_channels, out_channels, self.kernel_size, 1, true),
        );
        summary.push(
            format!("{}/bn", name),
            LayerKind::BatchNorm,
            out,
            batch_norm_params(out_channels),
        );
        if self.activation {
            summary.push(format!("{}/relu", name), LayerKind::Relu, out, 0);
        }
        Ok(out)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvNormBlock<B> {
        let conv = Conv2dConfig::new(self.channels, [self.kernel_size, self.kernel_size])
            .with_stride([self.stride, self.stride])
            .with_padding(padding_config(self.padding))
            .with_initializer(self.initializer.clone())
            .init(device);

        ConvNormBlock {
            conv,
            norm: batch_norm_config(self.channels[1]).init(device),
            activation: self.activation.then(Relu::new),
        }
    }
}

/// Conv2d -> BatchNorm -> (ReLU)
#[derive(Module, Debug)]
pub struct ConvNormBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: BatchNorm<B, 2>,
    pub activation: Option<Relu>,
}

impl<B: Backend> ConvNormBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.norm.forward(x);

        match &self.activation {
            Some(relu) => relu.forward(x),
            None => x,
        }
    }
}

/// Configuration for a depthwise separable convolution
#[derive(Config, Debug)]
pub struct SeparableConv2dConfig {
    /// Input and output channels
    pub channels: [usize; 2],
    #[config(default = "3")]
    pub kernel_size: usize,
    #[config(default = "glorot_uniform()")]
    pub initializer: Initializer,
}

impl SeparableConv2dConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SeparableConv2d<B> {
        let [in_channels, out_channels] = self.channels;

        // One spatial filter per input channel, no bias
        let depthwise = Conv2dConfig::new(
            [in_channels, in_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_groups(in_channels)
        .with_padding(padding_config(same_padding(self.kernel_size)))
        .with_bias(false)
        .with_initializer(self.initializer.clone())
        .init(device);

        let pointwise = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_initializer(self.initializer.clone())
            .init(device);

        SeparableConv2d {
            depthwise,
            pointwise,
        }
    }
}

/// Depthwise spatial convolution followed by a pointwise 1x1 convolution
///
/// Keeps the spatial size (stride 1, same padding).
#[derive(Module, Debug)]
pub struct SeparableConv2d<B: Backend> {
    pub depthwise: Conv2d<B>,
    pub pointwise: Conv2d<B>,
}

impl<B: Backend> SeparableConv2d<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.depthwise.forward(x);
        self.pointwise.forward(x)
    }
}

/// Configuration for a separable convolution followed by batch norm and optional ReLU
#[derive(Config, Debug)]
pub struct SeparableUnitConfig {
    /// Input and output channels
    pub channels: [usize; 2],
    #[config(default = "true")]
    pub activation: bool,
    #[config(default = "glorot_uniform()")]
    pub initializer: Initializer,
}

impl SeparableUnitConfig {
    /// Record the unit and return its output shape
    pub fn summarize(
        &self,
        name: &str,
        input: FeatureShape,
        summary: &mut ModelSummary,
    ) -> Result<FeatureShape> {
        let [in_channels, out_channels] = self.channels;
        check_channels(name, in_channels, input)?;

        let out = input.with_channels(out_channels);
        summary.push(
            format!("{}/sepconv", name),
            LayerKind::SeparableConv2d,
            out,
            separable_params(in_channels, out_channels, 3),
        );
        summary.push(
            format!("{}/bn", name),
            LayerKind::BatchNorm,
            out,
            batch_norm_params(out_channels),
        );
        if self.activation {
            summary.push(format!("{}/relu", name), LayerKind::Relu, out, 0);
        }
        Ok(out)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> SeparableUnit<B> {
        let conv = SeparableConv2dConfig::new(self.channels)
            .with_initializer(self.initializer.clone())
            .init(device);

        SeparableUnit {
            conv,
            norm: batch_norm_config(self.channels[1]).init(device),
            activation: self.activation.then(Relu::new),
        }
    }
}

/// SeparableConv2d -> BatchNorm -> (ReLU)
#[derive(Module, Debug)]
pub struct SeparableUnit<B: Backend> {
    pub conv: SeparableConv2d<B>,
    pub norm: BatchNorm<B, 2>,
    pub activation: Option<Relu>,
}

impl<B: Backend> SeparableUnit<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.norm.forward(x);

        match &self.activation {
            Some(relu) => relu.forward(x),
            None => x,
        }
    }
}
