//! VGG (16 and 19, composable)
//!
//! Architecture:
//! - Stem: one 3x3 convolution with 64 filters
//! - Learner: convolutional groups of same-padded 3x3 convolutions, each group
//!   closed by a 2x2 max pool
//! - Classifier: flatten, two wide dense layers, softmax output
//!
//! Reference: "Very Deep Convolutional Networks for Large-Scale Image
//! Recognition" (Simonyan & Zisserman, 2014), <https://arxiv.org/abs/1409.1556>

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Initializer, Linear, LinearConfig, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};

use super::layers::{glorot_uniform, padding_config};
use super::shape::{same_padding, FeatureShape, OutputShape};
use super::summary::{conv_params, dense_params, LayerKind, ModelSummary};
use crate::utils::{BuildLogger, Result, ZooError};

/// Filters of the stem convolution
pub const STEM_FILTERS: usize = 64;

/// `(layers, filters)` per convolutional group of VGG16
pub const VGG16_GROUPS: [(usize, usize); 5] = [(1, 64), (2, 128), (3, 256), (3, 512), (3, 512)];

/// `(layers, filters)` per convolutional group of VGG19
pub const VGG19_GROUPS: [(usize, usize); 5] = [(1, 64), (2, 128), (4, 256), (4, 256), (4, 256)];

const KERNEL_SIZE: usize = 3;
const POOL_SIZE: usize = 2;

/// Supported VGG depths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VggDepth {
    Vgg16,
    Vgg19,
}

impl VggDepth {
    /// Weight layers (convolutions plus dense layers)
    pub fn layers(&self) -> usize {
        match self {
            VggDepth::Vgg16 => 16,
            VggDepth::Vgg19 => 19,
        }
    }

    /// Convolutional groups as `(layers, filters)`
    pub fn groups(&self) -> &'static [(usize, usize)] {
        match self {
            VggDepth::Vgg16 => &VGG16_GROUPS,
            VggDepth::Vgg19 => &VGG19_GROUPS,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VggDepth::Vgg16 => "VGG16",
            VggDepth::Vgg19 => "VGG19",
        }
    }
}

impl TryFrom<usize> for VggDepth {
    type Error = ZooError;

    fn try_from(n_layers: usize) -> Result<Self> {
        match n_layers {
            16 => Ok(VggDepth::Vgg16),
            19 => Ok(VggDepth::Vgg19),
            other => Err(ZooError::InvalidConfig(format!(
                "VGG: invalid value for n_layers: {} (expected 16 or 19)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for VggDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn conv3x3<B: Backend>(
    channels: [usize; 2],
    initializer: &Initializer,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new(channels, [KERNEL_SIZE, KERNEL_SIZE])
        .with_padding(padding_config(same_padding(KERNEL_SIZE)))
        .with_initializer(initializer.clone())
        .init(device)
}

/// Configuration for one convolutional group
#[derive(Config, Debug)]
pub struct ConvGroupConfig {
    pub in_channels: usize,
    /// Number of convolutional layers
    pub n_layers: usize,
    /// Filters of every convolution in the group
    pub n_filters: usize,
    #[config(default = "glorot_uniform()")]
    pub initializer: Initializer,
}

impl ConvGroupConfig {
    /// Record the group and return its output shape
    pub fn summarize(
        &self,
        name: &str,
        input: FeatureShape,
        summary: &mut ModelSummary,
    ) -> Result<FeatureShape> {
        let mut shape = input;
        let mut in_channels = self.in_channels;

        for n in 1..=self.n_layers {
            shape = shape.window(self.n_filters, KERNEL_SIZE, 1, same_padding(KERNEL_SIZE))?;
            summary.push(
                format!("{}/conv{}", name, n),
                LayerKind::Conv2d,
                shape,
                conv_params(in_channels, self.n_filters, KERNEL_SIZE, 1, true),
            );
            summary.push(format!("{}/relu{}", name, n), LayerKind::Relu, shape, 0);
            in_channels = self.n_filters;
        }

        shape = shape.window(shape.channels, POOL_SIZE, POOL_SIZE, 0)?;
        summary.push(format!("{}/pool", name), LayerKind::MaxPool2d, shape, 0);
        Ok(shape)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvGroup<B> {
        let convs = (0..self.n_layers)
            .map(|n| {
                let in_channels = if n == 0 {
                    self.in_channels
                } else {
                    self.n_filters
                };
                conv3x3(
                    [in_channels, self.n_filters],
                    &self.initializer,
                    device,
                )
            })
            .collect();

        ConvGroup {
            convs,
            pool: MaxPool2dConfig::new([POOL_SIZE, POOL_SIZE])
                .with_strides([POOL_SIZE, POOL_SIZE])
                .init(),
            activation: Relu::new(),
        }
    }
}

/// A run of same-width 3x3 convolutions followed by max pooling
#[derive(Module, Debug)]
pub struct ConvGroup<B: Backend> {
    pub convs: Vec<Conv2d<B>>,
    pub pool: MaxPool2d,
    pub activation: Relu,
}

impl<B: Backend> ConvGroup<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self
            .convs
            .iter()
            .fold(x, |x, conv| self.activation.forward(conv.forward(x)));
        self.pool.forward(x)
    }
}

/// Flatten -> Dense -> Dense -> Dense(num_classes)
#[derive(Module, Debug)]
pub struct VggClassifier<B: Backend> {
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    pub output: Linear<B>,
    pub activation: Relu,
}

impl<B: Backend> VggClassifier<B> {
    /// Returns logits of shape `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.activation.forward(self.fc1.forward(x));
        let x = self.activation.forward(self.fc2.forward(x));
        self.output.forward(x)
    }
}

/// Configuration for a VGG model
#[derive(Config, Debug)]
pub struct VggConfig {
    /// Layer-count selector, 16 or 19
    pub n_layers: usize,

    /// Input shape as `(height, width, channels)`
    #[config(default = "[224, 224, 3]")]
    pub input_shape: [usize; 3],

    /// Number of output classes
    #[config(default = "1000")]
    pub num_classes: usize,

    /// Width of the two hidden dense layers
    #[config(default = "4096")]
    pub dense_units: usize,

    #[config(default = "glorot_uniform()")]
    pub initializer: Initializer,
}

impl VggConfig {
    /// Resolve the depth and check the remaining meta-parameters
    pub fn depth(&self) -> Result<VggDepth> {
        let depth = VggDepth::try_from(self.n_layers)?;

        if self.num_classes == 0 {
            return Err(ZooError::InvalidConfig(
                "num_classes must be greater than 0".to_string(),
            ));
        }
        if self.dense_units == 0 {
            return Err(ZooError::InvalidConfig(
                "dense_units must be greater than 0".to_string(),
            ));
        }

        Ok(depth)
    }

    fn group_configs(&self, depth: VggDepth) -> Vec<ConvGroupConfig> {
        let mut in_channels = STEM_FILTERS;
        depth
            .groups()
            .iter()
            .map(|&(n_layers, n_filters)| {
                let config = ConvGroupConfig::new(in_channels, n_layers, n_filters)
                    .with_initializer(self.initializer.clone());
                in_channels = n_filters;
                config
            })
            .collect()
    }

    /// Build the summary and return it with the flattened feature width
    fn plan(&self) -> Result<(VggDepth, ModelSummary, usize)> {
        let depth = self.depth()?;
        let input = FeatureShape::from_hwc(self.input_shape)?;
        let mut summary = ModelSummary::new(depth.name(), input);

        // Stem
        let mut shape = input.window(STEM_FILTERS, KERNEL_SIZE, 1, same_padding(KERNEL_SIZE))?;
        summary.push(
            "stem/conv",
            LayerKind::Conv2d,
            shape,
            conv_params(input.channels, STEM_FILTERS, KERNEL_SIZE, 1, true),
        );
        summary.push("stem/relu", LayerKind::Relu, shape, 0);

        // Learner
        for (i, group) in self.group_configs(depth).iter().enumerate() {
            shape = group.summarize(&format!("group{}", i + 1), shape, &mut summary)?;
        }

        // Classifier
        let flat = shape.features();
        let units = self.dense_units;
        summary.push("classifier/flatten", LayerKind::Flatten, OutputShape::Flat(flat), 0);
        summary.push(
            "classifier/dense1",
            LayerKind::Dense,
            OutputShape::Flat(units),
            dense_params(flat, units),
        );
        summary.push("classifier/relu1", LayerKind::Relu, OutputShape::Flat(units), 0);
        summary.push(
            "classifier/dense2",
            LayerKind::Dense,
            OutputShape::Flat(units),
            dense_params(units, units),
        );
        summary.push("classifier/relu2", LayerKind::Relu, OutputShape::Flat(units), 0);
        summary.push(
            "classifier/output",
            LayerKind::Dense,
            OutputShape::Flat(self.num_classes),
            dense_params(units, self.num_classes),
        );
        summary.push(
            "classifier/softmax",
            LayerKind::Softmax,
            OutputShape::Flat(self.num_classes),
            0,
        );

        Ok((depth, summary, flat))
    }

    /// Describe the model without allocating weights
    pub fn summary(&self) -> Result<ModelSummary> {
        self.plan().map(|(_, summary, _)| summary)
    }

    /// Construct the model
    ///
    /// The layer-count selector and input shape are validated before any
    /// parameter is allocated.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Vgg<B>> {
        let (depth, _, flat) = self.plan()?;
        let mut logger = BuildLogger::new(depth.name());

        let stem = conv3x3([self.input_shape[2], STEM_FILTERS], &self.initializer, device);
        logger.stage("stem", stem.num_params());

        let learner: Vec<ConvGroup<B>> = self
            .group_configs(depth)
            .iter()
            .enumerate()
            .map(|(i, config)| {
                let group = config.init(device);
                logger.stage(&format!("group{}", i + 1), group.num_params());
                group
            })
            .collect();

        let dense = |inputs: usize, outputs: usize| {
            LinearConfig::new(inputs, outputs)
                .with_initializer(self.initializer.clone())
                .init(device)
        };
        let classifier = VggClassifier {
            fc1: dense(flat, self.dense_units),
            fc2: dense(self.dense_units, self.dense_units),
            output: dense(self.dense_units, self.num_classes),
            activation: Relu::new(),
        };
        logger.stage("classifier", classifier.num_params());

        let model = Vgg {
            stem,
            learner,
            classifier,
            activation: Relu::new(),
            num_classes: self.num_classes,
        };
        logger.finish(model.num_params());

        Ok(model)
    }
}

/// VGG classifier
#[derive(Module, Debug)]
pub struct Vgg<B: Backend> {
    pub stem: Conv2d<B>,
    pub learner: Vec<ConvGroup<B>>,
    pub classifier: VggClassifier<B>,
    pub activation: Relu,
    num_classes: usize,
}

impl<B: Backend> Vgg<B> {
    /// Class logits for input of shape `[batch, channels, height, width]`
    pub fn forward_logits(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.stem.forward(x));
        let x = self.learner.iter().fold(x, |x, group| group.forward(x));
        self.classifier.forward(x)
    }

    /// Class probabilities of shape `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward_logits(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}
