//! Xception (composable)
//!
//! Three stages built from depthwise separable convolutions:
//! - Entry flow: a two-convolution stem followed by projection residual blocks
//! - Middle flow: identity residual blocks at constant width and resolution
//! - Exit flow: a projection block with a widening main branch, two more
//!   separable convolutions, global average pooling and the classifier
//!
//! Reference: "Xception: Deep Learning with Depthwise Separable Convolutions"
//! (Chollet, 2016), <https://arxiv.org/abs/1610.02357>

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, Initializer, Linear, LinearConfig,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};

use super::layers::{
    batch_norm_config, check_channels, glorot_uniform, ConvNormBlock,
    ConvNormBlockConfig, SeparableUnit, SeparableUnitConfig,
};
use super::shape::{FeatureShape, OutputShape};
use super::summary::{batch_norm_params, conv_params, dense_params, LayerKind, ModelSummary};
use crate::utils::{BuildLogger, Result, ZooError};

/// Filters of the two stem convolutions
pub const STEM_FILTERS: [usize; 2] = [32, 64];

/// Default widths of the entry-flow projection blocks
pub const ENTRY_FILTERS: [usize; 3] = [128, 256, 728];

/// Default width of the middle-flow identity blocks
pub const MIDDLE_FILTERS: usize = 728;

/// Default number of middle-flow identity blocks
pub const MIDDLE_BLOCKS: usize = 8;

/// Main-branch widths of the exit-flow projection block
pub const EXIT_BLOCK_FILTERS: [usize; 2] = [728, 1024];

/// Widths of the separable convolutions after the exit-flow merge
pub const EXIT_TAIL_FILTERS: [usize; 2] = [1556, 2048];

const POOL_SIZE: usize = 3;
const POOL_STRIDE: usize = 2;
const POOL_PADDING: usize = 1;
const SHORTCUT_STRIDE: usize = 2;

fn downsample_pool() -> MaxPool2d {
    MaxPool2dConfig::new([POOL_SIZE, POOL_SIZE])
        .with_strides([POOL_STRIDE, POOL_STRIDE])
        .init()
}

/// Per-side padding `(before, after)` of a `same` downsampling pool
///
/// The odd pixel of an uneven total goes after the input.
fn same_pool_padding(size: usize) -> (usize, usize) {
    let out = size.div_ceil(POOL_STRIDE);
    let total = ((out - 1) * POOL_STRIDE + POOL_SIZE).saturating_sub(size);
    (total / 2, total - total / 2)
}

/// Pad with -inf so padded cells never win the max
fn pad_for_pool<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [_, _, height, width] = x.dims();
    let (top, bottom) = same_pool_padding(height);
    let (left, right) = same_pool_padding(width);
    x.pad((left, right, top, bottom), f32::NEG_INFINITY)
}

/// Configuration for a residual block with a strided projection shortcut
#[derive(Config, Debug)]
pub struct ProjectionBlockConfig {
    pub in_channels: usize,
    /// Width of the shortcut projection and of the block output
    pub n_filters: usize,
    /// Main-branch units as `(filters, relu)`; two ReLU units of `n_filters` if unset
    #[config(default = "None")]
    pub main_branch: Option<Vec<(usize, bool)>>,
    #[config(default = "glorot_uniform()")]
    pub initializer: Initializer,
}

impl ProjectionBlockConfig {
    fn units(&self) -> Vec<SeparableUnitConfig> {
        let branch = self
            .main_branch
            .clone()
            .unwrap_or_else(|| vec![(self.n_filters, true), (self.n_filters, true)]);

        let mut in_channels = self.in_channels;
        branch
            .into_iter()
            .map(|(filters, relu)| {
                let unit = SeparableUnitConfig::new([in_channels, filters])
                    .with_activation(relu)
                    .with_initializer(self.initializer.clone());
                in_channels = filters;
                unit
            })
            .collect()
    }

    /// Record the block and return its output shape
    ///
    /// Fails with [`ZooError::ShapeMismatch`] if the two branches disagree.
    pub fn summarize(
        &self,
        name: &str,
        input: FeatureShape,
        summary: &mut ModelSummary,
    ) -> Result<FeatureShape> {
        check_channels(name, self.in_channels, input)?;

        let shortcut = input.window(self.n_filters, 1, SHORTCUT_STRIDE, 0)?;
        summary.push(
            format!("{}/shortcut_conv", name),
            LayerKind::Conv2d,
            shortcut,
            conv_params(self.in_channels, self.n_filters, 1, 1, true),
        );
        summary.push(
            format!("{}/shortcut_bn", name),
            LayerKind::BatchNorm,
            shortcut,
            batch_norm_params(self.n_filters),
        );

        let mut main = input;
        for (i, unit) in self.units().iter().enumerate() {
            main = unit.summarize(&format!("{}/sep{}", name, i + 1), main, summary)?;
        }
        main = main.window(main.channels, POOL_SIZE, POOL_STRIDE, POOL_PADDING)?;
        summary.push(format!("{}/pool", name), LayerKind::MaxPool2d, main, 0);

        if main != shortcut {
            return Err(ZooError::ShapeMismatch {
                block: name.to_string(),
                shortcut,
                main,
            });
        }
        summary.push(format!("{}/add", name), LayerKind::Add, main, 0);
        Ok(main)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ProjectionBlock<B> {
        let shortcut = Conv2dConfig::new([self.in_channels, self.n_filters], [1, 1])
            .with_stride([SHORTCUT_STRIDE, SHORTCUT_STRIDE])
            .with_initializer(self.initializer.clone())
            .init(device);

        ProjectionBlock {
            shortcut,
            shortcut_norm: batch_norm_config(self.n_filters).init(device),
            main: self.units().iter().map(|unit| unit.init(device)).collect(),
            pool: downsample_pool(),
        }
    }
}

/// Residual block whose shortcut is a strided 1x1 convolution
///
/// The main branch is downsampled by a `same` padded max pool so both
/// branches land on `ceil(n / 2)`.
#[derive(Module, Debug)]
pub struct ProjectionBlock<B: Backend> {
    pub shortcut: Conv2d<B>,
    pub shortcut_norm: BatchNorm<B, 2>,
    pub main: Vec<SeparableUnit<B>>,
    pub pool: MaxPool2d,
}

impl<B: Backend> ProjectionBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let shortcut = self.shortcut_norm.forward(self.shortcut.forward(x.clone()));

        let x = self.main.iter().fold(x, |x, unit| unit.forward(x));
        let x = self.pool.forward(pad_for_pool(x));

        x + shortcut
    }
}

/// Configuration for a residual block with an identity shortcut
#[derive(Config, Debug)]
pub struct ResidualBlockConfig {
    pub in_channels: usize,
    pub n_filters: usize,
    #[config(default = "3")]
    pub n_units: usize,
    #[config(default = "glorot_uniform()")]
    pub initializer: Initializer,
}

impl ResidualBlockConfig {
    fn units(&self) -> Vec<SeparableUnitConfig> {
        (0..self.n_units)
            .map(|i| {
                let in_channels = if i == 0 {
                    self.in_channels
                } else {
                    self.n_filters
                };
                SeparableUnitConfig::new([in_channels, self.n_filters])
                    .with_initializer(self.initializer.clone())
            })
            .collect()
    }

    /// Record the block and return its output shape
    ///
    /// The identity shortcut only type-checks when the block keeps its input
    /// width; anything else is a [`ZooError::ShapeMismatch`].
    pub fn summarize(
        &self,
        name: &str,
        input: FeatureShape,
        summary: &mut ModelSummary,
    ) -> Result<FeatureShape> {
        let mut main = input;
        for (i, unit) in self.units().iter().enumerate() {
            main = unit.summarize(&format!("{}/sep{}", name, i + 1), main, summary)?;
        }

        if main != input {
            return Err(ZooError::ShapeMismatch {
                block: name.to_string(),
                shortcut: input,
                main,
            });
        }
        summary.push(format!("{}/add", name), LayerKind::Add, main, 0);
        Ok(main)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ResidualBlock<B> {
        ResidualBlock {
            main: self.units().iter().map(|unit| unit.init(device)).collect(),
        }
    }
}

/// Residual block whose shortcut is the unmodified input
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    pub main: Vec<SeparableUnit<B>>,
}

impl<B: Backend> ResidualBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let shortcut = x.clone();
        let x = self.main.iter().fold(x, |x, unit| unit.forward(x));
        x + shortcut
    }
}

/// Strided reduction followed by width expansion, both valid-padded
#[derive(Module, Debug)]
pub struct XceptionStem<B: Backend> {
    pub reduce: ConvNormBlock<B>,
    pub expand: ConvNormBlock<B>,
}

impl<B: Backend> XceptionStem<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.expand.forward(self.reduce.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct EntryFlow<B: Backend> {
    pub stem: XceptionStem<B>,
    pub blocks: Vec<ProjectionBlock<B>>,
}

impl<B: Backend> EntryFlow<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.stem.forward(x);
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct MiddleFlow<B: Backend> {
    pub blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> MiddleFlow<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct ExitFlow<B: Backend> {
    pub block: ProjectionBlock<B>,
    pub tail: Vec<SeparableUnit<B>>,
    pub pool: AdaptiveAvgPool2d,
    pub classifier: Linear<B>,
}

impl<B: Backend> ExitFlow<B> {
    /// Returns logits of shape `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.block.forward(x);
        let x = self.tail.iter().fold(x, |x, unit| unit.forward(x));

        // Global pooling: [B, C, H, W] -> [B, C, 1, 1] -> [B, C]
        let x = self.pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        self.classifier.forward(x)
    }
}

/// Configuration for an Xception model
#[derive(Config, Debug)]
pub struct XceptionConfig {
    /// Input shape as `(height, width, channels)`
    #[config(default = "[229, 229, 3]")]
    pub input_shape: [usize; 3],

    /// Number of output classes
    #[config(default = "1000")]
    pub num_classes: usize,

    /// One projection block per entry
    #[config(default = "ENTRY_FILTERS.to_vec()")]
    pub entry_filters: Vec<usize>,

    /// One identity block per entry
    #[config(default = "vec![MIDDLE_FILTERS; MIDDLE_BLOCKS]")]
    pub middle_filters: Vec<usize>,

    #[config(default = "glorot_uniform()")]
    pub initializer: Initializer,
}

/// Per-stage configs derived from an [`XceptionConfig`]
struct XceptionPlan {
    stem: [ConvNormBlockConfig; 2],
    entry: Vec<ProjectionBlockConfig>,
    middle: Vec<ResidualBlockConfig>,
    exit: ProjectionBlockConfig,
    tail: Vec<SeparableUnitConfig>,
    features: usize,
}

impl XceptionConfig {
    fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(ZooError::InvalidConfig(
                "num_classes must be greater than 0".to_string(),
            ));
        }
        if self.entry_filters.is_empty() {
            return Err(ZooError::InvalidConfig(
                "entry_filters must have at least one block".to_string(),
            ));
        }
        if self.entry_filters.iter().chain(&self.middle_filters).any(|&f| f == 0) {
            return Err(ZooError::InvalidConfig(
                "block widths must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn plan(&self) -> Result<XceptionPlan> {
        self.validate()?;
        let init = || self.initializer.clone();

        let [reduce, expand] = STEM_FILTERS;
        let stem = [
            ConvNormBlockConfig::new([self.input_shape[2], reduce], 3)
                .with_stride(2)
                .with_initializer(init()),
            ConvNormBlockConfig::new([reduce, expand], 3).with_initializer(init()),
        ];

        let mut in_channels = expand;
        let entry = self
            .entry_filters
            .iter()
            .map(|&n_filters| {
                let block =
                    ProjectionBlockConfig::new(in_channels, n_filters).with_initializer(init());
                in_channels = n_filters;
                block
            })
            .collect();

        let middle = self
            .middle_filters
            .iter()
            .map(|&n_filters| {
                let block =
                    ResidualBlockConfig::new(in_channels, n_filters).with_initializer(init());
                in_channels = n_filters;
                block
            })
            .collect();

        let [exit_reduce, exit_width] = EXIT_BLOCK_FILTERS;
        let exit = ProjectionBlockConfig::new(in_channels, exit_width)
            .with_main_branch(Some(vec![(exit_reduce, false), (exit_width, true)]))
            .with_initializer(init());

        let mut in_channels = exit_width;
        let tail = EXIT_TAIL_FILTERS
            .iter()
            .map(|&filters| {
                let unit =
                    SeparableUnitConfig::new([in_channels, filters]).with_initializer(init());
                in_channels = filters;
                unit
            })
            .collect();

        Ok(XceptionPlan {
            stem,
            entry,
            middle,
            exit,
            tail,
            features: in_channels,
        })
    }

    fn summarize(&self, plan: &XceptionPlan) -> Result<ModelSummary> {
        let input = FeatureShape::from_hwc(self.input_shape)?;
        let mut summary = ModelSummary::new("Xception", input);

        // Entry flow
        let mut shape = plan.stem[0].summarize("entry_flow/stem1", input, &mut summary)?;
        shape = plan.stem[1].summarize("entry_flow/stem2", shape, &mut summary)?;
        for (i, block) in plan.entry.iter().enumerate() {
            shape = block.summarize(&format!("entry_flow/block{}", i + 1), shape, &mut summary)?;
        }

        // Middle flow
        for (i, block) in plan.middle.iter().enumerate() {
            shape =
                block.summarize(&format!("middle_flow/block{}", i + 1), shape, &mut summary)?;
        }

        // Exit flow
        shape = plan.exit.summarize("exit_flow/block", shape, &mut summary)?;
        let offset = EXIT_BLOCK_FILTERS.len();
        for (i, unit) in plan.tail.iter().enumerate() {
            shape = unit.summarize(
                &format!("exit_flow/sep{}", offset + i + 1),
                shape,
                &mut summary,
            )?;
        }

        let features = shape.channels;
        summary.push(
            "exit_flow/global_pool",
            LayerKind::GlobalAvgPool2d,
            OutputShape::Flat(features),
            0,
        );
        summary.push(
            "exit_flow/dense",
            LayerKind::Dense,
            OutputShape::Flat(self.num_classes),
            dense_params(features, self.num_classes),
        );
        summary.push(
            "exit_flow/softmax",
            LayerKind::Softmax,
            OutputShape::Flat(self.num_classes),
            0,
        );

        Ok(summary)
    }

    /// Describe the model without allocating weights
    pub fn summary(&self) -> Result<ModelSummary> {
        let plan = self.plan()?;
        self.summarize(&plan)
    }

    /// Construct the model
    ///
    /// Every residual merge is shape-checked before any parameter is
    /// allocated.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Xception<B>> {
        let plan = self.plan()?;
        self.summarize(&plan)?;

        let mut logger = BuildLogger::new("Xception");

        let [reduce, expand] = &plan.stem;
        let stem = XceptionStem {
            reduce: reduce.init(device),
            expand: expand.init(device),
        };
        let blocks: Vec<ProjectionBlock<B>> =
            plan.entry.iter().map(|block| block.init(device)).collect();
        let entry = EntryFlow { stem, blocks };
        logger.stage("entry_flow", entry.num_params());

        let middle = MiddleFlow {
            blocks: plan.middle.iter().map(|block| block.init(device)).collect(),
        };
        logger.stage("middle_flow", middle.num_params());

        let exit = ExitFlow {
            block: plan.exit.init(device),
            tail: plan.tail.iter().map(|unit| unit.init(device)).collect(),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            classifier: LinearConfig::new(plan.features, self.num_classes)
                .with_initializer(self.initializer.clone())
                .init(device),
        };
        logger.stage("exit_flow", exit.num_params());

        let model = Xception {
            entry,
            middle,
            exit,
            num_classes: self.num_classes,
        };
        logger.finish(model.num_params());

        Ok(model)
    }
}

/// Xception classifier
#[derive(Module, Debug)]
pub struct Xception<B: Backend> {
    pub entry: EntryFlow<B>,
    pub middle: MiddleFlow<B>,
    pub exit: ExitFlow<B>,
    num_classes: usize,
}

impl<B: Backend> Xception<B> {
    /// Class logits for input of shape `[batch, channels, height, width]`
    pub fn forward_logits(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.entry.forward(x);
        let x = self.middle.forward(x);
        self.exit.forward(x)
    }

    /// Class probabilities of shape `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward_logits(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn small_config() -> XceptionConfig {
        XceptionConfig::new()
            .with_input_shape([32, 32, 3])
            .with_num_classes(5)
            .with_entry_filters(vec![16, 32])
            .with_middle_filters(vec![32, 32])
    }

    fn output_of(summary: &ModelSummary, name: &str) -> OutputShape {
        summary
            .layers
            .iter()
            .find(|layer| layer.name == name)
            .map(|layer| layer.output)
            .unwrap_or_else(|| panic!("missing layer {}", name))
    }

    #[test]
    fn test_default_end_to_end_shape() {
        let summary = XceptionConfig::new().summary().unwrap();

        assert_eq!(summary.input, FeatureShape::new(3, 229, 229));
        assert_eq!(summary.output(), OutputShape::Flat(1000));
        assert_eq!(summary.output().to_string(), "(None, 1000)");
    }

    #[test]
    fn test_default_stage_resolutions() {
        let summary = XceptionConfig::new().summary().unwrap();

        assert_eq!(
            output_of(&summary, "entry_flow/stem1/relu"),
            FeatureShape::new(32, 114, 114).into()
        );
        assert_eq!(
            output_of(&summary, "entry_flow/stem2/relu"),
            FeatureShape::new(64, 112, 112).into()
        );
        assert_eq!(
            output_of(&summary, "entry_flow/block3/add"),
            FeatureShape::new(728, 14, 14).into()
        );
        assert_eq!(
            output_of(&summary, "middle_flow/block8/add"),
            FeatureShape::new(728, 14, 14).into()
        );
        assert_eq!(
            output_of(&summary, "exit_flow/block/add"),
            FeatureShape::new(1024, 7, 7).into()
        );
        assert_eq!(
            output_of(&summary, "exit_flow/sep4/relu"),
            FeatureShape::new(2048, 7, 7).into()
        );
    }

    #[test]
    fn test_one_block_per_width() {
        let config = XceptionConfig::new()
            .with_entry_filters(vec![64, 128])
            .with_middle_filters(vec![128; 3]);
        let summary = config.summary().unwrap();

        let entry_adds = summary
            .layers_in("entry_flow/")
            .filter(|layer| layer.kind == LayerKind::Add)
            .count();
        let middle_adds = summary
            .layers_in("middle_flow/")
            .filter(|layer| layer.kind == LayerKind::Add)
            .count();

        assert_eq!(entry_adds, 2);
        assert_eq!(middle_adds, 3);

        let default = XceptionConfig::new().summary().unwrap();
        assert_eq!(
            default
                .layers_in("middle_flow/")
                .filter(|layer| layer.kind == LayerKind::Add)
                .count(),
            MIDDLE_BLOCKS
        );
    }

    #[test]
    fn test_projection_branches_agree() {
        let summary = XceptionConfig::new().summary().unwrap();
        let blocks = [
            "entry_flow/block1",
            "entry_flow/block2",
            "entry_flow/block3",
            "exit_flow/block",
        ];

        for block in blocks {
            let shortcut = output_of(&summary, &format!("{}/shortcut_bn", block));
            let main = output_of(&summary, &format!("{}/pool", block));
            assert_eq!(shortcut, main, "{}", block);
        }
    }

    #[test]
    fn test_identity_branches_agree() {
        let summary = XceptionConfig::new().summary().unwrap();

        for i in 1..=MIDDLE_BLOCKS {
            let block = format!("middle_flow/block{}", i);
            let first = summary
                .layers
                .iter()
                .position(|layer| layer.name.starts_with(&format!("{}/", block)))
                .unwrap();
            let shortcut = summary.layers[first - 1].output;
            let main = output_of(&summary, &format!("{}/sep3/relu", block));
            assert_eq!(shortcut, main, "{}", block);
        }
    }

    #[test]
    fn test_exit_flow_separable_convs() {
        let summary = XceptionConfig::new().summary().unwrap();
        let exit_convs = summary
            .layers_in("exit_flow/")
            .filter(|layer| layer.kind == LayerKind::SeparableConv2d)
            .count();
        let exit_projections = summary
            .layers_in("exit_flow/")
            .filter(|layer| layer.kind == LayerKind::Conv2d)
            .count();

        assert_eq!(exit_convs, 4);
        assert_eq!(exit_projections, 1);
    }

    #[test]
    fn test_middle_width_mismatch() {
        let config = XceptionConfig::new().with_middle_filters(vec![728, 512]);
        match config.summary() {
            Err(ZooError::ShapeMismatch { block, shortcut, main }) => {
                assert_eq!(block, "middle_flow/block2");
                assert_eq!(shortcut.channels, 728);
                assert_eq!(main.channels, 512);
            }
            other => panic!("expected shape mismatch, got {:?}", other),
        }

        let device = Default::default();
        assert!(config.init::<TestBackend>(&device).is_err());
    }

    #[test]
    fn test_input_too_small() {
        let config = XceptionConfig::new().with_input_shape([4, 4, 3]);
        assert!(matches!(config.summary(), Err(ZooError::InvalidShape(_))));
    }

    #[test]
    fn test_invalid_meta_parameters() {
        assert!(XceptionConfig::new().with_num_classes(0).summary().is_err());
        assert!(XceptionConfig::new()
            .with_entry_filters(Vec::new())
            .summary()
            .is_err());
    }

    fn norm_params(norm: &BatchNorm<TestBackend, 2>) -> usize {
        // Trainable scale and shift; running statistics are not counted
        2 * norm.gamma.val().dims()[0]
    }

    fn unit_params(unit: &SeparableUnit<TestBackend>) -> usize {
        unit.conv.num_params() + norm_params(&unit.norm)
    }

    fn projection_params(block: &ProjectionBlock<TestBackend>) -> usize {
        block.shortcut.num_params()
            + norm_params(&block.shortcut_norm)
            + block.main.iter().map(unit_params).sum::<usize>()
    }

    fn trainable_params(model: &Xception<TestBackend>) -> usize {
        let stem = &model.entry.stem;
        let stem_params = stem.reduce.conv.num_params()
            + norm_params(&stem.reduce.norm)
            + stem.expand.conv.num_params()
            + norm_params(&stem.expand.norm);

        stem_params
            + model.entry.blocks.iter().map(projection_params).sum::<usize>()
            + model
                .middle
                .blocks
                .iter()
                .flat_map(|block| block.main.iter())
                .map(unit_params)
                .sum::<usize>()
            + projection_params(&model.exit.block)
            + model.exit.tail.iter().map(unit_params).sum::<usize>()
            + model.exit.classifier.num_params()
    }

    #[test]
    fn test_model_structure() {
        let device = Default::default();
        let config = small_config();
        let model = config.init::<TestBackend>(&device).unwrap();

        assert_eq!(model.entry.blocks.len(), 2);
        assert_eq!(model.middle.blocks.len(), 2);
        for block in &model.middle.blocks {
            assert_eq!(block.main.len(), 3);
        }
        assert_eq!(model.exit.block.main.len(), 2);
        assert!(model.exit.block.main[0].activation.is_none());
        assert_eq!(model.exit.tail.len(), 2);
        assert_eq!(model.exit.classifier.weight.val().dims(), [2048, 5]);
        assert_eq!(model.num_classes(), 5);
    }

    #[test]
    fn test_model_matches_summary() {
        let device = Default::default();
        let config = small_config();
        let summary = config.summary().unwrap();
        let model = config.init::<TestBackend>(&device).unwrap();

        assert_eq!(trainable_params(&model), summary.total_params());

        let input = Tensor::<TestBackend, 4>::zeros([3, 3, 32, 32], &device);
        let [batch_size, classes] = model.forward(input).dims();
        assert_eq!(batch_size, 3);
        assert_eq!(OutputShape::Flat(classes), summary.output());
    }

    #[test]
    fn test_forward_probabilities() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device).unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [2, 3, 32, 32],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, 5]);

        let row_sums = output.sum_dim(1).into_data().to_vec::<f32>().unwrap();
        assert_eq!(row_sums.len(), 2);
        for total in row_sums {
            assert!((total - 1.0).abs() < 1e-4, "row sums to {}", total);
        }
    }

    #[test]
    fn test_projection_block_forward_shape() {
        let device = Default::default();
        let config = ProjectionBlockConfig::new(8, 16);
        let block = config.init::<TestBackend>(&device);

        for size in [7, 8] {
            let input = Tensor::<TestBackend, 4>::zeros([1, 8, size, size], &device);
            let output = block.forward(input);
            assert_eq!(output.dims(), [1, 16, (size + 1) / 2, (size + 1) / 2]);
        }
    }

    #[test]
    fn test_same_pool_padding() {
        // Odd sizes pad both sides, even sizes pad only after
        assert_eq!(same_pool_padding(7), (1, 1));
        assert_eq!(same_pool_padding(229), (1, 1));
        assert_eq!(same_pool_padding(112), (0, 1));
        assert_eq!(same_pool_padding(14), (0, 1));
        assert_eq!(same_pool_padding(1), (1, 1));
    }

    #[test]
    fn test_downsample_pool_windows() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 1, burn::tensor::Int>::arange(0..16, &device)
            .float()
            .reshape([1, 1, 4, 4]);

        let output = downsample_pool().forward(pad_for_pool(input));
        assert_eq!(output.dims(), [1, 1, 2, 2]);

        let values = output.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![10.0, 11.0, 14.0, 15.0]);
    }

    #[test]
    fn test_repeated_construction_is_structurally_identical() {
        let config = small_config();
        assert_eq!(config.summary().unwrap(), config.summary().unwrap());

        let device = Default::default();
        let first = config.init::<TestBackend>(&device).unwrap();
        let second = config.init::<TestBackend>(&device).unwrap();
        assert_eq!(first.num_params(), second.num_params());

        // Independent parameters, not shared handles
        assert_ne!(first.exit.classifier.weight.id, second.exit.classifier.weight.id);
        assert_ne!(
            first.entry.stem.reduce.conv.weight.id,
            second.entry.stem.reduce.conv.weight.id
        );
    }
}
