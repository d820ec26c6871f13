//! Model Configuration Module
//!
//! A single serializable description of any architecture in the zoo,
//! dispatching to [`VggConfig`] or [`XceptionConfig`].

use std::path::Path;

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use super::summary::ModelSummary;
use super::vgg::{VggConfig, VggDepth};
use super::xception::XceptionConfig;
use super::{Architecture, ZooModel, DEFAULT_NUM_CLASSES};
use crate::utils::{Result, ZooError};

/// Top-level model configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Architecture family
    pub architecture: Architecture,

    /// VGG layer-count selector (16 or 19); ignored for Xception
    pub n_layers: usize,

    /// Input shape as `(height, width, channels)`; architecture default if unset
    #[serde(default)]
    pub input_shape: Option<[usize; 3]>,

    /// Number of output classes
    pub num_classes: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::Vgg,
            n_layers: 16,
            input_shape: None,
            num_classes: DEFAULT_NUM_CLASSES,
        }
    }
}

impl ModelConfig {
    /// VGG with the given layer-count selector
    pub fn vgg(n_layers: usize) -> Self {
        Self {
            n_layers,
            ..Default::default()
        }
    }

    /// Xception with default stage widths
    pub fn xception() -> Self {
        Self {
            architecture: Architecture::Xception,
            ..Default::default()
        }
    }

    pub fn with_input_shape(mut self, input_shape: [usize; 3]) -> Self {
        self.input_shape = Some(input_shape);
        self
    }

    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    /// Effective input shape
    pub fn input_shape(&self) -> [usize; 3] {
        self.input_shape
            .unwrap_or_else(|| self.architecture.default_input_shape())
    }

    /// Validate the meta-parameters without running shape inference
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(ZooError::InvalidConfig(
                "num_classes must be greater than 0".to_string(),
            ));
        }

        if self.input_shape().iter().any(|&d| d == 0) {
            return Err(ZooError::InvalidConfig(format!(
                "input shape {:?} has a zero dimension",
                self.input_shape()
            )));
        }

        if self.architecture == Architecture::Vgg {
            VggDepth::try_from(self.n_layers)?;
        }

        Ok(())
    }

    pub fn to_vgg(&self) -> VggConfig {
        VggConfig::new(self.n_layers)
            .with_input_shape(self.input_shape())
            .with_num_classes(self.num_classes)
    }

    pub fn to_xception(&self) -> XceptionConfig {
        XceptionConfig::new()
            .with_input_shape(self.input_shape())
            .with_num_classes(self.num_classes)
    }

    /// Describe the configured model without allocating weights
    pub fn summary(&self) -> Result<ModelSummary> {
        self.validate()?;
        match self.architecture {
            Architecture::Vgg => self.to_vgg().summary(),
            Architecture::Xception => self.to_xception().summary(),
        }
    }

    /// Construct the configured model
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ZooModel<B>> {
        self.validate()?;
        tracing::info!(
            "Building {} ({} classes, input {:?})",
            self.architecture,
            self.num_classes,
            self.input_shape()
        );

        match self.architecture {
            Architecture::Vgg => self.to_vgg().init(device).map(ZooModel::Vgg),
            Architecture::Xception => self.to_xception().init(device).map(ZooModel::Xception),
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OutputShape;
    use burn_ndarray::NdArray;
    use tempfile::tempdir;

    type TestBackend = NdArray;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.architecture, Architecture::Vgg);
        assert_eq!(config.n_layers, 16);
        assert_eq!(config.input_shape(), [224, 224, 3]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_xception_default_input() {
        let config = ModelConfig::xception();
        assert_eq!(config.input_shape(), [229, 229, 3]);
        assert_eq!(config.to_xception().input_shape, [229, 229, 3]);
    }

    #[test]
    fn test_validation() {
        assert!(ModelConfig::vgg(18).validate().is_err());
        assert!(ModelConfig::vgg(19).validate().is_ok());
        assert!(ModelConfig::vgg(16).with_num_classes(0).validate().is_err());
        assert!(ModelConfig::vgg(16)
            .with_input_shape([224, 0, 3])
            .validate()
            .is_err());

        // The layer-count selector is meaningless for Xception
        let mut config = ModelConfig::xception();
        config.n_layers = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_summary_dispatch() {
        let vgg = ModelConfig::vgg(16).summary().unwrap();
        assert_eq!(vgg.name, "VGG16");
        assert_eq!(vgg.output(), OutputShape::Flat(1000));

        let xception = ModelConfig::xception().with_num_classes(10).summary().unwrap();
        assert_eq!(xception.name, "Xception");
        assert_eq!(xception.output(), OutputShape::Flat(10));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("configs").join("xception.json");

        let config = ModelConfig::xception()
            .with_input_shape([128, 128, 3])
            .with_num_classes(38);
        config.save(&path).unwrap();

        let loaded = ModelConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_input_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vgg.json");
        std::fs::write(
            &path,
            r#"{ "architecture": "vgg", "n_layers": 19, "num_classes": 5 }"#,
        )
        .unwrap();

        let loaded = ModelConfig::load(&path).unwrap();
        assert_eq!(loaded.input_shape, None);
        assert_eq!(loaded.input_shape(), [224, 224, 3]);
        assert_eq!(loaded.n_layers, 19);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ModelConfig::load(&dir.path().join("missing.json")),
            Err(ZooError::Io(_))
        ));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ModelConfig::load(&path),
            Err(ZooError::Serialization(_))
        ));
    }

    #[test]
    fn test_init_dispatch() {
        let device = Default::default();
        let config = ModelConfig::xception()
            .with_input_shape([32, 32, 3])
            .with_num_classes(4);
        let model = config.init::<TestBackend>(&device).unwrap();

        assert_eq!(model.architecture(), Architecture::Xception);
        assert_eq!(model.num_classes(), 4);
    }

    #[test]
    fn test_init_rejects_bad_selector() {
        let device = Default::default();
        let result = ModelConfig::vgg(11).init::<TestBackend>(&device);
        assert!(matches!(result, Err(ZooError::InvalidConfig(_))));
    }
}
