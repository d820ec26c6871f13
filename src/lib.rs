//! # CNN Zoo
//!
//! Composable builders for classic image-classification CNNs on the Burn
//! framework.
//!
//! ## Features
//!
//! - **VGG16 / VGG19** from a single layer-count selector
//! - **Xception** with configurable entry and middle flow widths
//! - **Static shape inference**: every architecture can be summarized layer by
//!   layer without allocating weights, and residual merges are shape-checked
//!   before construction
//! - **Serializable configs** for the command-line tool
//!
//! ## Modules
//!
//! - `model`: architectures, shared blocks, shape inference and summaries
//! - `inference`: forward-pass latency benchmarking
//! - `backend`: default backend selection
//! - `utils`: errors, logging and formatting helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cnn_zoo::model::{VggConfig, XceptionConfig};
//!
//! let device = Default::default();
//! let vgg = VggConfig::new(16).with_num_classes(10).init::<MyBackend>(&device)?;
//! println!("{}", XceptionConfig::new().summary()?);
//! ```

pub mod backend;
pub mod inference;
pub mod model;
pub mod utils;

// Re-export commonly used items for convenience
pub use inference::benchmark::{BenchmarkConfig, BenchmarkResult};
pub use model::config::ModelConfig;
pub use model::summary::ModelSummary;
pub use model::vgg::{Vgg, VggConfig, VggDepth};
pub use model::xception::{Xception, XceptionConfig};
pub use model::{Architecture, ZooModel};
pub use utils::error::{Result, ZooError};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
