//! Static shape inference
//!
//! Every builder threads a [`FeatureShape`] through its layers before any
//! weights are allocated. This sizes the flatten layer of the VGG classifier,
//! rejects inputs that collapse to nothing, and checks that both branches of a
//! residual block agree before they are summed.

use serde::{Deserialize, Serialize};

use crate::utils::{Result, ZooError};

/// Per-sample shape of a 4-D activation `[batch, channels, height, width]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl FeatureShape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Build from a `(height, width, channels)` input shape
    pub fn from_hwc(shape: [usize; 3]) -> Result<Self> {
        let [height, width, channels] = shape;
        if height == 0 || width == 0 || channels == 0 {
            return Err(ZooError::InvalidConfig(format!(
                "input shape {:?} has a zero dimension",
                shape
            )));
        }
        Ok(Self::new(channels, height, width))
    }

    /// Number of values per sample
    pub fn features(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn with_channels(self, channels: usize) -> Self {
        Self { channels, ..self }
    }

    /// Shape after a square convolution or pooling window
    pub fn window(
        self,
        channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        let height = window_output(self.height, kernel, stride, padding);
        let width = window_output(self.width, kernel, stride, padding);

        match (height, width) {
            (Some(height), Some(width)) => Ok(Self::new(channels, height, width)),
            _ => Err(ZooError::InvalidShape(format!(
                "{}x{} window (stride {}, padding {}) does not fit a {}x{} feature map",
                kernel, kernel, stride, padding, self.height, self.width
            ))),
        }
    }
}

impl std::fmt::Display for FeatureShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(None, {}, {}, {})",
            self.channels, self.height, self.width
        )
    }
}

/// Output shape of a layer in a [`ModelSummary`](super::summary::ModelSummary)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputShape {
    Spatial(FeatureShape),
    Flat(usize),
}

impl From<FeatureShape> for OutputShape {
    fn from(shape: FeatureShape) -> Self {
        OutputShape::Spatial(shape)
    }
}

impl std::fmt::Display for OutputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputShape::Spatial(shape) => write!(f, "{}", shape),
            OutputShape::Flat(n) => write!(f, "(None, {})", n),
        }
    }
}

/// Padding that keeps the spatial size of a stride-1 window
pub fn same_padding(kernel: usize) -> usize {
    (kernel - 1) / 2
}

/// Output length of a sliding window, or `None` if the window does not fit
pub fn window_output(size: usize, kernel: usize, stride: usize, padding: usize) -> Option<usize> {
    let padded = size + 2 * padding;
    if stride == 0 || padded < kernel {
        return None;
    }
    Some((padded - kernel) / stride + 1)
}
