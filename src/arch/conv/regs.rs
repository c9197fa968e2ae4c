use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bank::MAX_IMAGE_SIZE;
use super::shape::FilterShape;

pub const MAX_STRIDE: u8 = 7;

/// Configuration rejected at `start`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
  #[error("unsupported filter size {0} (expected 3..=8)")]
  UnsupportedFilterSize(u8),
  #[error("stride {0} out of range (expected 1..=7)")]
  StrideOutOfRange(u8),
  #[error("image size {image_size} is smaller than the {dim}x{dim} filter")]
  ImageTooSmall { image_size: u16, dim: usize },
  #[error("image size {0} exceeds the 256-sample row limit of the input banks")]
  ImageTooLarge(u16),
  #[error("output count {configured} does not match the {expected} valid windows")]
  OutputCountMismatch { configured: u32, expected: u32 },
}

/// Raw `start` command as presented on the command port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCommand {
  pub filter_size: u8,
  pub stride: u8,
  pub image_size: u16,
  pub output_count: u32,
}

impl StartCommand {
  /// Builds a command whose output count is derived from the geometry.
  pub fn for_geometry(shape: FilterShape, stride: u8, image_size: u16) -> Result<Self, ConfigError> {
    let output_count = window_count(shape, stride, image_size)?;
    Ok(Self {
      filter_size: shape.into(),
      stride,
      image_size,
      output_count,
    })
  }
}

/// Number of valid windows: `floor((image_size - dim) / stride + 1)^2`.
pub fn window_count(shape: FilterShape, stride: u8, image_size: u16) -> Result<u32, ConfigError> {
  if stride == 0 || stride > MAX_STRIDE {
    return Err(ConfigError::StrideOutOfRange(stride));
  }
  if image_size as usize > MAX_IMAGE_SIZE {
    return Err(ConfigError::ImageTooLarge(image_size));
  }
  let dim = shape.dim();
  if (image_size as usize) < dim {
    return Err(ConfigError::ImageTooSmall { image_size, dim });
  }
  let per_axis = (image_size as u32 - dim as u32) / stride as u32 + 1;
  Ok(per_axis * per_axis)
}

/// Latched configuration and the constants derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRegisters {
  pub shape: FilterShape,
  pub stride: usize,
  pub image_size: usize,
  /// Largest valid window x (and y) origin: `image_size - dim`.
  pub bound: usize,
  pub output_count: u32,
}

impl ConfigRegisters {
  pub fn latch(cmd: &StartCommand) -> Result<Self, ConfigError> {
    let shape = FilterShape::from_dim(cmd.filter_size)?;
    let expected = window_count(shape, cmd.stride, cmd.image_size)?;
    if cmd.output_count != expected {
      return Err(ConfigError::OutputCountMismatch {
        configured: cmd.output_count,
        expected,
      });
    }

    Ok(Self {
      shape,
      stride: cmd.stride as usize,
      image_size: cmd.image_size as usize,
      bound: cmd.image_size as usize - shape.dim(),
      output_count: cmd.output_count,
    })
  }

  pub fn windows_per_row(&self) -> usize {
    self.bound / self.stride + 1
  }
}
