use serde::{Deserialize, Serialize};
use std::fmt;

use super::regs::ConfigError;

/// Width of the multiply-accumulate datapath; one batch is this many taps.
pub const LANES: usize = 8;

/// Per-shape constants as held by the configuration block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeParams {
  /// Side length of the square filter.
  pub dim: u8,
  /// Tap-count register value. For 6x6 and 8x8 this is the last tap index
  /// rather than the tap count; the engine derives its tap count from `dim`.
  pub element_count: u8,
  /// Tap index at which the last (possibly padded) batch starts.
  pub batch_boundary: u8,
  /// Terminal value of the accumulation batch counter.
  pub batch_cycle: u8,
}

const SHAPE_TABLE: [ShapeParams; 6] = [
  ShapeParams { dim: 3, element_count: 9, batch_boundary: 8, batch_cycle: 1 },
  ShapeParams { dim: 4, element_count: 16, batch_boundary: 8, batch_cycle: 1 },
  ShapeParams { dim: 5, element_count: 25, batch_boundary: 24, batch_cycle: 3 },
  ShapeParams { dim: 6, element_count: 35, batch_boundary: 32, batch_cycle: 4 },
  ShapeParams { dim: 7, element_count: 49, batch_boundary: 48, batch_cycle: 6 },
  ShapeParams { dim: 8, element_count: 63, batch_boundary: 56, batch_cycle: 7 },
];

/// The six supported square filter shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FilterShape {
  K3,
  K4,
  K5,
  K6,
  K7,
  K8,
}

impl FilterShape {
  pub const ALL: [FilterShape; 6] = [
    FilterShape::K3,
    FilterShape::K4,
    FilterShape::K5,
    FilterShape::K6,
    FilterShape::K7,
    FilterShape::K8,
  ];

  pub fn from_dim(dim: u8) -> Result<Self, ConfigError> {
    match dim {
      3 => Ok(FilterShape::K3),
      4 => Ok(FilterShape::K4),
      5 => Ok(FilterShape::K5),
      6 => Ok(FilterShape::K6),
      7 => Ok(FilterShape::K7),
      8 => Ok(FilterShape::K8),
      other => Err(ConfigError::UnsupportedFilterSize(other)),
    }
  }

  pub fn params(self) -> &'static ShapeParams {
    &SHAPE_TABLE[self as usize]
  }

  pub fn dim(self) -> usize {
    self.params().dim as usize
  }

  pub fn tap_count(self) -> usize {
    self.dim() * self.dim()
  }

  pub fn batch_cycle(self) -> usize {
    self.params().batch_cycle as usize
  }

  /// Batches needed to cover every tap: the counter runs `0..=batch_cycle`.
  pub fn batches_per_window(self) -> usize {
    self.batch_cycle() + 1
  }

  /// Whether `batch` is the final, possibly padded, batch of a window.
  pub fn is_last_batch(self, batch: usize) -> bool {
    batch * LANES == self.params().batch_boundary as usize
  }
}

impl TryFrom<u8> for FilterShape {
  type Error = ConfigError;

  fn try_from(dim: u8) -> Result<Self, Self::Error> {
    FilterShape::from_dim(dim)
  }
}

impl From<FilterShape> for u8 {
  fn from(shape: FilterShape) -> u8 {
    shape.params().dim
  }
}

impl fmt::Display for FilterShape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let dim = self.dim();
    write!(f, "{}x{}", dim, dim)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn table_matches_configuration_block() {
    let rows: Vec<(u8, u8, u8, u8)> = FilterShape::ALL
      .iter()
      .map(|s| {
        let p = s.params();
        (p.dim, p.element_count, p.batch_boundary, p.batch_cycle)
      })
      .collect();
    assert_eq!(
      rows,
      vec![
        (3, 9, 8, 1),
        (4, 16, 8, 1),
        (5, 25, 24, 3),
        (6, 35, 32, 4),
        (7, 49, 48, 6),
        (8, 63, 56, 7),
      ]
    );
  }

  #[test]
  fn batches_cover_every_tap() {
    for shape in FilterShape::ALL {
      let batches = shape.batches_per_window();
      assert!(batches * LANES >= shape.tap_count(), "{}", shape);
      assert!((batches - 1) * LANES < shape.tap_count(), "{}", shape);
      assert!(shape.is_last_batch(batches - 1));
      assert!(!shape.is_last_batch(0) || batches == 1);
    }
  }

  #[test]
  fn rejects_unknown_sizes() {
    assert!(matches!(FilterShape::from_dim(2), Err(ConfigError::UnsupportedFilterSize(2))));
    assert!(matches!(FilterShape::from_dim(9), Err(ConfigError::UnsupportedFilterSize(9))));
    assert_eq!(FilterShape::from_dim(5).unwrap(), FilterShape::K5);
  }

  #[test]
  fn serde_uses_side_length() {
    let json = serde_json::to_string(&FilterShape::K7).unwrap();
    assert_eq!(json, "7");
    let shape: FilterShape = serde_json::from_str("4").unwrap();
    assert_eq!(shape, FilterShape::K4);
    assert!(serde_json::from_str::<FilterShape>("10").is_err());
  }
}
