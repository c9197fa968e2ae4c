//! Job descriptions: an image, a filter and a stride, as read from a TOML file
//! or generated synthetically.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::arch::conv::loader::{self, BankWrite};
use crate::arch::conv::reference;
use crate::arch::conv::regs::ConfigRegisters;
use crate::arch::conv::{BankLayout, ConfigError, FilterShape, Q24, StartCommand};

#[derive(Debug, Error)]
pub enum JobError {
  #[error("cannot read job file {path:?}: {source}")]
  Io { path: PathBuf, source: io::Error },
  #[error("malformed job file: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("{what} is not square: row {row} has {len} values, expected {expected}")]
  NotSquare {
    what: &'static str,
    row: usize,
    len: usize,
    expected: usize,
  },
  #[error("filter has {rows} rows but filter_size is {filter_size}")]
  FilterSizeMismatch { rows: usize, filter_size: u8 },
  #[error("{what} value {value} at ({row}, {col}) is outside the sample range [-128, 128)")]
  SampleOutOfRange {
    what: &'static str,
    row: usize,
    col: usize,
    value: f64,
  },
  #[error(transparent)]
  Config(#[from] ConfigError),
}

/// A convolution job as written in a job file.
///
/// ```toml
/// filter_size = 3
/// stride = 1
/// layout = "column_pair"   # optional
/// image = [[0.0, 0.5, 1.0, 1.5], ...]
/// filter = [[1.0, 0.0, -1.0], ...]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
  pub filter_size: u8,
  pub stride: u8,
  pub image: Vec<Vec<f64>>,
  pub filter: Vec<Vec<f64>>,
  #[serde(default)]
  pub layout: Option<BankLayout>,
}

/// A validated job: samples converted and the start command derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedJob {
  pub command: StartCommand,
  pub image: Vec<Q24>,
  pub coeffs: Vec<Q24>,
  pub layout: Option<BankLayout>,
}

impl Job {
  pub fn from_file(path: &Path) -> Result<Self, JobError> {
    let content = fs::read_to_string(path).map_err(|source| JobError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_toml_str(&content)
  }

  pub fn from_toml_str(content: &str) -> Result<Self, JobError> {
    Ok(toml::from_str(content)?)
  }

  /// Deterministic test pattern of the given geometry. Values stay small so
  /// sums do not wrap.
  pub fn synthetic(image_size: u16, filter_size: u8, stride: u8) -> Self {
    let n = image_size as usize;
    let k = filter_size as usize;
    let image = (0..n)
      .map(|r| (0..n).map(|c| ((r * 7 + c * 3) % 16) as f64 / 8.0 - 1.0).collect())
      .collect();
    let filter = (0..k)
      .map(|i| (0..k).map(|j| ((i * 5 + j) % 9) as f64 / 16.0 - 0.25).collect())
      .collect();
    Self {
      filter_size,
      stride,
      image,
      filter,
      layout: None,
    }
  }

  pub fn prepare(&self) -> Result<PreparedJob, JobError> {
    let shape = FilterShape::from_dim(self.filter_size)?;
    if self.filter.len() != shape.dim() {
      return Err(JobError::FilterSizeMismatch {
        rows: self.filter.len(),
        filter_size: self.filter_size,
      });
    }
    let coeffs = flatten("filter", &self.filter)?;
    let image = flatten("image", &self.image)?;

    let size = u16::try_from(self.image.len()).map_err(|_| ConfigError::ImageTooLarge(u16::MAX))?;
    let command = StartCommand::for_geometry(shape, self.stride, size)?;

    Ok(PreparedJob {
      command,
      image,
      coeffs,
      layout: self.layout,
    })
  }
}

impl PreparedJob {
  pub fn image_size(&self) -> usize {
    self.command.image_size as usize
  }

  /// Host writes that load this job's image and filter in `layout`.
  pub fn bank_writes(&self, layout: BankLayout) -> Vec<BankWrite> {
    let mut writes = loader::image_writes(&self.image, self.image_size(), layout);
    writes.extend(loader::filter_writes(&self.coeffs));
    writes
  }

  /// Software convolution of the same job, for checking.
  pub fn reference(&self) -> Result<Vec<Q24>, ConfigError> {
    let regs = ConfigRegisters::latch(&self.command)?;
    Ok(reference::convolve(&self.image, &self.coeffs, &regs))
  }
}

fn flatten(what: &'static str, rows: &[Vec<f64>]) -> Result<Vec<Q24>, JobError> {
  let expected = rows.len();
  let mut out = Vec::with_capacity(expected * expected);
  for (row, values) in rows.iter().enumerate() {
    if values.len() != expected {
      return Err(JobError::NotSquare {
        what,
        row,
        len: values.len(),
        expected,
      });
    }
    for (col, &value) in values.iter().enumerate() {
      if !(-128.0..128.0).contains(&value) {
        return Err(JobError::SampleOutOfRange { what, row, col, value });
      }
      out.push(Q24::from_f64(value));
    }
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  const JOB: &str = r#"
filter_size = 3
stride = 1
layout = "row_interleaved"
image = [
  [1.0, 2.0, 3.0, 4.0],
  [5.0, 6.0, 7.0, 8.0],
  [9.0, 10.0, 11.0, 12.0],
  [13.0, 14.0, 15.0, 16.0],
]
filter = [
  [0.0, 0.0, 0.0],
  [0.0, 1.0, 0.0],
  [0.0, 0.0, 0.0],
]
"#;

  #[test]
  fn parses_and_prepares_a_job_file() {
    let job = Job::from_toml_str(JOB).unwrap();
    assert_eq!(job.layout, Some(BankLayout::RowInterleaved));

    let prepared = job.prepare().unwrap();
    assert_eq!(
      prepared.command,
      StartCommand {
        filter_size: 3,
        stride: 1,
        image_size: 4,
        output_count: 4
      }
    );
    // Identity filter picks the window centre.
    let expected: Vec<Q24> = [6, 7, 10, 11].iter().map(|&v| Q24::from_int(v)).collect();
    assert_eq!(prepared.reference().unwrap(), expected);
  }

  #[test]
  fn layout_is_optional() {
    let text = JOB.replace("layout = \"row_interleaved\"\n", "");
    assert_eq!(Job::from_toml_str(&text).unwrap().layout, None);
  }

  #[test]
  fn rejects_ragged_and_mismatched_shapes() {
    let mut job = Job::synthetic(6, 3, 1);
    job.image[2].pop();
    assert!(matches!(job.prepare(), Err(JobError::NotSquare { what: "image", row: 2, .. })));

    let mut job = Job::synthetic(6, 3, 1);
    job.filter_size = 4;
    assert!(matches!(job.prepare(), Err(JobError::FilterSizeMismatch { rows: 3, filter_size: 4 })));
  }

  #[test]
  fn rejects_bad_geometry_and_values() {
    let job = Job::synthetic(6, 3, 0);
    assert!(matches!(job.prepare(), Err(JobError::Config(ConfigError::StrideOutOfRange(0)))));

    let job = Job::synthetic(2, 3, 1);
    assert!(matches!(job.prepare(), Err(JobError::Config(ConfigError::ImageTooSmall { .. }))));

    let mut job = Job::synthetic(6, 3, 1);
    job.filter[1][1] = 200.0;
    assert!(matches!(job.prepare(), Err(JobError::SampleOutOfRange { what: "filter", row: 1, col: 1, .. })));
  }

  #[test]
  fn synthetic_jobs_cover_every_shape() {
    for shape in FilterShape::ALL {
      let prepared = Job::synthetic(20, shape.dim() as u8, 2).prepare().unwrap();
      assert_eq!(prepared.coeffs.len(), shape.tap_count());
      assert_eq!(prepared.image.len(), 400);
    }
  }

  #[test]
  fn missing_file_reports_the_path() {
    let err = Job::from_file(Path::new("/nonexistent/job.toml")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/job.toml"));
  }
}
