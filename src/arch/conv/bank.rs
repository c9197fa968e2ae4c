use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::fixed::Q24;

pub const INPUT_BANKS: usize = 4;
pub const PORTS_PER_BANK: usize = 2;
/// 14-bit input bank address space.
pub const INPUT_BANK_DEPTH: usize = 1 << 14;
/// 6-bit filter bank address space.
pub const FILTER_BANK_DEPTH: usize = 64;
/// 16-bit result bank address space.
pub const RESULT_BANK_DEPTH: usize = 1 << 16;
/// Widest (and tallest) image the four input banks can hold.
pub const MAX_IMAGE_SIZE: usize = 256;

/// How image samples are distributed over the four input banks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankLayout {
  /// Column pairs interleaved across banks, row-major over the whole image:
  /// columns 0-1 in bank 0, 2-3 in bank 1, 4-5 in bank 2, 6-7 in bank 3,
  /// 8-9 back in bank 0, and so on.
  #[default]
  ColumnPair,
  /// Whole rows round-robin over the banks (row r in bank r mod 4).
  RowInterleaved,
}

/// Physical home of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
  pub bank: usize,
  pub addr: usize,
}

impl BankLayout {
  pub fn locate(self, row: usize, col: usize, width: usize) -> Location {
    match self {
      BankLayout::ColumnPair => {
        let index = row * width + col;
        Location {
          bank: (index % 8) / 2,
          addr: (index / 8) * 2 + index % 2,
        }
      },
      BankLayout::RowInterleaved => Location {
        bank: row % INPUT_BANKS,
        addr: (row / INPUT_BANKS) * width + col,
      },
    }
  }
}

impl fmt::Display for BankLayout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BankLayout::ColumnPair => write!(f, "column_pair"),
      BankLayout::RowInterleaved => write!(f, "row_interleaved"),
    }
  }
}

impl FromStr for BankLayout {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().replace('-', "_").as_str() {
      "column_pair" => Ok(BankLayout::ColumnPair),
      "row_interleaved" => Ok(BankLayout::RowInterleaved),
      other => Err(format!("unknown bank layout '{}' (expected column_pair or row_interleaved)", other)),
    }
  }
}

/// Position of the bank switch: who may touch the banks this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankOwner {
  Host,
  Engine,
}

/// Host-writable bank selector used by the loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankTarget {
  Input(u8),
  Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankId {
  Input(usize),
  Filter,
  Result,
}

impl fmt::Display for BankId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BankId::Input(i) => write!(f, "input bank {}", i),
      BankId::Filter => write!(f, "filter bank"),
      BankId::Result => write!(f, "result bank"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
  #[error("{requester:?} accessed the banks while the switch grants {owner:?}")]
  NotOwner { owner: BankOwner, requester: BankOwner },
  #[error("{bank} port {port} driven twice in one cycle")]
  PortBusy { bank: BankId, port: usize },
  #[error("{bank} has no port {port}")]
  NoSuchPort { bank: BankId, port: usize },
  #[error("address {addr} out of range for {bank}")]
  AddressOutOfRange { bank: BankId, addr: usize },
  #[error("no input bank {0}")]
  NoSuchBank(usize),
}

#[derive(Debug, Clone)]
struct Ram {
  id: BankId,
  data: Vec<Q24>,
  driven: Vec<bool>,
}

impl Ram {
  fn new(id: BankId, depth: usize, ports: usize) -> Self {
    Self {
      id,
      data: vec![Q24::ZERO; depth],
      driven: vec![false; ports],
    }
  }

  fn claim(&mut self, port: usize) -> Result<(), BankError> {
    match self.driven.get_mut(port) {
      None => Err(BankError::NoSuchPort { bank: self.id, port }),
      Some(true) => Err(BankError::PortBusy { bank: self.id, port }),
      Some(driven) => {
        *driven = true;
        Ok(())
      },
    }
  }

  fn check(&self, addr: usize) -> Result<(), BankError> {
    if addr < self.data.len() {
      Ok(())
    } else {
      Err(BankError::AddressOutOfRange { bank: self.id, addr })
    }
  }

  fn read_port(&mut self, port: usize, addr: usize) -> Result<Q24, BankError> {
    self.check(addr)?;
    self.claim(port)?;
    Ok(self.data[addr])
  }

  fn write_port(&mut self, port: usize, addr: usize, value: Q24) -> Result<(), BankError> {
    self.check(addr)?;
    self.claim(port)?;
    self.data[addr] = value;
    Ok(())
  }

  fn store(&mut self, start_addr: usize, values: &[Q24]) -> Result<(), BankError> {
    let end = start_addr + values.len();
    if end > self.data.len() {
      return Err(BankError::AddressOutOfRange {
        bank: self.id,
        addr: end - 1,
      });
    }
    self.data[start_addr..end].copy_from_slice(values);
    Ok(())
  }

  fn load(&self, start_addr: usize, count: usize) -> Result<Vec<Q24>, BankError> {
    let end = start_addr + count;
    if end > self.data.len() {
      return Err(BankError::AddressOutOfRange {
        bank: self.id,
        addr: end.saturating_sub(1),
      });
    }
    Ok(self.data[start_addr..end].to_vec())
  }

  fn release_ports(&mut self) {
    self.driven.iter_mut().for_each(|d| *d = false);
  }
}

/// All storage the engine touches: four dual-port input banks, a dual-port
/// filter bank and a single-port result bank, behind one switch.
///
/// Engine-side accesses go through numbered ports and each port accepts one
/// address per cycle until [`BankSet::end_cycle`]. Host-side accesses are bulk
/// transfers and are only accepted while the switch grants the host.
#[derive(Debug, Clone)]
pub struct BankSet {
  layout: BankLayout,
  owner: BankOwner,
  inputs: Vec<Ram>,
  filter: Ram,
  results: Ram,
}

impl BankSet {
  pub fn new(layout: BankLayout) -> Self {
    Self {
      layout,
      owner: BankOwner::Host,
      inputs: (0..INPUT_BANKS)
        .map(|i| Ram::new(BankId::Input(i), INPUT_BANK_DEPTH, PORTS_PER_BANK))
        .collect(),
      filter: Ram::new(BankId::Filter, FILTER_BANK_DEPTH, PORTS_PER_BANK),
      results: Ram::new(BankId::Result, RESULT_BANK_DEPTH, 1),
    }
  }

  pub fn layout(&self) -> BankLayout {
    self.layout
  }

  pub fn owner(&self) -> BankOwner {
    self.owner
  }

  pub fn switch_to(&mut self, owner: BankOwner) {
    if self.owner != owner {
      log::debug!("bank switch: {:?} -> {:?}", self.owner, owner);
    }
    self.owner = owner;
    self.end_cycle();
  }

  fn require(&self, requester: BankOwner) -> Result<(), BankError> {
    if self.owner == requester {
      Ok(())
    } else {
      Err(BankError::NotOwner {
        owner: self.owner,
        requester,
      })
    }
  }

  fn input_mut(&mut self, bank: usize) -> Result<&mut Ram, BankError> {
    self.inputs.get_mut(bank).ok_or(BankError::NoSuchBank(bank))
  }

  // --- host side ---

  pub fn write(&mut self, target: BankTarget, start_addr: usize, data: &[Q24]) -> Result<(), BankError> {
    self.require(BankOwner::Host)?;
    match target {
      BankTarget::Input(bank) => self.input_mut(bank as usize)?.store(start_addr, data),
      BankTarget::Filter => self.filter.store(start_addr, data),
    }
  }

  pub fn read_results(&self, start_addr: usize, count: usize) -> Result<Vec<Q24>, BankError> {
    self.require(BankOwner::Host)?;
    self.results.load(start_addr, count)
  }

  // --- engine side ---

  pub fn read_input(&mut self, bank: usize, port: usize, addr: usize) -> Result<Q24, BankError> {
    self.require(BankOwner::Engine)?;
    self.input_mut(bank)?.read_port(port, addr)
  }

  pub fn read_filter(&mut self, port: usize, addr: usize) -> Result<Q24, BankError> {
    self.require(BankOwner::Engine)?;
    self.filter.read_port(port, addr)
  }

  pub fn write_result(&mut self, addr: usize, value: Q24) -> Result<(), BankError> {
    self.require(BankOwner::Engine)?;
    self.results.write_port(0, addr, value)
  }

  /// Releases every port at the clock edge.
  pub fn end_cycle(&mut self) {
    self.inputs.iter_mut().for_each(Ram::release_ports);
    self.filter.release_ports();
    self.results.release_ports();
  }
}
