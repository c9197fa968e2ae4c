//! Lock-step top of the convolution core.
//!
//! One [`ConvEngine::tick`] is one clock. Inside a tick the stages are
//! evaluated back to front: the MAC consumes what was fetched last cycle,
//! then the sequencer issues this cycle's bank reads, then the bank ports are
//! released. This keeps every pipeline register a true register.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bank::{BankError, BankOwner, BankSet, PORTS_PER_BANK};
use super::fixed::Q24;
use super::mac::{MacPipeline, Operands};
use super::mapper::AddressMapper;
use super::regs::{ConfigError, ConfigRegisters, StartCommand};
use super::resolver::{CollisionResolver, ResolverStats};
use super::shape::{FilterShape, LANES};
use super::window::WindowController;
use super::writer::ResultWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
  Idle,
  Scanning,
  Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
  #[error("invalid configuration: {0}")]
  Config(#[from] ConfigError),
  #[error("bank access failed: {0}")]
  Bank(#[from] BankError),
  #[error("start rejected: engine is scanning")]
  Busy,
  #[error("no completion within {cycles} cycles")]
  Timeout { cycles: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
  /// Clocks spent scanning, prefetch included.
  pub cycles: u64,
  pub prefetch_cycles: u64,
  /// Cycles that issued input-bank reads.
  pub beats: u64,
  pub results: u32,
  pub resolver: ResolverStats,
}

#[derive(Debug, Clone)]
pub struct ConvEngine {
  state: EngineState,
  regs: Option<ConfigRegisters>,
  window: WindowController,
  mapper: AddressMapper,
  resolver: CollisionResolver,
  mac: MacPipeline,
  writer: ResultWriter,

  // coefficient register file, filled during prefetch
  coeffs: Vec<Q24>,
  prefetched: usize,

  // bank read -> MAC register
  fetched: Option<Operands>,

  batch: usize,
  window_index: u32,
  completed: bool,

  cycles: u64,
  prefetch_cycles: u64,
  beats: u64,
}

impl Default for ConvEngine {
  fn default() -> Self {
    Self::new()
  }
}

impl ConvEngine {
  pub fn new() -> Self {
    Self {
      state: EngineState::Idle,
      regs: None,
      window: WindowController::new(),
      mapper: AddressMapper::new(Default::default(), 0),
      resolver: CollisionResolver::new(),
      mac: MacPipeline::new(),
      writer: ResultWriter::new(),
      coeffs: Vec::new(),
      prefetched: 0,
      fetched: None,
      batch: 0,
      window_index: 0,
      completed: false,
      cycles: 0,
      prefetch_cycles: 0,
      beats: 0,
    }
  }

  pub fn state(&self) -> EngineState {
    self.state
  }

  /// Completion indicator. Stays asserted after the engine returns to idle,
  /// until the next `start` or reset.
  pub fn completed(&self) -> bool {
    self.completed
  }

  pub fn config(&self) -> Option<&ConfigRegisters> {
    self.regs.as_ref()
  }

  pub fn stats(&self) -> EngineStats {
    EngineStats {
      cycles: self.cycles,
      prefetch_cycles: self.prefetch_cycles,
      beats: self.beats,
      results: self.writer.written(),
      resolver: self.resolver.stats(),
    }
  }

  /// Latches `cmd` and begins scanning. The banks are switched to the engine.
  ///
  /// An invalid command is rejected without disturbing the engine.
  pub fn start(&mut self, cmd: &StartCommand, banks: &mut BankSet) -> Result<(), EngineError> {
    if self.state == EngineState::Scanning {
      return Err(EngineError::Busy);
    }
    let regs = ConfigRegisters::latch(cmd)?;

    *self = Self::new();
    self.window.configure(regs.stride, regs.bound);
    self.mapper = AddressMapper::new(banks.layout(), regs.image_size);
    self.mac.configure(regs.shape.batch_cycle());
    self.writer.configure(regs.output_count);
    self.coeffs = vec![Q24::ZERO; regs.shape.tap_count()];
    self.regs = Some(regs);
    self.state = EngineState::Scanning;
    banks.switch_to(BankOwner::Engine);

    log::info!(
      "start: {} filter, stride {}, {}x{} image, {} windows, {} layout",
      regs.shape,
      regs.stride,
      regs.image_size,
      regs.image_size,
      regs.output_count,
      banks.layout()
    );
    Ok(())
  }

  /// Aborts everything in flight. Partial results already in the result bank
  /// are left there but are not meaningful.
  pub fn reset(&mut self, banks: &mut BankSet) {
    if self.state == EngineState::Scanning {
      log::warn!(
        "reset while scanning: {} of {} results discarded",
        self.writer.written(),
        self.regs.map_or(0, |r| r.output_count)
      );
    }
    *self = Self::new();
    banks.switch_to(BankOwner::Host);
  }

  /// Advances one clock.
  pub fn tick(&mut self, banks: &mut BankSet) -> Result<(), EngineError> {
    let regs = match self.state {
      EngineState::Idle => return Ok(()),
      EngineState::Completed => {
        self.state = EngineState::Idle;
        return Ok(());
      },
      EngineState::Scanning => match self.regs {
        Some(regs) => regs,
        None => return Ok(()),
      },
    };
    self.cycles += 1;

    if let Some(result) = self.mac.step(self.fetched.take()) {
      debug_assert_eq!(result.window, self.writer.written(), "result out of scan order");
      if self.writer.write(banks, result.value)? {
        self.finish(banks);
      }
    }

    if self.state == EngineState::Scanning {
      if self.prefetched < self.coeffs.len() {
        self.prefetch(banks)?;
      } else if self.resolver.is_draining() || self.window_index < regs.output_count {
        self.issue(banks, regs.shape)?;
      }
    }

    banks.end_cycle();
    Ok(())
  }

  /// Ticks until the engine leaves `Scanning`.
  pub fn run_to_completion(&mut self, banks: &mut BankSet, max_cycles: u64) -> Result<EngineStats, EngineError> {
    while self.state == EngineState::Scanning {
      if self.cycles >= max_cycles {
        return Err(EngineError::Timeout { cycles: self.cycles });
      }
      self.tick(banks)?;
    }
    Ok(self.stats())
  }

  fn prefetch(&mut self, banks: &mut BankSet) -> Result<(), BankError> {
    for port in 0..PORTS_PER_BANK {
      let tap = self.prefetched;
      if tap == self.coeffs.len() {
        break;
      }
      self.coeffs[tap] = banks.read_filter(port, tap)?;
      self.prefetched += 1;
    }
    self.prefetch_cycles += 1;

    if self.prefetched == self.coeffs.len() {
      log::debug!("{} coefficients prefetched in {} cycles", self.prefetched, self.prefetch_cycles);
    }
    Ok(())
  }

  fn issue(&mut self, banks: &mut BankSet, shape: FilterShape) -> Result<(), BankError> {
    let beat = match self.resolver.drain() {
      Some(beat) => beat,
      None => {
        let batch = self
          .mapper
          .batch(self.window_index, self.window.origin(), shape, self.batch);
        self.resolver.accept(&batch)
      },
    };

    let mut lanes = [None; LANES];
    for grant in &beat.grants {
      let req = grant.request;
      let sample = banks.read_input(req.bank, grant.port, req.addr)?;
      lanes[req.lane()] = Some((sample, self.coeffs[req.tap]));
    }

    // The sequencer only moves once the whole batch has been read.
    if beat.tag.last_of_batch {
      if shape.is_last_batch(self.batch) {
        self.batch = 0;
        self.window_index += 1;
        self.window.advance();
      } else {
        self.batch += 1;
      }
    }

    self.fetched = Some(Operands { tag: beat.tag, lanes });
    self.beats += 1;
    Ok(())
  }

  fn finish(&mut self, banks: &mut BankSet) {
    self.state = EngineState::Completed;
    self.completed = true;
    banks.switch_to(BankOwner::Host);

    let stats = self.resolver.stats();
    log::info!(
      "completed: {} results in {} cycles ({} colliding batches, {} stall cycles)",
      self.writer.written(),
      self.cycles,
      stats.collisions,
      stats.stall_cycles
    );
  }
}
