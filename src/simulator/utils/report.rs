use serde::{Deserialize, Serialize};
use sim::models::{Model, Reportable};
use sim::simulator::Simulation;
use std::fmt;

use crate::arch::conv::{BankLayout, EngineStats, Q24, StartCommand};

/// Outcome of one job run through the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
  pub command: StartCommand,
  pub layout: BankLayout,
  pub results: Vec<Q24>,
  pub stats: EngineStats,
  /// Simulation time from job injection to the last result read back.
  pub sim_time: f64,
}

impl fmt::Display for RunReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let cmd = &self.command;
    let stats = &self.stats;
    writeln!(
      f,
      "{}x{} filter, stride {}, {}x{} image, {} layout",
      cmd.filter_size, cmd.filter_size, cmd.stride, cmd.image_size, cmd.image_size, self.layout
    )?;
    writeln!(
      f,
      "  results:   {} ({} cycles, {} prefetch, {} beats)",
      stats.results, stats.cycles, stats.prefetch_cycles, stats.beats
    )?;
    write!(
      f,
      "  conflicts: {} of {} batches, {} stall cycles, peak bank load {}",
      stats.resolver.collisions, stats.resolver.batches, stats.resolver.stall_cycles, stats.resolver.peak_utilization
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
  pub index: usize,
  pub got: Option<Q24>,
  pub expected: Option<Q24>,
}

/// Element-wise comparison; a length difference shows up as `None` entries.
pub fn compare(got: &[Q24], expected: &[Q24]) -> Vec<Mismatch> {
  (0..got.len().max(expected.len()))
    .filter_map(|index| {
      let (g, e) = (got.get(index).copied(), expected.get(index).copied());
      (g != e).then_some(Mismatch { index, got: g, expected: e })
    })
    .collect()
}

pub fn print_simulation_records(simulation: &mut Simulation) {
  println!("\n--- Simulation Records ---");

  for model in simulation.models().iter() {
    print_model_records(model);
  }

  println!("--- End Records ---\n");
}

fn print_model_records(model: &Model) {
  let records = model.records();
  if records.is_empty() {
    return;
  }
  println!("\n[{}] {}", model.id(), model.status());
  for record in records {
    println!("  Time {:.1}: {} {}", record.time, record.action, record.subject);
  }
}
