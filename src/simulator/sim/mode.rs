use crate::arch::conv::BankLayout;
use crate::simulator::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
  Continuous,
  Step,
}

/// Resolved settings for one simulator instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
  pub quiet: bool,
  pub step_mode: StepMode,
  pub trace_file: Option<String>,
  /// Simulation time budget per job, in engine cycles.
  pub max_cycles: u64,
  pub layout: BankLayout,
}

impl SimConfig {
  /// Builds the run settings from the merged application config. `layout` is
  /// passed separately because a job file may pin its own.
  pub fn from_app(app: &AppConfig, layout: BankLayout) -> Self {
    let sim = &app.simulation;
    Self {
      quiet: sim.quiet,
      step_mode: if sim.step_mode { StepMode::Step } else { StepMode::Continuous },
      trace_file: Some(sim.trace_file.clone()).filter(|f| !f.is_empty()),
      max_cycles: sim.max_cycles,
      layout,
    }
  }
}

impl Default for SimConfig {
  fn default() -> Self {
    Self::from_app(&AppConfig::default(), BankLayout::default())
  }
}
