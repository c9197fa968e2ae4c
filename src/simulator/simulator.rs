use sim::models::Reportable;
use sim::simulator::Simulation;
use std::fs::File;
use std::io::{self, BufWriter};
use thiserror::Error;

use super::job::{JobError, PreparedJob};
use super::sim::inject::{inject_json, inject_message};
use super::sim::mode::{SimConfig, StepMode};
use super::sim::model::{is_quiescent, model_step};
use super::sim::shell::{Command, Shell};
use super::utils::report::RunReport;
use crate::arch::conv::core_model::CompletionNotice;
use crate::arch::conv::main::{CONV_CORE, COMPLETED, READ_RESULT_RESP, RESET, START, WRITE_BANK_REQ};
use crate::arch::conv::regs::ConfigRegisters;
use crate::arch::conv::{create_simulation, ConfigError, Q24};

#[derive(Debug, Error)]
pub enum SimError {
  #[error(transparent)]
  Job(#[from] JobError),
  #[error("invalid start command: {0}")]
  Config(#[from] ConfigError),
  #[error("simulation step failed: {0}")]
  Step(String),
  #[error("cannot open trace file {path}: {source}")]
  Trace { path: String, source: io::Error },
  #[error(transparent)]
  Io(#[from] io::Error),
  #[error("message encoding failed: {0}")]
  Encode(#[from] serde_json::Error),
  #[error("no completion within {0} cycles")]
  CycleBudget(u64),
  #[error("simulation went idle at t={0:.1} before all results were read back")]
  Stalled(f64),
  #[error("run aborted from the step shell")]
  Aborted,
}

/// Drives the `conv_core` / `result_drain` simulation through whole jobs.
pub struct Simulator {
  config: SimConfig,
  simulation: Simulation,
  trace_writer: Option<BufWriter<File>>,
  shell: Option<Shell>,
}

impl Simulator {
  pub fn new(config: SimConfig) -> Result<Self, SimError> {
    let trace_writer = match &config.trace_file {
      Some(path) => {
        let file = File::create(path).map_err(|source| SimError::Trace {
          path: path.clone(),
          source,
        })?;
        log::info!("writing message trace to {}", path);
        Some(BufWriter::new(file))
      },
      None => None,
    };

    let shell = match config.step_mode {
      StepMode::Step => Some(Shell::new()?),
      StepMode::Continuous => None,
    };

    Ok(Self {
      simulation: create_simulation(config.layout),
      config,
      trace_writer,
      shell,
    })
  }

  pub fn config(&self) -> &SimConfig {
    &self.config
  }

  pub fn simulation(&mut self) -> &mut Simulation {
    &mut self.simulation
  }

  /// Loads `job` into the banks, starts the core and runs until every result
  /// has been read back by the drain.
  pub fn run_job(&mut self, job: &PreparedJob) -> Result<RunReport, SimError> {
    // Fail before touching the simulation.
    ConfigRegisters::latch(&job.command)?;

    let t0 = self.simulation.get_global_time();
    let layout = self.config.layout;
    let expected = job.command.output_count as usize;

    inject_message(&mut self.simulation, CONV_CORE, RESET, String::new());
    let writes = job.bank_writes(layout);
    log::info!(
      "loading {} samples and {} coefficients in {} writes ({} layout)",
      job.image.len(),
      job.coeffs.len(),
      writes.len(),
      layout
    );
    for write in &writes {
      inject_json(&mut self.simulation, CONV_CORE, WRITE_BANK_REQ, write)?;
    }
    inject_json(&mut self.simulation, CONV_CORE, START, &job.command)?;

    let mut results: Vec<Option<Q24>> = vec![None; expected];
    let mut received = 0usize;
    let mut notice: Option<CompletionNotice> = None;
    let mut last_read = t0;
    let mut steps_left: u32 = 0;
    let mut interactive = self.config.step_mode == StepMode::Step;

    loop {
      if interactive && steps_left == 0 {
        match self.prompt()? {
          Command::Step(n) => steps_left = n,
          Command::Continue => interactive = false,
          Command::Quit => return Err(SimError::Aborted),
          Command::Status => {
            self.print_status();
            continue;
          },
        }
      }

      let messages = model_step(&mut self.simulation, &mut self.trace_writer)?;
      for msg in &messages {
        if msg.target_port() == COMPLETED {
          notice = Some(serde_json::from_str(msg.content())?);
        } else if msg.target_port() == READ_RESULT_RESP {
          let (start, data): (u32, Vec<Q24>) = serde_json::from_str(msg.content())?;
          last_read = *msg.time();
          for (offset, value) in data.into_iter().enumerate() {
            if let Some(slot) = results.get_mut(start as usize + offset) {
              if slot.replace(value).is_none() {
                received += 1;
              }
            }
          }
        }
      }

      if interactive {
        steps_left = steps_left.saturating_sub(1);
        self.print_status();
      }

      if let Some(notice) = notice {
        if received == expected {
          log::info!("job finished at t={:.1}", last_read);
          return Ok(RunReport {
            command: job.command,
            layout,
            results: results.into_iter().flatten().collect(),
            stats: notice.stats,
            sim_time: last_read - t0,
          });
        }
      }

      let elapsed = self.simulation.get_global_time() - t0;
      if elapsed > self.config.max_cycles as f64 {
        return Err(SimError::CycleBudget(self.config.max_cycles));
      }
      if messages.is_empty() && is_quiescent(&mut self.simulation) {
        return Err(SimError::Stalled(self.simulation.get_global_time()));
      }
    }
  }

  fn prompt(&mut self) -> Result<Command, SimError> {
    match self.shell.as_mut() {
      Some(shell) => Ok(shell.read_command()?),
      None => Ok(Command::Continue),
    }
  }

  fn print_status(&mut self) {
    let time = self.simulation.get_global_time();
    for model in self.simulation.models().iter() {
      println!("t={:.1} [{}] {}", time, model.id(), model.status());
    }
  }
}
