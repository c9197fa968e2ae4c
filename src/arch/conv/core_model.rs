use serde::{Deserialize, Serialize};
use sim::models::model_trait::{DevsModel, Reportable, ReportableModel, SerializableModel};
use sim::models::{ModelMessage, ModelRecord};
use sim::simulator::Services;
use sim::utils::errors::SimulationError;
use std::collections::VecDeque;
use std::f64::INFINITY;

use super::bank::{BankLayout, BankSet};
use super::engine::{ConvEngine, EngineState, EngineStats};
use super::fixed::Q24;
use super::loader::BankWrite;
use super::regs::StartCommand;
use crate::model_record;

/// Sent on the `completed` port when the last result has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotice {
  pub results: u32,
  pub stats: EngineStats,
}

/// The convolution core as a DEVS model. One engine cycle is one time unit.
///
/// Host-side traffic (bank writes, result reads) is served at the instant it
/// arrives; the engine clock only runs while scanning.
#[derive(Debug, Clone)]
pub struct ConvCore {
  write_bank_req_port: String,
  start_port: String,
  reset_port: String,
  read_result_req_port: String,
  completed_port: String,
  read_result_resp_port: String,

  engine: ConvEngine,
  banks: BankSet,
  read_requests: VecDeque<(u32, u32)>,
  notified: bool,

  until_next_event: f64,
  records: Vec<ModelRecord>,
}

impl ConvCore {
  pub fn new(
    write_bank_req_port: String,
    start_port: String,
    reset_port: String,
    read_result_req_port: String,
    completed_port: String,
    read_result_resp_port: String,
    layout: BankLayout,
  ) -> Self {
    Self {
      write_bank_req_port,
      start_port,
      reset_port,
      read_result_req_port,
      completed_port,
      read_result_resp_port,
      engine: ConvEngine::new(),
      banks: BankSet::new(layout),
      read_requests: VecDeque::new(),
      notified: false,
      until_next_event: INFINITY,
      records: Vec::new(),
    }
  }

  fn handle_write(&mut self, content: &str, services: &mut Services) -> Result<(), SimulationError> {
    let write: BankWrite = decode(content)?;
    write.apply(&mut self.banks).map_err(|e| {
      log::error!("conv_core: bank write rejected: {}", e);
      SimulationError::InvalidModelState
    })?;
    model_record!(
      self,
      services,
      "write_bank",
      format!("{:?} addr={} count={}", write.target, write.start_addr, write.data.len())
    );
    Ok(())
  }

  fn handle_start(&mut self, content: &str, services: &mut Services) -> Result<(), SimulationError> {
    let cmd: StartCommand = decode(content)?;
    self.engine.start(&cmd, &mut self.banks).map_err(|e| {
      log::error!("conv_core: start rejected: {}", e);
      SimulationError::InvalidModelState
    })?;
    self.notified = false;
    self.until_next_event = 1.0;
    model_record!(
      self,
      services,
      "start",
      format!(
        "filter={} stride={} image={} outputs={}",
        cmd.filter_size, cmd.stride, cmd.image_size, cmd.output_count
      )
    );
    Ok(())
  }

  fn serve_reads(&mut self, services: &mut Services) -> Result<Vec<ModelMessage>, SimulationError> {
    let mut messages = Vec::new();
    while let Some((start, count)) = self.read_requests.pop_front() {
      let data: Vec<Q24> = self
        .banks
        .read_results(start as usize, count as usize)
        .map_err(|e| {
          log::error!("conv_core: result read rejected: {}", e);
          SimulationError::InvalidModelState
        })?;
      messages.push(ModelMessage {
        content: serde_json::to_string(&(start, data)).map_err(|_| SimulationError::InvalidModelState)?,
        port_name: self.read_result_resp_port.clone(),
      });
      model_record!(self, services, "read_result", format!("start={} count={}", start, count));
    }
    Ok(messages)
  }

  fn clock(&mut self, services: &mut Services) -> Result<Vec<ModelMessage>, SimulationError> {
    let mut messages = Vec::new();

    self.engine.tick(&mut self.banks).map_err(|e| {
      log::error!("conv_core: cycle failed: {}", e);
      SimulationError::InvalidModelState
    })?;

    if self.engine.completed() && !self.notified {
      let stats = self.engine.stats();
      let notice = CompletionNotice {
        results: stats.results,
        stats,
      };
      messages.push(ModelMessage {
        content: serde_json::to_string(&notice).map_err(|_| SimulationError::InvalidModelState)?,
        port_name: self.completed_port.clone(),
      });
      model_record!(
        self,
        services,
        "completed",
        format!("results={} cycles={}", stats.results, stats.cycles)
      );
      self.notified = true;
    }

    self.until_next_event = match self.engine.state() {
      EngineState::Idle => INFINITY,
      EngineState::Scanning | EngineState::Completed => 1.0,
    };
    Ok(messages)
  }
}

fn decode<'a, T: Deserialize<'a>>(content: &'a str) -> Result<T, SimulationError> {
  serde_json::from_str(content).map_err(|e| {
    log::error!("conv_core: malformed message '{}': {}", content, e);
    SimulationError::InvalidModelState
  })
}

impl DevsModel for ConvCore {
  fn events_ext(&mut self, incoming_message: &ModelMessage, services: &mut Services) -> Result<(), SimulationError> {
    let port = incoming_message.port_name.as_str();
    let content = incoming_message.content.as_str();

    if port == self.write_bank_req_port {
      return self.handle_write(content, services);
    }

    if port == self.start_port {
      return self.handle_start(content, services);
    }

    if port == self.reset_port {
      self.engine.reset(&mut self.banks);
      self.read_requests.clear();
      self.notified = false;
      self.until_next_event = INFINITY;
      model_record!(self, services, "reset", "");
      return Ok(());
    }

    if port == self.read_result_req_port {
      let (start, count): (u32, u32) = decode(content)?;
      self.read_requests.push_back((start, count));
      return Ok(());
    }

    log::warn!("conv_core: message on unknown port '{}'", port);
    Ok(())
  }

  fn events_int(&mut self, services: &mut Services) -> Result<Vec<ModelMessage>, SimulationError> {
    // Pending reads pre-empt the clock; the clock schedule is left untouched.
    if !self.read_requests.is_empty() {
      return self.serve_reads(services);
    }
    self.clock(services)
  }

  fn time_advance(&mut self, time_delta: f64) {
    self.until_next_event -= time_delta;
  }

  fn until_next_event(&self) -> f64 {
    if !self.read_requests.is_empty() {
      return 0.0;
    }
    self.until_next_event
  }
}

impl Reportable for ConvCore {
  fn status(&self) -> String {
    let stats = self.engine.stats();
    format!(
      "state={:?}, cycles={}, results={}, stalls={}",
      self.engine.state(),
      stats.cycles,
      stats.results,
      stats.resolver.stall_cycles
    )
  }

  fn records(&self) -> &Vec<ModelRecord> {
    &self.records
  }
}

impl ReportableModel for ConvCore {}

impl SerializableModel for ConvCore {
  fn get_type(&self) -> &'static str {
    "ConvCore"
  }
}
