use sim::models::model_trait::{DevsModel, Reportable, ReportableModel, SerializableModel};
use sim::models::{ModelMessage, ModelRecord};
use sim::simulator::Services;
use sim::utils::errors::SimulationError;
use std::f64::INFINITY;

use super::core_model::CompletionNotice;
use super::fixed::Q24;
use crate::model_record;

/// Words requested per result read.
pub const DRAIN_BURST: u32 = 256;

/// Host-side result drain: once the core reports completion, reads the whole
/// result bank back in bursts, one outstanding request at a time.
#[derive(Debug, Clone)]
pub struct ResultDrain {
  completed_port: String,
  read_result_resp_port: String,
  read_result_req_port: String,

  total: u32,
  next_addr: u32,
  received: u32,

  until_next_event: f64,
  records: Vec<ModelRecord>,
}

impl ResultDrain {
  pub fn new(completed_port: String, read_result_resp_port: String, read_result_req_port: String) -> Self {
    Self {
      completed_port,
      read_result_resp_port,
      read_result_req_port,
      total: 0,
      next_addr: 0,
      received: 0,
      until_next_event: INFINITY,
      records: Vec::new(),
    }
  }

  fn schedule_next(&mut self) {
    self.until_next_event = if self.next_addr < self.total { 0.0 } else { INFINITY };
  }
}

impl DevsModel for ResultDrain {
  fn events_ext(&mut self, incoming_message: &ModelMessage, services: &mut Services) -> Result<(), SimulationError> {
    if incoming_message.port_name == self.completed_port {
      let notice: CompletionNotice =
        serde_json::from_str(&incoming_message.content).map_err(|_| SimulationError::InvalidModelState)?;
      self.total = notice.results;
      self.next_addr = 0;
      self.received = 0;
      self.schedule_next();
      model_record!(self, services, "drain_begin", format!("results={}", notice.results));
      return Ok(());
    }

    if incoming_message.port_name == self.read_result_resp_port {
      let (start, data): (u32, Vec<Q24>) =
        serde_json::from_str(&incoming_message.content).map_err(|_| SimulationError::InvalidModelState)?;
      self.received += data.len() as u32;
      self.schedule_next();
      model_record!(self, services, "receive", format!("start={} count={}", start, data.len()));
      if self.received == self.total {
        log::debug!("result_drain: all {} results read back", self.total);
      }
      return Ok(());
    }

    Ok(())
  }

  fn events_int(&mut self, services: &mut Services) -> Result<Vec<ModelMessage>, SimulationError> {
    let mut messages = Vec::new();

    if self.next_addr < self.total {
      let count = DRAIN_BURST.min(self.total - self.next_addr);
      let request = (self.next_addr, count);
      messages.push(ModelMessage {
        content: serde_json::to_string(&request).map_err(|_| SimulationError::InvalidModelState)?,
        port_name: self.read_result_req_port.clone(),
      });
      model_record!(self, services, "request", format!("start={} count={}", self.next_addr, count));
      self.next_addr += count;
    }

    // Wait for the response before asking for more.
    self.until_next_event = INFINITY;
    Ok(messages)
  }

  fn time_advance(&mut self, time_delta: f64) {
    self.until_next_event -= time_delta;
  }

  fn until_next_event(&self) -> f64 {
    self.until_next_event
  }
}

impl Reportable for ResultDrain {
  fn status(&self) -> String {
    format!("received={}/{}", self.received, self.total)
  }

  fn records(&self) -> &Vec<ModelRecord> {
    &self.records
  }
}

impl ReportableModel for ResultDrain {}

impl SerializableModel for ResultDrain {
  fn get_type(&self) -> &'static str {
    "ResultDrain"
  }
}
