use sim::models::Model;
use sim::simulator::{Connector, Simulation};

use super::bank::BankLayout;
use super::core_model::ConvCore;
use super::drain::ResultDrain;

pub const CONV_CORE: &str = "conv_core";
pub const RESULT_DRAIN: &str = "result_drain";

// conv_core inputs
pub const WRITE_BANK_REQ: &str = "write_bank_req";
pub const START: &str = "start";
pub const RESET: &str = "reset";
pub const READ_RESULT_REQ: &str = "read_result_req";
// conv_core outputs
pub const COMPLETED: &str = "completed";
pub const READ_RESULT_RESP: &str = "read_result_resp";

pub fn create_simulation(layout: BankLayout) -> Simulation {
  let models = vec![
    Model::new(
      String::from(CONV_CORE),
      Box::new(ConvCore::new(
        String::from(WRITE_BANK_REQ),
        String::from(START),
        String::from(RESET),
        String::from(READ_RESULT_REQ),
        String::from(COMPLETED),
        String::from(READ_RESULT_RESP),
        layout,
      )),
    ),
    Model::new(
      String::from(RESULT_DRAIN),
      Box::new(ResultDrain::new(
        String::from(COMPLETED),
        String::from(READ_RESULT_RESP),
        String::from(READ_RESULT_REQ),
      )),
    ),
  ];

  // Connector::new(id, source model, target model, source port, target port)
  let connectors = vec![
    Connector::new(
      String::from("core_drain_completed"),
      String::from(CONV_CORE),
      String::from(RESULT_DRAIN),
      String::from(COMPLETED),
      String::from(COMPLETED),
    ),
    Connector::new(
      String::from("drain_core_read_req"),
      String::from(RESULT_DRAIN),
      String::from(CONV_CORE),
      String::from(READ_RESULT_REQ),
      String::from(READ_RESULT_REQ),
    ),
    Connector::new(
      String::from("core_drain_read_resp"),
      String::from(CONV_CORE),
      String::from(RESULT_DRAIN),
      String::from(READ_RESULT_RESP),
      String::from(READ_RESULT_RESP),
    ),
  ];

  Simulation::post(models, connectors)
}
