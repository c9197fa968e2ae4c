use serde::Serialize;
use sim::simulator::{Message, Simulation};

/// Injects a message addressed to `target_model:target_port` at the current
/// simulation time. The source is reported as `host`.
pub fn inject_message(simulation: &mut Simulation, target_model: &str, target_port: &str, content: String) {
  let msg = Message::new(
    String::from("host"),
    String::from("default"),
    target_model.to_string(),
    target_port.to_string(),
    simulation.get_global_time(),
    content,
  );
  simulation.inject_input(msg);
}

/// Serializes `payload` as JSON and injects it.
pub fn inject_json<T: Serialize>(
  simulation: &mut Simulation,
  target_model: &str,
  target_port: &str,
  payload: &T,
) -> serde_json::Result<()> {
  let content = serde_json::to_string(payload)?;
  inject_message(simulation, target_model, target_port, content);
  Ok(())
}
