use sim::models::model_trait::DevsModel;
use sim::simulator::{Message, Simulation};
use std::fs::File;
use std::io::{BufWriter, Write};

use crate::simulator::SimError;

/// Advances the simulation by one instant.
///
/// Delivers every message pending at the current time (and whatever those
/// deliveries produce at the same time), then steps once more to the next
/// scheduled event. Returns every message delivered on the way, in delivery
/// order. Returns early with whatever was seen when the whole simulation is
/// quiescent.
pub fn model_step(simulation: &mut Simulation, trace_writer: &mut Option<BufWriter<File>>) -> Result<Vec<Message>, SimError> {
  let mut observed = Vec::new();
  let time0 = simulation.get_global_time();

  loop {
    let pending = simulation.get_messages().clone();
    if pending.is_empty() && is_quiescent(simulation) {
      break;
    }

    for msg in pending.iter() {
      log::debug!(
        "[MSG] t={:.1} {}:{} -> {}:{} | {}",
        msg.time(),
        msg.source_id(),
        msg.source_port(),
        msg.target_id(),
        msg.target_port(),
        abbreviate(msg.content())
      );
    }

    if let Some(writer) = trace_writer {
      for msg in pending.iter() {
        let trace_entry = serde_json::json!({
          "time": msg.time(),
          "source": msg.source_id(),
          "source_port": msg.source_port(),
          "target": msg.target_id(),
          "target_port": msg.target_port(),
          "content": msg.content()
        });
        writeln!(writer, "{}", trace_entry)?;
      }
      writer.flush()?;
    }
    observed.extend(pending);

    simulation.step().map_err(|e| {
      log::error!("simulation step error: {:?}", e);
      SimError::Step(format!("{:?}", e))
    })?;

    if simulation.get_global_time() > time0 {
      break;
    }
  }

  Ok(observed)
}

/// No message in flight and no model with a scheduled internal event.
pub fn is_quiescent(simulation: &mut Simulation) -> bool {
  simulation.get_messages().is_empty()
    && simulation
      .models()
      .iter()
      .all(|model| model.until_next_event() == f64::INFINITY)
}

fn abbreviate(content: &str) -> &str {
  const LIMIT: usize = 96;
  match content.char_indices().nth(LIMIT) {
    Some((idx, _)) => &content[..idx],
    None => content,
  }
}
