/// Pushes a `ModelRecord` stamped with the current simulation time.
///
/// Usage:
/// ```ignore
/// model_record!(self, services, "start", "filter=3 stride=1");
/// model_record!(self, services, "read_result", format!("start={}", start));
/// ```
#[macro_export]
macro_rules! model_record {
  ($self:expr, $services:expr, $action:expr, $subject:expr) => {
    $self.records.push(sim::models::ModelRecord {
      time: $services.global_time(),
      action: $action.to_string(),
      subject: $subject.to_string(),
    });
  };
}
