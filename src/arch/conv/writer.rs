use super::bank::{BankError, BankSet};
use super::fixed::Q24;

/// Writes one result per window to consecutive result-bank addresses and
/// raises `completed` after the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultWriter {
  next_addr: u32,
  output_count: u32,
  completed: bool,
}

impl ResultWriter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn configure(&mut self, output_count: u32) {
    self.next_addr = 0;
    self.output_count = output_count;
    self.completed = false;
  }

  /// Stores `value` at the next address. Returns true when that was the last
  /// expected result.
  pub fn write(&mut self, banks: &mut BankSet, value: Q24) -> Result<bool, BankError> {
    debug_assert!(!self.completed, "result written after completion");
    let addr = self.next_addr;
    banks.write_result(addr as usize, value)?;
    log::trace!("result[{}] = {}", addr, value);

    if addr + 1 == self.output_count {
      self.completed = true;
    }
    self.next_addr += 1;
    Ok(self.completed)
  }

  pub fn written(&self) -> u32 {
    self.next_addr
  }

  pub fn completed(&self) -> bool {
    self.completed
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arch::conv::bank::{BankLayout, BankOwner};

  #[test]
  fn writes_sequentially_and_completes_on_last() {
    let mut banks = BankSet::new(BankLayout::ColumnPair);
    banks.switch_to(BankOwner::Engine);

    let mut writer = ResultWriter::new();
    writer.configure(3);
    assert!(!writer.write(&mut banks, Q24::from_int(1)).unwrap());
    banks.end_cycle();
    assert!(!writer.write(&mut banks, Q24::from_int(2)).unwrap());
    banks.end_cycle();
    assert!(writer.write(&mut banks, Q24::from_int(3)).unwrap());
    assert!(writer.completed());
    assert_eq!(writer.written(), 3);

    banks.switch_to(BankOwner::Host);
    let stored = banks.read_results(0, 3).unwrap();
    assert_eq!(stored, vec![Q24::from_int(1), Q24::from_int(2), Q24::from_int(3)]);
  }

  #[test]
  fn host_owned_banks_reject_the_write() {
    let mut banks = BankSet::new(BankLayout::ColumnPair);
    let mut writer = ResultWriter::new();
    writer.configure(1);
    assert!(matches!(
      writer.write(&mut banks, Q24::ONE),
      Err(BankError::NotOwner { .. })
    ));
    assert_eq!(writer.written(), 0);
  }

  #[test]
  fn configure_clears_completion() {
    let mut banks = BankSet::new(BankLayout::ColumnPair);
    banks.switch_to(BankOwner::Engine);
    let mut writer = ResultWriter::new();
    writer.configure(1);
    assert!(writer.write(&mut banks, Q24::ONE).unwrap());
    writer.configure(4);
    assert!(!writer.completed());
    assert_eq!(writer.written(), 0);
  }
}
