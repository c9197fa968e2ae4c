//! Host-side writers that place an image and a filter into the banks in the
//! layout the engine expects.

use serde::{Deserialize, Serialize};

use super::bank::{BankError, BankLayout, BankSet, BankTarget, INPUT_BANKS};
use super::fixed::Q24;

/// Longest run of words carried by one write request.
pub const WRITE_BURST: usize = 256;

/// One contiguous host write into a bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankWrite {
  pub target: BankTarget,
  pub start_addr: u32,
  pub data: Vec<Q24>,
}

impl BankWrite {
  pub fn apply(&self, banks: &mut BankSet) -> Result<(), BankError> {
    banks.write(self.target, self.start_addr as usize, &self.data)
  }
}

/// Splits a row-major square image into per-bank write bursts.
///
/// Every bank receives its samples in address order, bursts are emitted round
/// robin over the banks so no bank lags far behind the others.
pub fn image_writes(image: &[Q24], width: usize, layout: BankLayout) -> Vec<BankWrite> {
  let mut per_bank: Vec<Vec<(usize, Q24)>> = vec![Vec::new(); INPUT_BANKS];
  for (index, &sample) in image.iter().enumerate() {
    let loc = layout.locate(index / width, index % width, width);
    per_bank[loc.bank].push((loc.addr, sample));
  }

  let mut queues: Vec<_> = per_bank
    .into_iter()
    .enumerate()
    .map(|(bank, mut words)| {
      words.sort_by_key(|&(addr, _)| addr);
      bursts(BankTarget::Input(bank as u8), &words).into_iter()
    })
    .collect();

  let mut writes = Vec::new();
  loop {
    let before = writes.len();
    for queue in queues.iter_mut() {
      writes.extend(queue.next());
    }
    if writes.len() == before {
      break;
    }
  }
  writes
}

/// Filter coefficients go densely to addresses `0..dim²`.
pub fn filter_writes(coeffs: &[Q24]) -> Vec<BankWrite> {
  vec![BankWrite {
    target: BankTarget::Filter,
    start_addr: 0,
    data: coeffs.to_vec(),
  }]
}

/// Writes image and filter into `banks`. The banks must be host-owned.
pub fn load(banks: &mut BankSet, image: &[Q24], width: usize, coeffs: &[Q24]) -> Result<(), BankError> {
  let layout = banks.layout();
  for write in image_writes(image, width, layout).iter().chain(filter_writes(coeffs).iter()) {
    write.apply(banks)?;
  }
  log::debug!(
    "loaded {}x{} image ({}) and {} coefficients",
    width,
    image.len() / width.max(1),
    layout,
    coeffs.len()
  );
  Ok(())
}

// Groups address-sorted words into contiguous runs of at most WRITE_BURST.
fn bursts(target: BankTarget, words: &[(usize, Q24)]) -> Vec<BankWrite> {
  let mut out: Vec<BankWrite> = Vec::new();
  for &(addr, sample) in words {
    match out.last_mut() {
      Some(cur) if cur.start_addr as usize + cur.data.len() == addr && cur.data.len() < WRITE_BURST => {
        cur.data.push(sample);
      },
      _ => out.push(BankWrite {
        target,
        start_addr: addr as u32,
        data: vec![sample],
      }),
    }
  }
  out
}
