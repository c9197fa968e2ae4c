use super::fixed::Q24;
use super::resolver::BeatTag;
use super::shape::LANES;

/// Adder tree depth: 8 -> 4 -> 2 -> 1.
pub const TREE_LEVELS: usize = 3;
/// Cycles from operands entering the multiplier to the accumulator update.
pub const MAC_LATENCY: usize = 1 + TREE_LEVELS;

/// Lane-aligned (sample, coefficient) pairs fetched for one beat. Lanes with
/// no tap this beat are `None` and contribute nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operands {
  pub tag: BeatTag,
  pub lanes: [Option<(Q24, Q24)>; LANES],
}

/// Final sum of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowResult {
  pub window: u32,
  pub value: Q24,
}

// One pipeline register: N partial sums tagged with their beat.
#[derive(Debug, Clone, Copy)]
struct Stage<const N: usize> {
  tag: BeatTag,
  sums: [Q24; N],
}

impl<const N: usize> Stage<N> {
  fn reduce<const M: usize>(self) -> Stage<M> {
    debug_assert_eq!(N, 2 * M);
    let mut sums = [Q24::ZERO; M];
    for (i, sum) in sums.iter_mut().enumerate() {
      *sum = self.sums[2 * i] + self.sums[2 * i + 1];
    }
    Stage { tag: self.tag, sums }
  }
}

#[derive(Debug, Clone, Default)]
struct Accumulator {
  value: Q24,
  batch_counter: usize,
  batch_cycle: usize,
}

impl Accumulator {
  fn absorb(&mut self, tag: BeatTag, sum: Q24) -> Option<WindowResult> {
    if tag.starts_window() {
      self.value = sum;
      self.batch_counter = 0;
    } else {
      self.value += sum;
    }
    debug_assert_eq!(tag.batch, self.batch_counter, "beat out of batch order");

    if !tag.last_of_batch {
      return None;
    }
    if self.batch_counter == self.batch_cycle {
      self.batch_counter = 0;
      Some(WindowResult {
        window: tag.window,
        value: self.value,
      })
    } else {
      self.batch_counter += 1;
      None
    }
  }
}

/// 8-wide multiply, three-level adder tree and per-window accumulator.
///
/// Every stage is a register advanced by [`MacPipeline::step`]; the pipeline
/// never stalls and simply carries bubbles when nothing was fetched.
#[derive(Debug, Clone, Default)]
pub struct MacPipeline {
  products: Option<Stage<LANES>>,
  level1: Option<Stage<4>>,
  level2: Option<Stage<2>>,
  level3: Option<Stage<1>>,
  acc: Accumulator,
}

impl MacPipeline {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn configure(&mut self, batch_cycle: usize) {
    *self = Self::default();
    self.acc.batch_cycle = batch_cycle;
  }

  /// Advances one clock. Returns the window sum completed this cycle, if any.
  pub fn step(&mut self, operands: Option<Operands>) -> Option<WindowResult> {
    let ready = self
      .level3
      .take()
      .and_then(|stage| self.acc.absorb(stage.tag, stage.sums[0]));

    self.level3 = self.level2.take().map(Stage::reduce);
    self.level2 = self.level1.take().map(Stage::reduce);
    self.level1 = self.products.take().map(Stage::reduce);
    self.products = operands.map(multiply);

    ready
  }

  /// True when no beat is in flight.
  pub fn is_idle(&self) -> bool {
    self.products.is_none() && self.level1.is_none() && self.level2.is_none() && self.level3.is_none()
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }
}

fn multiply(operands: Operands) -> Stage<LANES> {
  let mut sums = [Q24::ZERO; LANES];
  for (product, lane) in sums.iter_mut().zip(operands.lanes.iter()) {
    if let Some((sample, coeff)) = lane {
      *product = sample.mul_q24(*coeff);
    }
  }
  Stage {
    tag: operands.tag,
    sums,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tag(window: u32, batch: usize, first: bool, last: bool) -> BeatTag {
    BeatTag {
      window,
      batch,
      first_of_batch: first,
      last_of_batch: last,
    }
  }

  fn operands(tag: BeatTag, pairs: &[(i32, i32)]) -> Operands {
    let mut lanes = [None; LANES];
    for (lane, &(a, b)) in pairs.iter().enumerate() {
      lanes[lane] = Some((Q24::from_int(a), Q24::from_int(b)));
    }
    Operands { tag, lanes }
  }

  #[test]
  fn single_batch_window_emerges_after_latency() {
    let mut mac = MacPipeline::new();
    mac.configure(0);

    let input = operands(tag(0, 0, true, true), &[(1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6), (7, 7), (8, 8)]);
    assert_eq!(mac.step(Some(input)), None);
    for _ in 1..MAC_LATENCY {
      assert_eq!(mac.step(None), None);
    }
    let ready = mac.step(None).expect("window sum");
    assert_eq!(ready.window, 0);
    assert_eq!(ready.value, Q24::from_int(204));
    assert!(mac.is_idle());
  }

  #[test]
  fn accumulates_across_batches_and_beats() {
    let mut mac = MacPipeline::new();
    mac.configure(1);

    // Batch 0 split into two beats by a collision, then batch 1.
    let beats = vec![
      operands(tag(5, 0, true, false), &[(1, 2), (1, 2)]),
      operands(tag(5, 0, false, true), &[(0, 0), (0, 0), (3, 1)]),
      operands(tag(5, 1, true, true), &[(-1, 4)]),
    ];

    let mut results = Vec::new();
    for beat in beats {
      results.extend(mac.step(Some(beat)));
    }
    for _ in 0..MAC_LATENCY + 1 {
      results.extend(mac.step(None));
    }
    assert_eq!(results, vec![WindowResult { window: 5, value: Q24::from_int(3) }]);
  }

  #[test]
  fn back_to_back_windows_reset_the_accumulator() {
    let mut mac = MacPipeline::new();
    mac.configure(0);

    let mut results = Vec::new();
    results.extend(mac.step(Some(operands(tag(0, 0, true, true), &[(2, 3)]))));
    results.extend(mac.step(Some(operands(tag(1, 0, true, true), &[(4, 5)]))));
    results.extend(mac.step(Some(operands(tag(2, 0, true, true), &[(-1, 1)]))));
    for _ in 0..MAC_LATENCY {
      results.extend(mac.step(None));
    }
    let values: Vec<Q24> = results.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![Q24::from_int(6), Q24::from_int(20), Q24::from_int(-1)]);
  }

  #[test]
  fn idle_cycles_hold_the_accumulator() {
    let mut mac = MacPipeline::new();
    mac.configure(1);

    let mut results = Vec::new();
    results.extend(mac.step(Some(operands(tag(0, 0, true, true), &[(1, 1)]))));
    for _ in 0..10 {
      results.extend(mac.step(None));
    }
    results.extend(mac.step(Some(operands(tag(0, 1, true, true), &[(1, 1)]))));
    for _ in 0..MAC_LATENCY {
      results.extend(mac.step(None));
    }
    assert_eq!(results, vec![WindowResult { window: 0, value: Q24::from_int(2) }]);
  }
}
