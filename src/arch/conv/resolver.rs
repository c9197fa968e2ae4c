//! Memory access scheduler for the input banks.
//!
//! Each input bank has two read ports, so a batch may put at most two taps on
//! any one bank per cycle. When a batch over-subscribes a bank, the taps are
//! queued per bank in lane order and issued two at a time over as many cycles
//! as the deepest queue needs. While that happens the window pipeline is held.
//! Queue order is never changed: the pairing of samples with coefficients
//! depends on it.

use serde::{Deserialize, Serialize};

use super::bank::{INPUT_BANKS, PORTS_PER_BANK};
use super::mapper::{Batch, TapRequest};
use super::shape::LANES;

/// A request bound to a read port for this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
  pub request: TapRequest,
  pub port: usize,
}

/// Which batch a beat belongs to and where it sits in it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BeatTag {
  pub window: u32,
  pub batch: usize,
  pub first_of_batch: bool,
  pub last_of_batch: bool,
}

impl BeatTag {
  pub fn starts_window(&self) -> bool {
    self.batch == 0 && self.first_of_batch
  }
}

/// Everything issued to the input banks in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beat {
  pub tag: BeatTag,
  pub grants: Vec<Grant>,
}

/// Fixed-capacity FIFO of taps waiting for one bank.
#[derive(Debug, Clone, Copy, Default)]
struct BankQueue {
  slots: [Option<TapRequest>; LANES],
  head: usize,
  len: usize,
}

impl BankQueue {
  fn push(&mut self, req: TapRequest) {
    debug_assert!(self.len < LANES, "bank queue overflow");
    let tail = (self.head + self.len) % LANES;
    self.slots[tail] = Some(req);
    self.len += 1;
  }

  fn pop(&mut self) -> Option<TapRequest> {
    if self.len == 0 {
      return None;
    }
    let req = self.slots[self.head].take();
    self.head = (self.head + 1) % LANES;
    self.len -= 1;
    req
  }

  fn len(&self) -> usize {
    self.len
  }

  fn is_empty(&self) -> bool {
    self.len == 0
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverStats {
  /// Batches accepted.
  pub batches: u64,
  /// Batches that over-subscribed at least one bank.
  pub collisions: u64,
  /// Extra cycles spent draining collided batches.
  pub stall_cycles: u64,
  /// Deepest single-bank utilization seen.
  pub peak_utilization: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CollisionResolver {
  queues: [BankQueue; INPUT_BANKS],
  pending: Option<(u32, usize)>,
  stats: ResolverStats,
}

impl CollisionResolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// True while a collided batch still has queued taps; the window pipeline
  /// must hold.
  pub fn is_draining(&self) -> bool {
    self.pending.is_some()
  }

  pub fn stats(&self) -> ResolverStats {
    self.stats
  }

  /// Takes a fresh batch and issues its first beat.
  pub fn accept(&mut self, batch: &Batch) -> Beat {
    debug_assert!(!self.is_draining(), "new batch while draining");

    let util = batch.utilization();
    let peak = util.iter().copied().max().unwrap_or(0);
    self.stats.batches += 1;
    self.stats.peak_utilization = self.stats.peak_utilization.max(peak);
    if peak > PORTS_PER_BANK {
      self.stats.collisions += 1;
      log::trace!(
        "window {} batch {}: bank collision {:?}, {} cycles",
        batch.window,
        batch.index,
        util,
        peak.div_ceil(PORTS_PER_BANK)
      );
    }

    for req in batch.requests() {
      self.queues[req.bank].push(*req);
    }

    let grants = self.issue_round();
    let last_of_batch = self.queues.iter().all(BankQueue::is_empty);
    if !last_of_batch {
      self.pending = Some((batch.window, batch.index));
    }

    Beat {
      tag: BeatTag {
        window: batch.window,
        batch: batch.index,
        first_of_batch: true,
        last_of_batch,
      },
      grants,
    }
  }

  /// Issues the next beat of a collided batch, or `None` when nothing is
  /// pending.
  pub fn drain(&mut self) -> Option<Beat> {
    let (window, batch) = self.pending?;
    self.stats.stall_cycles += 1;

    let grants = self.issue_round();
    let last_of_batch = self.queues.iter().all(BankQueue::is_empty);
    if last_of_batch {
      self.pending = None;
    }

    Some(Beat {
      tag: BeatTag {
        window,
        batch,
        first_of_batch: false,
        last_of_batch,
      },
      grants,
    })
  }

  /// Pops `min(2, remaining)` entries from every bank queue.
  fn issue_round(&mut self) -> Vec<Grant> {
    let mut grants = Vec::with_capacity(LANES);
    for queue in self.queues.iter_mut() {
      for port in 0..PORTS_PER_BANK.min(queue.len()) {
        if let Some(request) = queue.pop() {
          grants.push(Grant { request, port });
        }
      }
    }
    grants
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn batch_on_banks(banks: &[usize]) -> Batch {
    let mut lanes = [None; LANES];
    for (lane, &bank) in banks.iter().enumerate() {
      lanes[lane] = Some(TapRequest { tap: lane, bank, addr: 100 + lane });
    }
    Batch { window: 7, index: 2, lanes }
  }

  fn drain_all(resolver: &mut CollisionResolver, batch: &Batch) -> Vec<Beat> {
    let mut beats = vec![resolver.accept(batch)];
    while let Some(beat) = resolver.drain() {
      beats.push(beat);
    }
    beats
  }

  #[test]
  fn balanced_batch_issues_in_one_cycle() {
    let mut resolver = CollisionResolver::new();
    let beat = resolver.accept(&batch_on_banks(&[0, 0, 1, 1, 2, 2, 3, 3]));
    assert!(!resolver.is_draining());
    assert_eq!(beat.grants.len(), 8);
    assert!(beat.tag.first_of_batch && beat.tag.last_of_batch);
    assert_eq!(resolver.drain(), None);
    assert_eq!(resolver.stats().collisions, 0);
    assert_eq!(resolver.stats().stall_cycles, 0);
  }

  #[test]
  fn eight_deep_collision_takes_four_cycles_in_order() {
    let mut resolver = CollisionResolver::new();
    let beats = drain_all(&mut resolver, &batch_on_banks(&[1; 8]));

    assert_eq!(beats.len(), 4);
    let order: Vec<usize> = beats.iter().flat_map(|b| b.grants.iter().map(|g| g.request.tap)).collect();
    assert_eq!(order, (0..8).collect::<Vec<_>>());
    for beat in &beats {
      let ports: Vec<usize> = beat.grants.iter().map(|g| g.port).collect();
      assert_eq!(ports, vec![0, 1]);
      assert_eq!(beat.tag.window, 7);
      assert_eq!(beat.tag.batch, 2);
    }
    assert!(beats[0].tag.first_of_batch && !beats[0].tag.last_of_batch);
    assert!(beats[3].tag.last_of_batch && !beats[3].tag.first_of_batch);

    let stats = resolver.stats();
    assert_eq!(stats.collisions, 1);
    assert_eq!(stats.stall_cycles, 3);
    assert_eq!(stats.peak_utilization, 8);
  }

  #[test]
  fn partial_collision_keeps_other_banks_flowing() {
    let mut resolver = CollisionResolver::new();
    // Bank 0 gets taps 0,1,6,7; banks 1..3 are fine.
    let beats = drain_all(&mut resolver, &batch_on_banks(&[0, 0, 1, 2, 2, 3, 0, 0]));
    assert_eq!(beats.len(), 2);

    let first: Vec<(usize, usize, usize)> =
      beats[0].grants.iter().map(|g| (g.request.bank, g.port, g.request.tap)).collect();
    assert_eq!(first, vec![(0, 0, 0), (0, 1, 1), (1, 0, 2), (2, 0, 3), (2, 1, 4), (3, 0, 5)]);

    let second: Vec<(usize, usize, usize)> =
      beats[1].grants.iter().map(|g| (g.request.bank, g.port, g.request.tap)).collect();
    assert_eq!(second, vec![(0, 0, 6), (0, 1, 7)]);
  }

  #[test]
  fn no_port_is_driven_twice_per_beat() {
    let mut resolver = CollisionResolver::new();
    for banks in [[3, 3, 3, 0, 0, 0, 0, 3], [2, 1, 2, 1, 2, 1, 2, 1], [0, 1, 2, 3, 0, 1, 2, 3]] {
      for beat in drain_all(&mut resolver, &batch_on_banks(&banks)) {
        let mut used = std::collections::HashSet::new();
        for g in &beat.grants {
          assert!(g.port < PORTS_PER_BANK);
          assert!(used.insert((g.request.bank, g.port)));
        }
      }
    }
  }

  #[test]
  fn partial_batch_and_reset() {
    let mut resolver = CollisionResolver::new();
    let beat = resolver.accept(&batch_on_banks(&[2, 2, 2]));
    assert_eq!(beat.grants.len(), 2);
    assert!(resolver.is_draining());
    resolver.reset();
    assert!(!resolver.is_draining());
    assert_eq!(resolver.drain(), None);
    assert_eq!(resolver.stats(), ResolverStats::default());
  }
}
