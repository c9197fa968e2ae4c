use super::bank::{BankLayout, Location, INPUT_BANKS};
use super::shape::{FilterShape, LANES};

/// One tap's read request: which filter tap it is and where its sample lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapRequest {
  /// Row-major tap index inside the window; also the coefficient address.
  pub tap: usize,
  pub bank: usize,
  pub addr: usize,
}

impl TapRequest {
  /// Datapath lane the tap occupies within its batch.
  pub fn lane(&self) -> usize {
    self.tap % LANES
  }
}

/// Up to eight taps presented to the collision resolver together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
  pub window: u32,
  pub index: usize,
  /// Lane-ordered requests; lanes past the last tap are empty.
  pub lanes: [Option<TapRequest>; LANES],
}

impl Batch {
  pub fn requests(&self) -> impl Iterator<Item = &TapRequest> {
    self.lanes.iter().flatten()
  }

  /// Requests per input bank.
  pub fn utilization(&self) -> [usize; INPUT_BANKS] {
    let mut util = [0; INPUT_BANKS];
    for req in self.requests() {
      util[req.bank] += 1;
    }
    util
  }
}

/// Expands a window origin into lane-ordered batches of bank requests.
///
/// Bank and address come from the same layout the loader used to place the
/// image, so each request reads the sample the tap actually needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressMapper {
  layout: BankLayout,
  width: usize,
}

impl AddressMapper {
  pub fn new(layout: BankLayout, width: usize) -> Self {
    Self { layout, width }
  }

  pub fn locate(&self, origin: (usize, usize), shape: FilterShape, tap: usize) -> Location {
    let dim = shape.dim();
    let (x, y) = origin;
    self.layout.locate(y + tap / dim, x + tap % dim, self.width)
  }

  pub fn batch(&self, window: u32, origin: (usize, usize), shape: FilterShape, index: usize) -> Batch {
    let first = index * LANES;
    let taps = shape.tap_count();
    let mut lanes = [None; LANES];

    for (lane, slot) in lanes.iter_mut().enumerate() {
      let tap = first + lane;
      if tap >= taps {
        break;
      }
      let loc = self.locate(origin, shape, tap);
      *slot = Some(TapRequest {
        tap,
        bank: loc.bank,
        addr: loc.addr,
      });
    }

    Batch { window, index, lanes }
  }
}
