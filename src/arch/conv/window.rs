/// Stride controller: walks window origins over the image in raster order.
///
/// It has no notion of the last window; the engine stops calling
/// [`WindowController::advance`] once every window has been issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowController {
  x: usize,
  y: usize,
  stride: usize,
  bound: usize,
}

impl WindowController {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn configure(&mut self, stride: usize, bound: usize) {
    self.x = 0;
    self.y = 0;
    self.stride = stride;
    self.bound = bound;
  }

  /// Current origin as (x, y).
  pub fn origin(&self) -> (usize, usize) {
    (self.x, self.y)
  }

  pub fn advance(&mut self) {
    // Wrap once the next origin would leave the valid range. With a stride
    // that divides the bound this is exactly "wrap when x == bound".
    if self.x + self.stride > self.bound {
      self.x = 0;
      self.y += self.stride;
    } else {
      self.x += self.stride;
    }
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn walk(stride: usize, bound: usize, count: usize) -> Vec<(usize, usize)> {
    let mut ctrl = WindowController::new();
    ctrl.configure(stride, bound);
    let mut origins = Vec::new();
    for _ in 0..count {
      origins.push(ctrl.origin());
      ctrl.advance();
    }
    origins
  }

  #[test]
  fn raster_order_with_unit_stride() {
    assert_eq!(walk(1, 1, 4), vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
  }

  #[test]
  fn stride_dividing_bound_wraps_at_bound() {
    assert_eq!(
      walk(2, 4, 9),
      vec![(0, 0), (2, 0), (4, 0), (0, 2), (2, 2), (4, 2), (0, 4), (2, 4), (4, 4)]
    );
  }

  #[test]
  fn stride_not_dividing_bound_stays_in_range() {
    // 6-wide image, 3x3 filter: bound 3, stride 2 gives origins 0 and 2.
    assert_eq!(walk(2, 3, 4), vec![(0, 0), (2, 0), (0, 2), (2, 2)]);
  }

  #[test]
  fn reset_returns_to_origin() {
    let mut ctrl = WindowController::new();
    ctrl.configure(3, 9);
    ctrl.advance();
    ctrl.advance();
    assert_eq!(ctrl.origin(), (6, 0));
    ctrl.reset();
    assert_eq!(ctrl.origin(), (0, 0));
  }
}
