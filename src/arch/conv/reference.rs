use super::fixed::Q24;
use super::regs::ConfigRegisters;

/// Direct convolution over a row-major square image, in window scan order.
///
/// Uses the same Q24 multiply and wrapping add as the datapath, so results
/// are bit-identical to the engine's regardless of how taps were batched.
pub fn convolve(image: &[Q24], coeffs: &[Q24], regs: &ConfigRegisters) -> Vec<Q24> {
  let size = regs.image_size;
  let dim = regs.shape.dim();
  debug_assert_eq!(image.len(), size * size);
  debug_assert!(coeffs.len() >= dim * dim);

  let mut out = Vec::with_capacity(regs.output_count as usize);
  for y in (0..=regs.bound).step_by(regs.stride) {
    for x in (0..=regs.bound).step_by(regs.stride) {
      let sum: Q24 = (0..dim * dim)
        .map(|tap| {
          let (i, j) = (tap / dim, tap % dim);
          image[(y + i) * size + x + j].mul_q24(coeffs[tap])
        })
        .sum();
      out.push(sum);
    }
  }
  out
}
