#[inline]
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
  #[cfg(target_pointer_width = "64")]
  {
    let bytes = value.to_be_bytes();
    let high = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let low = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    f64::from(high).mul_add(4_294_967_296.0, f64::from(low))
  }

  #[cfg(target_pointer_width = "32")]
  {
    f64::from(u32::from_ne_bytes(value.to_ne_bytes()))
  }
}

/// `numerator / denominator`, or 0 when the denominator is 0.
#[inline]
#[must_use]
pub fn ratio_usize(numerator: usize, denominator: usize) -> f64 {
  if denominator == 0 {
    0.0
  } else {
    usize_to_f64(numerator) / usize_to_f64(denominator)
  }
}

#[cfg(test)]
mod tests {
  use crate::utils::{ratio_usize, usize_to_f64};

  #[test]
  fn usize_to_f64_is_exact_for_small_values() {
    for value in [0usize, 1, 17, 200, 65_536, 4_294_967_295] {
      #[allow(clippy::cast_precision_loss)]
      let expected = value as f64;
      assert!((usize_to_f64(value) - expected).abs() < f64::EPSILON);
    }
  }

  #[test]
  fn ratio_handles_zero_denominator() {
    assert!(ratio_usize(3, 0).abs() < f64::EPSILON);
    assert!((ratio_usize(1, 4) - 0.25).abs() < f64::EPSILON);
  }
}
