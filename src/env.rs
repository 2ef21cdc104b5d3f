pub fn read_env_usize_clamped(
  key: &str,
  default: usize,
  min: usize,
  max: usize,
) -> usize {
  std::env::var(key)
    .ok()
    .and_then(|value| value.trim().parse::<usize>().ok())
    .map_or(default, |parsed| parsed.clamp(min, max))
}

pub fn read_env_f64_clamped(
  key: &str,
  default: f64,
  min: f64,
  max: f64,
) -> f64 {
  std::env::var(key)
    .ok()
    .and_then(|value| value.trim().parse::<f64>().ok())
    .filter(|parsed| parsed.is_finite())
    .map_or(default, |parsed| parsed.clamp(min, max))
}

pub fn read_env_u64(key: &str, default: u64) -> u64 {
  std::env::var(key)
    .ok()
    .and_then(|value| value.trim().parse::<u64>().ok())
    .unwrap_or(default)
}

pub fn read_env_string(key: &str) -> Option<String> {
  std::env::var(key)
    .ok()
    .map(|value| value.trim().to_ascii_lowercase())
    .filter(|value| !value.is_empty())
}
