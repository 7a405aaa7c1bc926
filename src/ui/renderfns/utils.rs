/// Truncate a string to at most `max_len` characters, ending with "..." if
/// anything was cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    return s.to_string();
  }
  let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
  format!("{}...", kept)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("qui est esse ééé", 10), "qui est...");
    assert_eq!(truncate("ééééé", 4), "é...");
  }
}
