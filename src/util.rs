//! Small utility helpers used across modules.

/// Log-safe truncation for large strings.
/// Cuts on a char boundary so multi-byte text never panics.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while cut > 0 && !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

/// Trimmed, non-empty view of an optional client string.
pub fn non_blank(s: Option<&str>) -> Option<&str> {
  s.map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trunc_keeps_short_strings() {
    assert_eq!(trunc_for_log("tent", 10), "tent");
  }

  #[test]
  fn trunc_respects_char_boundaries() {
    // 'é' is two bytes; cutting at 1 must back off to 0.
    let out = trunc_for_log("éé", 1);
    assert!(out.starts_with('…'));
    assert!(out.ends_with("(4 bytes total)"));
  }

  #[test]
  fn non_blank_filters_whitespace() {
    assert_eq!(non_blank(Some("  ")), None);
    assert_eq!(non_blank(Some(" hiker ")), Some("hiker"));
    assert_eq!(non_blank(None), None);
  }
}
