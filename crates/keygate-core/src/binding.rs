//! First-use-wins HWID binding.
//!
//! [`check`] only decides. Stores act on [`HwidCheck::NeedsBind`] with a
//! conditional update (`… SET hwid = ? WHERE id = ? AND hwid IS NULL`) and, if
//! that update touches no row, re-read the record and call [`check`] again:
//! another request bound the key first.

/// How a presented fingerprint relates to the one stored on a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwidCheck {
  /// The key is already bound to this fingerprint.
  Bound,
  /// The key is unbound; this request may claim it.
  NeedsBind,
  /// The key is bound to a different fingerprint.
  Mismatch,
}

pub fn check(stored: Option<&str>, presented: &str) -> HwidCheck {
  match stored {
    None | Some("") => HwidCheck::NeedsBind,
    Some(bound) if bound == presented => HwidCheck::Bound,
    Some(_) => HwidCheck::Mismatch,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unbound_needs_bind() {
    assert_eq!(check(None, "H1"), HwidCheck::NeedsBind);
    assert_eq!(check(Some(""), "H1"), HwidCheck::NeedsBind);
  }

  #[test]
  fn same_fingerprint_is_bound() {
    assert_eq!(check(Some("H1"), "H1"), HwidCheck::Bound);
  }

  #[test]
  fn other_fingerprint_mismatches() {
    assert_eq!(check(Some("H1"), "H2"), HwidCheck::Mismatch);
    assert_eq!(check(Some("H1"), "h1"), HwidCheck::Mismatch);
  }
}
