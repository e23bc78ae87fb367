//! License key string generation.

use rand_core::{OsRng, RngCore};

/// Produces candidate key strings. Uniqueness is enforced by the store; the
/// engine retries on collision.
pub trait KeyGenerator: Send + Sync {
  fn generate(&self) -> String;
}

impl<F> KeyGenerator for F
where
  F: Fn() -> String + Send + Sync,
{
  fn generate(&self) -> String { self() }
}

/// Dash-separated groups of uppercase hex, e.g. `9F3A-04C1-BB7E-12D0`.
#[derive(Debug, Clone, Copy)]
pub struct RandomKeyGenerator {
  groups:    usize,
  group_len: usize,
}

impl RandomKeyGenerator {
  pub fn new(groups: usize, group_len: usize) -> Self {
    Self { groups: groups.max(1), group_len: group_len.max(1) }
  }
}

impl Default for RandomKeyGenerator {
  fn default() -> Self { Self::new(4, 4) }
}

impl KeyGenerator for RandomKeyGenerator {
  fn generate(&self) -> String {
    let chars = self.groups * self.group_len;
    let mut bytes = vec![0u8; chars.div_ceil(2)];
    OsRng.fill_bytes(&mut bytes);
    let hex = hex::encode_upper(bytes);

    hex
      .as_bytes()
      .chunks(self.group_len)
      .take(self.groups)
      .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
      .collect::<Vec<_>>()
      .join("-")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::license::normalize_key;

  #[test]
  fn default_shape() {
    let key = RandomKeyGenerator::default().generate();
    assert_eq!(key.len(), 19);
    let groups: Vec<_> = key.split('-').collect();
    assert_eq!(groups.len(), 4);
    assert!(groups.iter().all(|g| g.len() == 4));
  }

  #[test]
  fn odd_lengths_are_filled() {
    let key = RandomKeyGenerator::new(3, 5).generate();
    assert_eq!(key.split('-').map(str::len).collect::<Vec<_>>(), vec![5, 5, 5]);
  }

  #[test]
  fn generated_keys_are_already_normalised() {
    let key = RandomKeyGenerator::default().generate();
    assert_eq!(normalize_key(&key).as_deref(), Some(key.as_str()));
  }

  #[test]
  fn closures_are_generators() {
    let fixed = || "FIXED-KEY".to_string();
    assert_eq!(fixed.generate(), "FIXED-KEY");
  }
}
