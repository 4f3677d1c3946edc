#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How thoroughly `deallocate` checks a handle before trusting its header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Validation {
  /// Range and header sanity checks only. A handle pointing into the middle
  /// of a payload can slip through if the bytes there look like a header.
  #[default]
  Heuristic,
  /// Heuristic checks plus a walk of the block chain; the handle must be the
  /// payload offset of a block that actually exists.
  Strict,
}

/// Construction parameters for an allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
  pub capacity: usize,
  #[cfg_attr(feature = "serde", serde(default))]
  pub validation: Validation,
}

impl Config {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity,
      validation: Validation::default(),
    }
  }

  pub fn validation(
    mut self,
    validation: Validation,
  ) -> Self {
    self.validation = validation;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::new(1024);
    assert_eq!(config.capacity, 1024);
    assert_eq!(config.validation, Validation::Heuristic);

    let strict = config.validation(Validation::Strict);
    assert_eq!(strict.validation, Validation::Strict);
  }
}
