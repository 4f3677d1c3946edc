use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by allocator construction, `allocate` and `deallocate`.
///
/// Every failure leaves the arena untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
  /// A zero-byte allocation was requested.
  #[error("invalid allocation size: zero bytes requested")]
  InvalidSize,

  /// No free block is large enough for the request. `requested` is the size
  /// the search used, after any rounding the backend applies.
  #[error("out of memory: requested {requested} bytes, largest free block is {largest_free} bytes")]
  OutOfMemory { requested: u32, largest_free: u32 },

  /// The handle passed to `deallocate` does not name an occupied block.
  #[error("invalid pointer {handle}: {fault}")]
  InvalidPointer { handle: u32, fault: PointerFault },

  /// The arena cannot hold even a single header.
  #[error("cannot build an arena of {capacity} bytes: {reason}")]
  ConstructionFailure {
    capacity: usize,
    reason: &'static str,
  },
}

/// Why a handle was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PointerFault {
  #[error("null handle")]
  Null,
  #[error("handle outside the arena payload range")]
  OutOfBounds,
  #[error("block is not occupied")]
  NotOccupied,
  #[error("block header looks corrupt")]
  CorruptHeader,
  #[error("handle is not aligned to a block header")]
  Misaligned,
  #[error("handle is not the start of any block")]
  NotABlock,
}

impl Error {
  pub(crate) fn pointer(
    handle: u32,
    fault: PointerFault,
  ) -> Self {
    Error::InvalidPointer { handle, fault }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_messages() {
    let err = Error::OutOfMemory {
      requested: 64,
      largest_free: 12,
    };
    assert_eq!(
      err.to_string(),
      "out of memory: requested 64 bytes, largest free block is 12 bytes"
    );

    let err = Error::pointer(13, PointerFault::NotOccupied);
    assert_eq!(err.to_string(), "invalid pointer 13: block is not occupied");
  }
}
