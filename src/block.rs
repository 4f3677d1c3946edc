use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Occupancy of a block, stored as a single byte in its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BlockState {
  Free = 0,
  Occupied = 1,
}

impl BlockState {
  pub fn from_byte(byte: u8) -> Option<Self> {
    match byte {
      0 => Some(BlockState::Free),
      1 => Some(BlockState::Occupied),
      _ => None,
    }
  }

  pub fn as_byte(self) -> u8 {
    self as u8
  }

  pub fn is_free(self) -> bool {
    self == BlockState::Free
  }
}

/// Payload offset of an allocated block.
///
/// Handles are plain offsets into the arena; `0` is the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
  pub const NULL: Handle = Handle(0);

  pub const fn from_offset(offset: u32) -> Self {
    Handle(offset)
  }

  pub const fn offset(self) -> u32 {
    self.0
  }

  pub const fn is_null(self) -> bool {
    self.0 == 0
  }
}

impl fmt::Display for Handle {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{:#x}", self.0)
  }
}

/// Snapshot of one block as seen by a diagnostics traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockInfo {
  pub offset: u32,
  pub size: u32,
  pub state: BlockState,
  pub prev: u32,
  pub next: u32,
}

impl fmt::Display for BlockInfo {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let state = match self.state {
      BlockState::Free => "FREE",
      BlockState::Occupied => "OCCUPIED",
    };
    write!(
      f,
      "prev = {:#x} address = {:#x} {} size = {} next = {:#x}",
      self.prev, self.offset, state, self.size, self.next
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_state_byte() {
    assert_eq!(BlockState::from_byte(0), Some(BlockState::Free));
    assert_eq!(BlockState::from_byte(1), Some(BlockState::Occupied));
    assert_eq!(BlockState::from_byte(7), None);
    assert_eq!(BlockState::Occupied.as_byte(), 1);
  }

  #[test]
  fn test_display() {
    let info = BlockInfo {
      offset: 13,
      size: 4,
      state: BlockState::Occupied,
      prev: 0,
      next: 30,
    };
    assert_eq!(
      info.to_string(),
      "prev = 0x0 address = 0xd OCCUPIED size = 4 next = 0x1e"
    );
    assert_eq!(Handle::from_offset(30).to_string(), "0x1e");
  }
}
