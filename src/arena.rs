use crate::{
  Error, Result,
  block::BlockState,
  header::{self, FIRST_BLOCK, HEADER_SIZE},
};

/// Fixed-capacity byte buffer that holds every block, headers included.
///
/// The arena never grows. Block metadata lives inside the buffer itself and
/// blocks refer to each other by payload offset, so the whole structure can
/// be copied or inspected as plain bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arena {
  ram: Box<[u8]>,
}

impl Arena {
  /// Zero-fills `capacity` bytes and installs one free block spanning them.
  pub fn new(capacity: usize) -> Result<Self> {
    if capacity <= HEADER_SIZE as usize {
      return Err(Error::ConstructionFailure {
        capacity,
        reason: "not enough room for a block header",
      });
    }
    if capacity > u32::MAX as usize {
      return Err(Error::ConstructionFailure {
        capacity,
        reason: "offsets are limited to 32 bits",
      });
    }

    let mut arena = Self {
      ram: vec![0u8; capacity].into_boxed_slice(),
    };
    let size = arena.capacity() - HEADER_SIZE;

    arena.set_prev(FIRST_BLOCK, 0);
    arena.set_next(FIRST_BLOCK, 0);
    arena.set_state(FIRST_BLOCK, BlockState::Free);
    arena.set_size(FIRST_BLOCK, size);

    Ok(arena)
  }

  pub fn capacity(&self) -> u32 {
    self.ram.len() as u32
  }

  /// The whole buffer, headers included.
  pub fn bytes(&self) -> &[u8] {
    &self.ram
  }

  pub(crate) fn payload(
    &self,
    offset: u32,
    len: u32,
  ) -> &[u8] {
    let start = offset as usize;
    &self.ram[start..start + len as usize]
  }

  pub(crate) fn payload_mut(
    &mut self,
    offset: u32,
    len: u32,
  ) -> &mut [u8] {
    let start = offset as usize;
    &mut self.ram[start..start + len as usize]
  }

  pub fn prev(
    &self,
    offset: u32,
  ) -> u32 {
    header::prev(&self.ram, offset)
  }

  pub fn next(
    &self,
    offset: u32,
  ) -> u32 {
    header::next(&self.ram, offset)
  }

  pub fn state(
    &self,
    offset: u32,
  ) -> Option<BlockState> {
    header::state(&self.ram, offset)
  }

  pub fn size(
    &self,
    offset: u32,
  ) -> u32 {
    header::size(&self.ram, offset)
  }

  pub(crate) fn set_prev(
    &mut self,
    offset: u32,
    value: u32,
  ) {
    header::set_prev(&mut self.ram, offset, value);
  }

  pub(crate) fn set_next(
    &mut self,
    offset: u32,
    value: u32,
  ) {
    header::set_next(&mut self.ram, offset, value);
  }

  pub(crate) fn set_state(
    &mut self,
    offset: u32,
    value: BlockState,
  ) {
    header::set_state(&mut self.ram, offset, value);
  }

  pub(crate) fn set_size(
    &mut self,
    offset: u32,
    value: u32,
  ) {
    header::set_size(&mut self.ram, offset, value);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_initial_block() {
    let arena = Arena::new(1024).unwrap();

    assert_eq!(arena.capacity(), 1024);
    assert_eq!(arena.prev(FIRST_BLOCK), 0);
    assert_eq!(arena.next(FIRST_BLOCK), 0);
    assert_eq!(arena.state(FIRST_BLOCK), Some(BlockState::Free));
    assert_eq!(arena.size(FIRST_BLOCK), 1011);
    assert!(arena.bytes()[13..].iter().all(|b| *b == 0));
  }

  #[test]
  fn test_too_small() {
    for capacity in [0, 1, 12, 13] {
      assert!(matches!(
        Arena::new(capacity),
        Err(Error::ConstructionFailure { .. })
      ));
    }

    let arena = Arena::new(14).unwrap();
    assert_eq!(arena.size(FIRST_BLOCK), 1);
  }
}
