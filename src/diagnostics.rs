//! Read-only views over the block list.
//!
//! Nothing here mutates an arena. Traversals are bounded so a damaged chain
//! ends the walk instead of looping.

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
  arena::Arena,
  block::{BlockInfo, BlockState},
  header::{FIRST_BLOCK, HEADER_SIZE},
};

/// Walks an [`Arena`] from the first block to the last.
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
  arena: &'a Arena,
  current: u32,
  budget: u32,
}

impl<'a> Blocks<'a> {
  pub fn new(arena: &'a Arena) -> Self {
    Self {
      arena,
      current: FIRST_BLOCK,
      budget: arena.capacity() / HEADER_SIZE + 1,
    }
  }
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let offset = self.current;
    if offset < FIRST_BLOCK || offset >= self.arena.capacity() || self.budget == 0 {
      return None;
    }
    self.budget -= 1;

    let state = self.arena.state(offset)?;
    let next = self.arena.next(offset);
    // 0 terminates the chain; a backwards link would cycle.
    self.current = if next > offset { next } else { 0 };

    Some(BlockInfo {
      offset,
      size: self.arena.size(offset),
      state,
      prev: self.arena.prev(offset),
      next,
    })
  }
}

/// Aggregate occupancy figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stats {
  pub blocks: usize,
  pub free_blocks: usize,
  pub free_bytes: u64,
  pub occupied_bytes: u64,
  pub largest_free: u32,
}

impl Stats {
  pub fn collect(blocks: impl IntoIterator<Item = BlockInfo>) -> Self {
    blocks.into_iter().fold(Stats::default(), |mut stats, block| {
      stats.blocks += 1;
      match block.state {
        BlockState::Free => {
          stats.free_blocks += 1;
          stats.free_bytes += u64::from(block.size);
          stats.largest_free = stats.largest_free.max(block.size);
        }
        BlockState::Occupied => stats.occupied_bytes += u64::from(block.size),
      }
      stats
    })
  }
}

/// A structural rule the block list broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
  #[error("block list is empty")]
  Empty,
  #[error("first block sits at {offset} instead of {expected}")]
  FirstBlock { offset: u32, expected: u32 },
  #[error("block {offset} has prev {found}, expected {expected}")]
  BrokenPrev {
    offset: u32,
    found: u32,
    expected: u32,
  },
  #[error("block {offset} has next {found}, expected {expected}")]
  BrokenNext {
    offset: u32,
    found: u32,
    expected: u32,
  },
  #[error("blocks {first} and {second} are adjacent and both free")]
  Uncoalesced { first: u32, second: u32 },
  #[error("blocks account for {accounted} bytes, expected {expected}")]
  Conservation { accounted: u64, expected: u64 },
}

/// Checks ordering, link symmetry, coalescing and byte conservation.
///
/// `header_size` is the per-block metadata size of the backend that produced
/// `blocks`; the first block's header is the reserved low region.
pub fn verify(
  blocks: impl IntoIterator<Item = BlockInfo>,
  capacity: u32,
  header_size: u32,
) -> Result<(), Violation> {
  let mut blocks = blocks.into_iter().peekable();
  let first = blocks.peek().copied().ok_or(Violation::Empty)?;

  if first.offset != header_size {
    return Err(Violation::FirstBlock {
      offset: first.offset,
      expected: header_size,
    });
  }

  let mut expected_prev = 0;
  let mut accounted = 0u64;
  let mut previous: Option<BlockInfo> = None;

  while let Some(block) = blocks.next() {
    if block.prev != expected_prev {
      return Err(Violation::BrokenPrev {
        offset: block.offset,
        found: block.prev,
        expected: expected_prev,
      });
    }

    let expected_next = match blocks.peek() {
      Some(_) => block.offset + block.size + header_size,
      None => 0,
    };
    if block.next != expected_next {
      return Err(Violation::BrokenNext {
        offset: block.offset,
        found: block.next,
        expected: expected_next,
      });
    }

    if let Some(before) = previous {
      if before.state.is_free() && block.state.is_free() {
        return Err(Violation::Uncoalesced {
          first: before.offset,
          second: block.offset,
        });
      }
      accounted += u64::from(header_size);
    }
    accounted += u64::from(block.size);

    expected_prev = block.offset;
    previous = Some(block);
  }

  let expected = u64::from(capacity - header_size);
  if accounted != expected {
    return Err(Violation::Conservation { accounted, expected });
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn block(
    offset: u32,
    size: u32,
    state: BlockState,
    prev: u32,
    next: u32,
  ) -> BlockInfo {
    BlockInfo {
      offset,
      size,
      state,
      prev,
      next,
    }
  }

  #[test]
  fn test_fresh_arena() {
    let arena = Arena::new(64).unwrap();
    let blocks: Vec<_> = Blocks::new(&arena).collect();

    assert_eq!(blocks, vec![block(13, 51, BlockState::Free, 0, 0)]);
    assert_eq!(verify(blocks, 64, HEADER_SIZE), Ok(()));
  }

  #[test]
  fn test_stats() {
    let blocks = [
      block(13, 4, BlockState::Occupied, 0, 30),
      block(30, 8, BlockState::Free, 13, 51),
      block(51, 20, BlockState::Occupied, 30, 84),
      block(84, 30, BlockState::Free, 51, 0),
    ];
    let stats = Stats::collect(blocks);

    assert_eq!(stats.blocks, 4);
    assert_eq!(stats.free_blocks, 2);
    assert_eq!(stats.free_bytes, 38);
    assert_eq!(stats.occupied_bytes, 24);
    assert_eq!(stats.largest_free, 30);
  }

  #[test]
  fn test_violations() {
    let adjacent_free = [
      block(13, 4, BlockState::Free, 0, 30),
      block(30, 81, BlockState::Free, 13, 0),
    ];
    assert_eq!(
      verify(adjacent_free, 124, HEADER_SIZE),
      Err(Violation::Uncoalesced {
        first: 13,
        second: 30
      })
    );

    let bad_prev = [
      block(13, 4, BlockState::Occupied, 0, 30),
      block(30, 81, BlockState::Free, 0, 0),
    ];
    assert_eq!(
      verify(bad_prev, 124, HEADER_SIZE),
      Err(Violation::BrokenPrev {
        offset: 30,
        found: 0,
        expected: 13
      })
    );

    let leaked = [block(13, 50, BlockState::Free, 0, 0)];
    assert_eq!(
      verify(leaked, 124, HEADER_SIZE),
      Err(Violation::Conservation {
        accounted: 50,
        expected: 111
      })
    );

    assert_eq!(verify([], 124, HEADER_SIZE), Err(Violation::Empty));
  }

  #[test]
  fn test_walk_stops_on_backward_link() {
    let mut arena = Arena::new(64).unwrap();
    arena.set_next(FIRST_BLOCK, FIRST_BLOCK);

    assert_eq!(Blocks::new(&arena).count(), 1);
  }
}
