//! Event hooks fired by the allocators.
//!
//! Allocators never print. Anything worth reporting is handed to an
//! [`Observer`] as an [`Event`]; the default observer forwards to `tracing`.

use tracing::{debug, warn};

use crate::Error;

/// Which neighbours a freed block was coalesced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeCase {
  /// Neither neighbour was free; the block just changed state.
  Isolated,
  /// The following free block was absorbed into the freed one.
  AbsorbNext,
  /// The freed block was absorbed into the preceding free block.
  IntoPrev,
  /// Freed block and its successor were both absorbed into the predecessor.
  Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Allocate,
  Deallocate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  /// `allocate` succeeded. `size` is the recorded block size.
  Allocated { handle: u32, requested: u32, size: u32 },
  /// The chosen block was carved into an occupied prefix and a free suffix.
  Split {
    offset: u32,
    size: u32,
    remainder: u32,
    remainder_size: u32,
  },
  /// Not enough slack to carve a second block; the whole block was handed out.
  SplitFallback { offset: u32, requested: u32, size: u32 },
  /// `deallocate` succeeded. `block`/`size` describe the resulting free block.
  Freed {
    handle: u32,
    case: MergeCase,
    block: u32,
    size: u32,
  },
  Rejected { op: Operation, error: Error },
}

pub trait Observer {
  fn on_event(
    &mut self,
    event: &Event,
  );
}

/// Forwards events to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
  fn on_event(
    &mut self,
    event: &Event,
  ) {
    match *event {
      Event::Allocated {
        handle,
        requested,
        size,
      } => debug!(handle, requested, size, "allocated"),
      Event::Split {
        offset,
        size,
        remainder,
        remainder_size,
      } => debug!(offset, size, remainder, remainder_size, "split block"),
      Event::SplitFallback {
        offset,
        requested,
        size,
      } => warn!(offset, requested, size, "failed to split, handing out whole block"),
      Event::Freed {
        handle,
        case,
        block,
        size,
      } => debug!(handle, ?case, block, size, "freed"),
      Event::Rejected { op, error } => warn!(?op, %error, "operation rejected"),
    }
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
  fn on_event(
    &mut self,
    _event: &Event,
  ) {
  }
}

/// Records every event in order.
impl Observer for Vec<Event> {
  fn on_event(
    &mut self,
    event: &Event,
  ) {
    self.push(*event);
  }
}

impl<O: Observer + ?Sized> Observer for &mut O {
  fn on_event(
    &mut self,
    event: &Event,
  ) {
    (**self).on_event(event);
  }
}
