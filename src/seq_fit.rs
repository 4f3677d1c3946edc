use crate::{
  Error, Handle, PointerFault, Result,
  arena::Arena,
  backend::BlockAllocator,
  block::{BlockInfo, BlockState},
  config::{Config, Validation},
  diagnostics::{Blocks, Stats},
  header::{FIRST_BLOCK, HEADER_SIZE},
  observer::{Event, MergeCase, Observer, Operation, TracingObserver},
};

/// Sequential-fit allocator over a single [`Arena`].
///
/// Blocks form a doubly linked list threaded through their in-arena headers.
/// Allocation takes the first free block that is large enough and splits it
/// when the leftover can hold another header plus a useful payload.
/// Deallocation coalesces the freed block with any free neighbour.
pub struct SeqFitAllocator<O: Observer = TracingObserver> {
  arena: Arena,
  validation: Validation,
  observer: O,
}

impl SeqFitAllocator {
  pub fn new(capacity: usize) -> Result<Self> {
    Self::with_config(Config::new(capacity))
  }

  pub fn with_config(config: Config) -> Result<Self> {
    Self::with_observer(config, TracingObserver)
  }
}

impl<O: Observer> SeqFitAllocator<O> {
  pub fn with_observer(
    config: Config,
    observer: O,
  ) -> Result<Self> {
    let arena = Arena::new(config.capacity)?;
    tracing::debug!(capacity = config.capacity, "arena ready");

    Ok(Self {
      arena,
      validation: config.validation,
      observer,
    })
  }

  pub fn arena(&self) -> &Arena {
    &self.arena
  }

  pub fn capacity(&self) -> u32 {
    self.arena.capacity()
  }

  pub fn observer(&self) -> &O {
    &self.observer
  }

  pub fn observer_mut(&mut self) -> &mut O {
    &mut self.observer
  }

  pub fn blocks(&self) -> Blocks<'_> {
    Blocks::new(&self.arena)
  }

  pub fn stats(&self) -> Stats {
    Stats::collect(self.blocks())
  }

  fn find_free_block(
    &self,
    size: u32,
  ) -> Option<u32> {
    self
      .blocks()
      .find(|block| block.state.is_free() && block.size >= size)
      .map(|block| block.offset)
  }

  fn reject<T>(
    &mut self,
    op: Operation,
    error: Error,
  ) -> Result<T> {
    self.observer.on_event(&Event::Rejected { op, error });
    Err(error)
  }

  /// Hands out the first free block with at least `size` payload bytes.
  ///
  /// The returned block may be larger than requested when splitting it would
  /// leave too little room for another block.
  pub fn allocate(
    &mut self,
    size: u32,
  ) -> Result<Handle> {
    if size == 0 {
      return self.reject(Operation::Allocate, Error::InvalidSize);
    }

    let Some(offset) = self.find_free_block(size) else {
      let largest_free = self.stats().largest_free;
      return self.reject(
        Operation::Allocate,
        Error::OutOfMemory {
          requested: size,
          largest_free,
        },
      );
    };

    self.split(offset, size);
    self.observer.on_event(&Event::Allocated {
      handle: offset,
      requested: size,
      size: self.arena.size(offset),
    });

    Ok(Handle::from_offset(offset))
  }

  /// Marks the free block at `offset` occupied, carving off the tail as a
  /// new free block when at least two headers' worth of slack remains.
  fn split(
    &mut self,
    offset: u32,
    size: u32,
  ) {
    let old_size = self.arena.size(offset);

    if old_size - size < 2 * HEADER_SIZE {
      self.arena.set_state(offset, BlockState::Occupied);
      self.observer.on_event(&Event::SplitFallback {
        offset,
        requested: size,
        size: old_size,
      });
      return;
    }

    let old_next = self.arena.next(offset);
    let remainder = offset + size + HEADER_SIZE;
    let remainder_size = old_size - size - HEADER_SIZE;

    self.arena.set_prev(remainder, offset);
    self.arena.set_next(remainder, old_next);
    self.arena.set_state(remainder, BlockState::Free);
    self.arena.set_size(remainder, remainder_size);

    if old_next != 0 {
      self.arena.set_prev(old_next, remainder);
    }

    self.arena.set_next(offset, remainder);
    self.arena.set_state(offset, BlockState::Occupied);
    self.arena.set_size(offset, size);

    self.observer.on_event(&Event::Split {
      offset,
      size,
      remainder,
      remainder_size,
    });
  }

  /// Releases an occupied block and merges it with free neighbours.
  ///
  /// Rejected handles leave the arena untouched. After a successful call the
  /// handle is dead; it may also have been absorbed into its predecessor.
  pub fn deallocate(
    &mut self,
    handle: Handle,
  ) -> Result<()> {
    let offset = match self
      .check(handle)
      .and_then(|offset| self.check_neighbours(offset).map(|()| offset))
    {
      Ok(offset) => offset,
      Err(error) => return self.reject(Operation::Deallocate, error),
    };

    let prev = self.arena.prev(offset);
    let next = self.arena.next(offset);
    let (case, block) = self.merge(prev, offset, next);

    self.observer.on_event(&Event::Freed {
      handle: offset,
      case,
      block,
      size: self.arena.size(block),
    });

    Ok(())
  }

  /// Validates `handle` as an occupied block and returns its offset.
  fn check(
    &self,
    handle: Handle,
  ) -> Result<u32> {
    let offset = handle.offset();
    let capacity = self.arena.capacity();
    let fault = |fault| Error::pointer(offset, fault);

    if handle.is_null() {
      return Err(fault(PointerFault::Null));
    }
    if offset < FIRST_BLOCK || offset >= capacity {
      return Err(fault(PointerFault::OutOfBounds));
    }
    if self.validation == Validation::Strict && !self.blocks().any(|block| block.offset == offset) {
      return Err(fault(PointerFault::NotABlock));
    }

    match self.arena.state(offset) {
      Some(BlockState::Occupied) => {}
      Some(BlockState::Free) => return Err(fault(PointerFault::NotOccupied)),
      None => return Err(fault(PointerFault::CorruptHeader)),
    }

    let prev = self.arena.prev(offset);
    let next = self.arena.next(offset);
    let size = self.arena.size(offset);

    let bad_prev = prev != 0 && (prev >= offset || prev < FIRST_BLOCK);
    let bad_next = next != 0 && (next >= capacity || next <= offset);
    if bad_prev || bad_next || size == 0 || size >= capacity || !self.spans_cleanly(offset) {
      return Err(fault(PointerFault::CorruptHeader));
    }

    Ok(offset)
  }

  /// Rejects neighbours whose headers would send `merge` outside the arena.
  ///
  /// Runs before any write, so a refused handle leaves the arena untouched.
  fn check_neighbours(
    &self,
    offset: u32,
  ) -> Result<()> {
    let corrupt = Err(Error::pointer(offset, PointerFault::CorruptHeader));
    let prev = self.arena.prev(offset);
    let next = self.arena.next(offset);

    if prev != 0 {
      match self.arena.state(prev) {
        None => return corrupt,
        Some(BlockState::Free) if self.arena.next(prev) != offset || !self.spans_cleanly(prev) => {
          return corrupt;
        }
        Some(_) => {}
      }
    }
    if next != 0 {
      match self.arena.state(next) {
        None => return corrupt,
        Some(BlockState::Free) if !self.spans_cleanly(next) => return corrupt,
        Some(_) => {}
      }
    }

    Ok(())
  }

  /// True when `block`'s payload fits the arena and its `next`, if any,
  /// starts right after it.
  fn spans_cleanly(
    &self,
    block: u32,
  ) -> bool {
    let capacity = u64::from(self.arena.capacity());
    let end = u64::from(block) + u64::from(self.arena.size(block));
    let next = self.arena.next(block);

    end <= capacity
      && (next == 0 || (u64::from(next) == end + u64::from(HEADER_SIZE) && u64::from(next) < capacity))
  }

  /// Frees `current` and coalesces it with whichever neighbours are free.
  ///
  /// A `0` neighbour is absent and never merged. Returns the merge outcome
  /// and the offset of the block that now holds the freed bytes.
  ///
  /// ```text
  ///   prev  next    result
  ///   O/-   O/-     [P] F [N]         current freed in place
  ///   O/-   F       [P] F+N           next absorbed into current
  ///   F     O/-     P+F [N]           current absorbed into prev
  ///   F     F       P+F+N             both absorbed into prev
  /// ```
  fn merge(
    &mut self,
    prev: u32,
    current: u32,
    next: u32,
  ) -> (MergeCase, u32) {
    let prev_free = prev != 0 && self.arena.state(prev) == Some(BlockState::Free);
    let next_free = next != 0 && self.arena.state(next) == Some(BlockState::Free);

    // Absorbed headers keep a Free state so a stale handle reads as a double free.
    self.arena.set_state(current, BlockState::Free);

    match (prev_free, next_free) {
      (false, false) => (MergeCase::Isolated, current),
      (false, true) => {
        let size = self.arena.size(current) + HEADER_SIZE + self.arena.size(next);
        self.arena.set_size(current, size);
        self.link(current, self.arena.next(next));
        (MergeCase::AbsorbNext, current)
      }
      (true, false) => {
        let size = self.arena.size(prev) + HEADER_SIZE + self.arena.size(current);
        self.arena.set_size(prev, size);
        self.link(prev, next);
        (MergeCase::IntoPrev, prev)
      }
      (true, true) => {
        let size = self.arena.size(prev)
          + HEADER_SIZE
          + self.arena.size(current)
          + HEADER_SIZE
          + self.arena.size(next);
        self.arena.set_size(prev, size);
        self.link(prev, self.arena.next(next));
        (MergeCase::Both, prev)
      }
    }
  }

  /// Makes `next` follow `block`, repointing `next` back when it exists.
  fn link(
    &mut self,
    block: u32,
    next: u32,
  ) {
    self.arena.set_next(block, next);
    if next != 0 {
      self.arena.set_prev(next, block);
    }
  }

  /// Payload bytes of an occupied block.
  pub fn payload(
    &self,
    handle: Handle,
  ) -> Result<&[u8]> {
    let offset = self.check(handle)?;
    Ok(self.arena.payload(offset, self.arena.size(offset)))
  }

  pub fn payload_mut(
    &mut self,
    handle: Handle,
  ) -> Result<&mut [u8]> {
    let offset = self.check(handle)?;
    let size = self.arena.size(offset);
    Ok(self.arena.payload_mut(offset, size))
  }
}

impl<O: Observer> BlockAllocator for SeqFitAllocator<O> {
  fn allocate(
    &mut self,
    size: u32,
  ) -> Result<Handle> {
    Self::allocate(self, size)
  }

  fn deallocate(
    &mut self,
    handle: Handle,
  ) -> Result<()> {
    Self::deallocate(self, handle)
  }

  fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    Self::blocks(self)
  }

  fn capacity(&self) -> u32 {
    Self::capacity(self)
  }

  fn header_size(&self) -> u32 {
    HEADER_SIZE
  }
}
