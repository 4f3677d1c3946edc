//! Pointer-node variant of the sequential-fit allocator.
//!
//! Same first-fit search, split policy and four-way coalescing as
//! [`SeqFitAllocator`](crate::SeqFitAllocator), but each header is a native
//! `Node` holding raw `prev`/`next` pointers, placed in-place inside one
//! region obtained from `calloc`.
//!
//! ```text
//!   region
//!   ┌──────────┬─────────┬──────────┬─────────┬──────────┬──────────────┐
//!   │  Node A  │ payload │  Node B  │ payload │  Node C  │   payload    │
//!   └──────────┴─────────┴──────────┴─────────┴──────────┴──────────────┘
//!        │  ▲               │  ▲  │              ▲  │
//!        │  └───── prev ────┘  │  └── next ──────┘  │
//!        └────── next ─────────┘                    └── next = null
//! ```
//!
//! Handles are still payload offsets from the region start, so callers see
//! the same contract as the offset-embedded backend. Requests are rounded up
//! to the machine word so every node stays aligned.

use std::{marker::PhantomData, mem, ptr::NonNull};

use crate::{
  Error, Handle, PointerFault, Result, align,
  backend::BlockAllocator,
  block::{BlockInfo, BlockState},
  config::Config,
  observer::{Event, MergeCase, Observer, Operation, TracingObserver},
};

#[repr(C)]
struct Node {
  prev: *mut Node,
  next: *mut Node,
  size: u32,
  state: u8,
}

/// Bytes reserved in front of every payload.
pub const NODE_SIZE: u32 = align!(mem::size_of::<Node>()) as u32;

const FREE: u8 = BlockState::Free as u8;
const OCCUPIED: u8 = BlockState::Occupied as u8;

pub struct LinkedAllocator<O: Observer = TracingObserver> {
  region: NonNull<u8>,
  capacity: u32,
  observer: O,
}

impl LinkedAllocator {
  pub fn new(capacity: usize) -> Result<Self> {
    Self::with_observer(Config::new(capacity), TracingObserver)
  }
}

impl<O: Observer> LinkedAllocator<O> {
  /// Handles are always checked by walking the node chain before any
  /// dereference, whatever `config.validation` asks for.
  pub fn with_observer(
    config: Config,
    observer: O,
  ) -> Result<Self> {
    let capacity = config.capacity;
    if capacity <= NODE_SIZE as usize {
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

    let raw = unsafe { libc::calloc(capacity, 1) } as *mut u8;
    let Some(region) = NonNull::new(raw) else {
      return Err(Error::ConstructionFailure {
        capacity,
        reason: "calloc returned null",
      });
    };

    unsafe {
      region.as_ptr().cast::<Node>().write(Node {
        prev: std::ptr::null_mut(),
        next: std::ptr::null_mut(),
        size: capacity as u32 - NODE_SIZE,
        state: FREE,
      });
    }
    tracing::debug!(capacity, region = ?region, "linked arena ready");

    Ok(Self {
      region,
      capacity: capacity as u32,
      observer,
    })
  }

  pub fn capacity(&self) -> u32 {
    self.capacity
  }

  pub fn observer(&self) -> &O {
    &self.observer
  }

  pub fn blocks(&self) -> LinkedBlocks<'_> {
    LinkedBlocks {
      base: self.region.as_ptr(),
      current: self.head(),
      _region: PhantomData,
    }
  }

  fn head(&self) -> *mut Node {
    self.region.as_ptr().cast()
  }

  fn offset_of(
    &self,
    node: *mut Node,
  ) -> u32 {
    offset_of(self.region.as_ptr(), node)
  }

  fn reject<T>(
    &mut self,
    op: Operation,
    error: Error,
  ) -> Result<T> {
    self.observer.on_event(&Event::Rejected { op, error });
    Err(error)
  }

  fn find_free_block(
    &self,
    size: u32,
  ) -> *mut Node {
    let mut current = self.head();

    unsafe {
      while !current.is_null() {
        if (*current).state == FREE && (*current).size >= size {
          return current;
        }
        current = (*current).next;
      }
    }

    std::ptr::null_mut()
  }

  pub fn allocate(
    &mut self,
    size: u32,
  ) -> Result<Handle> {
    if size == 0 {
      return self.reject(Operation::Allocate, Error::InvalidSize);
    }

    // Sizes past u32 saturate; no block can be that large.
    let aligned = u32::try_from(align!(size as usize)).unwrap_or(u32::MAX);
    let node = self.find_free_block(aligned);
    if node.is_null() {
      let largest_free = self
        .blocks()
        .filter(|block| block.state.is_free())
        .map(|block| block.size)
        .max()
        .unwrap_or(0);
      return self.reject(
        Operation::Allocate,
        Error::OutOfMemory {
          requested: aligned,
          largest_free,
        },
      );
    }

    unsafe {
      self.split(node, aligned);
      let handle = self.offset_of(node);
      self.observer.on_event(&Event::Allocated {
        handle,
        requested: size,
        size: (*node).size,
      });
      Ok(Handle::from_offset(handle))
    }
  }

  unsafe fn split(
    &mut self,
    node: *mut Node,
    size: u32,
  ) {
    unsafe {
      let old_size = (*node).size;
      let offset = self.offset_of(node);

      if old_size - size < 2 * NODE_SIZE {
        (*node).state = OCCUPIED;
        self.observer.on_event(&Event::SplitFallback {
          offset,
          requested: size,
          size: old_size,
        });
        return;
      }

      let remainder = node
        .cast::<u8>()
        .add((NODE_SIZE + size) as usize)
        .cast::<Node>();
      let remainder_size = old_size - size - NODE_SIZE;
      remainder.write(Node {
        prev: node,
        next: (*node).next,
        size: remainder_size,
        state: FREE,
      });

      if !(*node).next.is_null() {
        (*(*node).next).prev = remainder;
      }

      (*node).next = remainder;
      (*node).size = size;
      (*node).state = OCCUPIED;

      self.observer.on_event(&Event::Split {
        offset,
        size,
        remainder: self.offset_of(remainder),
        remainder_size,
      });
    }
  }

  pub fn deallocate(
    &mut self,
    handle: Handle,
  ) -> Result<()> {
    let node = match self.find_block(handle) {
      Ok(node) => node,
      Err(error) => return self.reject(Operation::Deallocate, error),
    };

    unsafe {
      let (case, block) = self.merge((*node).prev, node, (*node).next);
      self.observer.on_event(&Event::Freed {
        handle: handle.offset(),
        case,
        block: self.offset_of(block),
        size: (*block).size,
      });
    }

    Ok(())
  }

  /// Resolves `handle` to its occupied node without touching memory that is
  /// not already known to hold one.
  fn find_block(
    &self,
    handle: Handle,
  ) -> Result<*mut Node> {
    let offset = handle.offset();
    let fault = |fault| Error::pointer(offset, fault);

    if handle.is_null() {
      return Err(fault(PointerFault::Null));
    }
    if offset < NODE_SIZE || offset >= self.capacity {
      return Err(fault(PointerFault::OutOfBounds));
    }
    if (offset - NODE_SIZE) as usize % mem::align_of::<Node>() != 0 {
      return Err(fault(PointerFault::Misaligned));
    }

    let mut current = self.head();
    unsafe {
      while !current.is_null() {
        if self.offset_of(current) == offset {
          return match (*current).state {
            OCCUPIED => Ok(current),
            _ => Err(fault(PointerFault::NotOccupied)),
          };
        }
        current = (*current).next;
      }
    }

    Err(fault(PointerFault::NotABlock))
  }

  unsafe fn merge(
    &mut self,
    prev: *mut Node,
    current: *mut Node,
    next: *mut Node,
  ) -> (MergeCase, *mut Node) {
    unsafe {
      let prev_free = !prev.is_null() && (*prev).state == FREE;
      let next_free = !next.is_null() && (*next).state == FREE;

      (*current).state = FREE;

      match (prev_free, next_free) {
        (false, false) => (MergeCase::Isolated, current),
        (false, true) => {
          (*current).size += NODE_SIZE + (*next).size;
          link(current, (*next).next);
          (MergeCase::AbsorbNext, current)
        }
        (true, false) => {
          (*prev).size += NODE_SIZE + (*current).size;
          link(prev, next);
          (MergeCase::IntoPrev, prev)
        }
        (true, true) => {
          (*prev).size += NODE_SIZE + (*current).size + NODE_SIZE + (*next).size;
          link(prev, (*next).next);
          (MergeCase::Both, prev)
        }
      }
    }
  }

  pub fn payload(
    &self,
    handle: Handle,
  ) -> Result<&[u8]> {
    let node = self.find_block(handle)?;
    unsafe {
      let data = node.cast::<u8>().add(NODE_SIZE as usize);
      Ok(std::slice::from_raw_parts(data, (*node).size as usize))
    }
  }

  pub fn payload_mut(
    &mut self,
    handle: Handle,
  ) -> Result<&mut [u8]> {
    let node = self.find_block(handle)?;
    unsafe {
      let data = node.cast::<u8>().add(NODE_SIZE as usize);
      Ok(std::slice::from_raw_parts_mut(data, (*node).size as usize))
    }
  }
}

unsafe fn link(
  node: *mut Node,
  next: *mut Node,
) {
  unsafe {
    (*node).next = next;
    if !next.is_null() {
      (*next).prev = node;
    }
  }
}

fn offset_of(
  base: *const u8,
  node: *const Node,
) -> u32 {
  if node.is_null() {
    return 0;
  }
  (node as usize - base as usize) as u32 + NODE_SIZE
}

impl<O: Observer> Drop for LinkedAllocator<O> {
  fn drop(&mut self) {
    unsafe { libc::free(self.region.as_ptr().cast()) };
  }
}

/// Address-ordered walk over a [`LinkedAllocator`]'s nodes.
pub struct LinkedBlocks<'a> {
  base: *const u8,
  current: *const Node,
  _region: PhantomData<&'a [u8]>,
}

impl Iterator for LinkedBlocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    if self.current.is_null() {
      return None;
    }

    let node = unsafe { &*self.current };
    let info = BlockInfo {
      offset: offset_of(self.base, self.current),
      size: node.size,
      state: BlockState::from_byte(node.state)?,
      prev: offset_of(self.base, node.prev),
      next: offset_of(self.base, node.next),
    };
    self.current = node.next;

    Some(info)
  }
}

impl<O: Observer> BlockAllocator for LinkedAllocator<O> {
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
    self.capacity
  }

  fn header_size(&self) -> u32 {
    NODE_SIZE
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostics::verify;

  const H: u32 = NODE_SIZE;

  fn recording(capacity: usize) -> LinkedAllocator<Vec<Event>> {
    LinkedAllocator::with_observer(Config::new(capacity), Vec::new()).unwrap()
  }

  fn layout<O: Observer>(allocator: &LinkedAllocator<O>) -> Vec<(u32, u32, BlockState)> {
    allocator
      .blocks()
      .map(|block| (block.offset, block.size, block.state))
      .collect()
  }

  #[test]
  fn test_node_size() {
    assert_eq!(NODE_SIZE as usize % mem::align_of::<Node>(), 0);
    assert!(NODE_SIZE as usize >= mem::size_of::<Node>());
  }

  #[test]
  fn test_walkthrough() {
    let mut allocator = recording(1024);
    let word = align!(4usize) as u32;

    let first = allocator.allocate(4).unwrap();
    let second = allocator.allocate(8).unwrap();
    assert_eq!(first.offset(), H);
    assert_eq!(second.offset(), H + word + H);
    assert_eq!(
      layout(&allocator),
      vec![
        (H, word, BlockState::Occupied),
        (second.offset(), 8, BlockState::Occupied),
        (second.offset() + 8 + H, 1024 - 3 * H - word - 8, BlockState::Free),
      ]
    );
    verify(allocator.blocks(), 1024, H).unwrap();

    allocator.deallocate(first).unwrap();
    allocator.deallocate(second).unwrap();
    assert_eq!(layout(&allocator), vec![(H, 1024 - H, BlockState::Free)]);

    let cases: Vec<_> = allocator
      .observer()
      .iter()
      .filter_map(|event| match event {
        Event::Freed { case, .. } => Some(*case),
        _ => None,
      })
      .collect();
    assert_eq!(cases, vec![MergeCase::Isolated, MergeCase::Both]);
  }

  #[test]
  fn test_merge_cases() {
    let mut allocator = recording(1024);

    let a = allocator.allocate(16).unwrap();
    let b = allocator.allocate(16).unwrap();
    let c = allocator.allocate(16).unwrap();

    allocator.deallocate(a).unwrap();
    allocator.deallocate(b).unwrap();
    assert_eq!(layout(&allocator)[0], (H, 16 + H + 16, BlockState::Free));
    verify(allocator.blocks(), 1024, H).unwrap();

    allocator.deallocate(c).unwrap();
    assert_eq!(layout(&allocator), vec![(H, 1024 - H, BlockState::Free)]);

    let cases: Vec<_> = allocator
      .observer()
      .iter()
      .filter_map(|event| match event {
        Event::Freed { case, .. } => Some(*case),
        _ => None,
      })
      .collect();
    assert_eq!(
      cases,
      vec![MergeCase::Isolated, MergeCase::IntoPrev, MergeCase::Both]
    );
  }

  #[test]
  fn test_rejected_handles() {
    let mut allocator = recording(1024);
    let a = allocator.allocate(32).unwrap();

    assert_eq!(
      allocator.deallocate(Handle::NULL),
      Err(Error::pointer(0, PointerFault::Null))
    );
    assert_eq!(
      allocator.deallocate(Handle::from_offset(H + 1)),
      Err(Error::pointer(H + 1, PointerFault::Misaligned))
    );
    assert_eq!(
      allocator.deallocate(Handle::from_offset(H + 16)),
      Err(Error::pointer(H + 16, PointerFault::NotABlock))
    );
    assert_eq!(
      allocator.deallocate(Handle::from_offset(2048)),
      Err(Error::pointer(2048, PointerFault::OutOfBounds))
    );

    allocator.deallocate(a).unwrap();
    assert_eq!(
      allocator.deallocate(a),
      Err(Error::pointer(a.offset(), PointerFault::NotOccupied))
    );
  }

  #[test]
  fn test_payload() {
    let mut allocator = recording(256);

    let a = allocator.allocate(3).unwrap();
    allocator.payload_mut(a).unwrap()[..3].copy_from_slice(b"abc");

    assert_eq!(&allocator.payload(a).unwrap()[..3], b"abc");
    assert_eq!(allocator.payload(a).unwrap().len(), align!(3usize));
  }

  #[test]
  fn test_out_of_memory_reports_rounded_size() {
    let word = align!(1usize) as u32;
    let mut allocator = recording((H + 2 * word + 1) as usize);

    assert_eq!(
      allocator.allocate(2 * word + 1),
      Err(Error::OutOfMemory {
        requested: 3 * word,
        largest_free: 2 * word + 1,
      })
    );
    assert_eq!(layout(&allocator), vec![(H, 2 * word + 1, BlockState::Free)]);
  }

  #[test]
  fn test_construction_failure() {
    assert!(matches!(
      LinkedAllocator::new(NODE_SIZE as usize),
      Err(Error::ConstructionFailure { .. })
    ));
  }
}
