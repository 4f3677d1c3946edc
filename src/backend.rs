use crate::{Handle, Result, block::BlockInfo};

/// The contract shared by every allocator backend.
///
/// Handles are payload offsets measured from the start of the backend's
/// region, so the same sequence of calls can be replayed against any backend
/// and compared block by block (modulo `header_size`).
pub trait BlockAllocator {
  /// First-fit allocation of `size` payload bytes.
  fn allocate(
    &mut self,
    size: u32,
  ) -> Result<Handle>;

  /// Frees `handle`, coalescing it with free neighbours.
  fn deallocate(
    &mut self,
    handle: Handle,
  ) -> Result<()>;

  /// Blocks in address order, first to last.
  fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_;

  /// Total bytes under management, headers included.
  fn capacity(&self) -> u32;

  /// Bytes of metadata in front of every payload.
  fn header_size(&self) -> u32;
}
