use seqfit::{Handle, SeqFitAllocator};
use tracing_subscriber::EnvFilter;

fn dump(
  label: &str,
  allocator: &SeqFitAllocator,
) {
  println!("\n[{label}]");
  for block in allocator.blocks() {
    println!("  {block}");
  }
}

fn main() -> Result<(), seqfit::Error> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
    .init();

  let mut allocator = SeqFitAllocator::new(1024)?;
  dump("start", &allocator);

  // --------------------------------------------------------------------
  // 1) Allocate space for a u32 and write through the handle.
  // --------------------------------------------------------------------
  let first = allocator.allocate(4)?;
  allocator
    .payload_mut(first)?
    .copy_from_slice(&200u32.to_le_bytes());
  dump("allocate 4", &allocator);

  // --------------------------------------------------------------------
  // 2) Allocate 8 bytes. The free tail is split again.
  // --------------------------------------------------------------------
  let second = allocator.allocate(8)?;
  dump("allocate 8", &allocator);

  // --------------------------------------------------------------------
  // 3) Rejected calls leave the arena alone.
  // --------------------------------------------------------------------
  let _ = allocator.allocate(0);
  let _ = allocator.allocate(4096);
  let _ = allocator.deallocate(Handle::from_offset(5));

  // --------------------------------------------------------------------
  // 4) Free the first block: its right neighbour is occupied, so it is
  //    simply marked free.
  // --------------------------------------------------------------------
  allocator.deallocate(first)?;
  dump("free first", &allocator);

  // --------------------------------------------------------------------
  // 5) Free the second block: both neighbours are free and everything
  //    collapses back into one block.
  // --------------------------------------------------------------------
  allocator.deallocate(second)?;
  dump("free second", &allocator);

  println!("\n{:?}", allocator.stats());
  Ok(())
}
