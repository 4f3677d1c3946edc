//! # seqfit - A Sequential-Fit Block Allocator
//!
//! This crate manages one fixed-size arena as an in-place list of free and
//! occupied blocks. Allocation is **first-fit** with block splitting;
//! deallocation **coalesces** the released block with free neighbours.
//!
//! ## Overview
//!
//! ```text
//!   Arena (capacity C):
//!
//!   0            13
//!   ┌────────────┬──────────┬────────────┬──────────┬────────────┬──────────────┐
//!   │  header A  │ payload A│  header B  │ payload B│  header C  │  payload C   │
//!   └────────────┴──────────┴────────────┴──────────┴────────────┴──────────────┘
//!                ▲                       ▲                       ▲
//!                │                       │                       │
//!             handle A                handle B                handle C
//!          (OCCUPIED)                  (FREE)               (OCCUPIED)
//!
//!   Blocks are chained in address order through `prev`/`next` offsets.
//!   Offset 0 is never a payload, so it doubles as the "no neighbour" value.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   seqfit
//!   ├── align        - Alignment macros (align!, align_to!)
//!   ├── arena        - Fixed-capacity byte buffer holding every block
//!   ├── backend      - BlockAllocator trait shared by both backends
//!   ├── block        - Handle, BlockState and BlockInfo
//!   ├── config       - Capacity and handle validation settings
//!   ├── diagnostics  - Read-only traversal, stats and structural checks
//!   ├── error        - Error taxonomy
//!   ├── header       - 13-byte header codec
//!   ├── linked       - Pointer-node backend over a calloc'd region
//!   ├── observer     - Event hooks (tracing by default)
//!   └── seq_fit      - SeqFitAllocator, the offset-embedded backend
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use seqfit::SeqFitAllocator;
//!
//! let mut allocator = SeqFitAllocator::new(1024)?;
//!
//! let handle = allocator.allocate(4)?;
//! allocator.payload_mut(handle)?.copy_from_slice(&200u32.to_le_bytes());
//! assert_eq!(allocator.payload(handle)?, &200u32.to_le_bytes());
//!
//! allocator.deallocate(handle)?;
//! assert_eq!(allocator.stats().free_bytes, 1011);
//! # Ok::<(), seqfit::Error>(())
//! ```
//!
//! ## How It Works
//!
//! Every block starts with a 13-byte header, stored right before the payload:
//!
//! ```text
//!   ┌──────────┬──────────┬───────┬──────────┬─────────────────────┐
//!   │ prev u32 │ next u32 │ st u8 │ size u32 │   payload (size)    │
//!   └──────────┴──────────┴───────┴──────────┴─────────────────────┘
//!    -13        -9         -5      -4         ▲ handle
//! ```
//!
//! Allocating `n` bytes walks the chain and takes the first free block with
//! `size >= n`. If the block has at least two headers of slack it is split:
//!
//! ```text
//!   before:  [ FREE size=S                                   ]
//!   after:   [ OCCUPIED size=n ][hdr][ FREE size=S-n-13      ]
//! ```
//!
//! Otherwise the whole block is handed out unchanged. That wastes a few
//! bytes but never fails a request that fits.
//!
//! Freeing a block looks at both neighbours:
//!
//! ```text
//!   O [F] O   ->  O  F  O        freed in place
//!   O [F] F   ->  O  FFFF        next absorbed
//!   F [F] O   ->  FFFF  O        absorbed into prev
//!   F [F] F   ->  FFFFFFF        both absorbed into prev
//! ```
//!
//! so no two adjacent blocks are ever both free after a `deallocate`.
//!
//! ## Observing
//!
//! Splits, split fallbacks, merges and rejected calls are reported through
//! an [`Observer`]. The default [`TracingObserver`] emits `tracing` events;
//! a `Vec<Event>` records them for inspection.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: wrap the allocator in a lock to share it
//! - **Fixed capacity**: the arena never grows or shrinks
//! - **No alignment guarantees** for payloads in the offset-embedded backend
//! - **Best-effort handle checks**: with [`Validation::Heuristic`] a handle
//!   pointing into the middle of a payload can pass if the bytes there look
//!   like a header; [`Validation::Strict`] walks the chain to rule that out

pub mod align;
mod arena;
mod backend;
mod block;
mod config;
pub mod diagnostics;
mod error;
pub mod header;
pub mod linked;
pub mod observer;
mod seq_fit;

pub use arena::Arena;
pub use backend::BlockAllocator;
pub use block::{BlockInfo, BlockState, Handle};
pub use config::{Config, Validation};
pub use diagnostics::Stats;
pub use error::{Error, PointerFault, Result};
pub use linked::LinkedAllocator;
pub use observer::{Event, MergeCase, NoopObserver, Observer, Operation, TracingObserver};
pub use seq_fit::SeqFitAllocator;
