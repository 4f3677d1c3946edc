//! Byte layout of the in-arena block header.
//!
//! ```text
//!   |0   3| |4   7| | 8 | |9  12| |13 .. n|
//!   [prev ] [next ] [st ] [size ] [payload]
//!     u32     u32    u8    u32
//! ```
//!
//! Every field is addressed relative to the payload start of the block it
//! describes, so a block is named by a single offset.

use byteorder::{ByteOrder, LittleEndian};

use crate::block::BlockState;

/// Bytes of metadata in front of every payload.
pub const HEADER_SIZE: u32 = 13;

/// Payload offset of the first block. Its header fills the low region.
pub const FIRST_BLOCK: u32 = HEADER_SIZE;

const PREV: usize = 13;
const NEXT: usize = 9;
const STATE: usize = 5;
const SIZE: usize = 4;

fn field(
  offset: u32,
  back: usize,
) -> usize {
  offset as usize - back
}

pub fn prev(
  buf: &[u8],
  offset: u32,
) -> u32 {
  let at = field(offset, PREV);
  LittleEndian::read_u32(&buf[at..at + 4])
}

pub fn next(
  buf: &[u8],
  offset: u32,
) -> u32 {
  let at = field(offset, NEXT);
  LittleEndian::read_u32(&buf[at..at + 4])
}

/// Raw state byte; anything other than 0 or 1 means the header is damaged.
pub fn state_byte(
  buf: &[u8],
  offset: u32,
) -> u8 {
  buf[field(offset, STATE)]
}

pub fn state(
  buf: &[u8],
  offset: u32,
) -> Option<BlockState> {
  BlockState::from_byte(state_byte(buf, offset))
}

pub fn size(
  buf: &[u8],
  offset: u32,
) -> u32 {
  let at = field(offset, SIZE);
  LittleEndian::read_u32(&buf[at..at + 4])
}

pub fn set_prev(
  buf: &mut [u8],
  offset: u32,
  value: u32,
) {
  let at = field(offset, PREV);
  LittleEndian::write_u32(&mut buf[at..at + 4], value);
}

pub fn set_next(
  buf: &mut [u8],
  offset: u32,
  value: u32,
) {
  let at = field(offset, NEXT);
  LittleEndian::write_u32(&mut buf[at..at + 4], value);
}

pub fn set_state(
  buf: &mut [u8],
  offset: u32,
  value: BlockState,
) {
  buf[field(offset, STATE)] = value.as_byte();
}

pub fn set_size(
  buf: &mut [u8],
  offset: u32,
  value: u32,
) {
  let at = field(offset, SIZE);
  LittleEndian::write_u32(&mut buf[at..at + 4], value);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_field_positions() {
    let mut buf = vec![0u8; 32];

    set_prev(&mut buf, 13, 0x0403_0201);
    set_next(&mut buf, 13, 0x0807_0605);
    set_state(&mut buf, 13, BlockState::Occupied);
    set_size(&mut buf, 13, 0x0d0c_0b0a);

    assert_eq!(
      &buf[..13],
      &[1, 2, 3, 4, 5, 6, 7, 8, 1, 0x0a, 0x0b, 0x0c, 0x0d]
    );
    assert_eq!(prev(&buf, 13), 0x0403_0201);
    assert_eq!(next(&buf, 13), 0x0807_0605);
    assert_eq!(state(&buf, 13), Some(BlockState::Occupied));
    assert_eq!(size(&buf, 13), 0x0d0c_0b0a);
  }

  #[test]
  fn test_payload_untouched() {
    let mut buf = vec![0xAAu8; 40];

    set_size(&mut buf, 26, 99);
    set_state(&mut buf, 26, BlockState::Free);

    assert!(buf[26..].iter().all(|b| *b == 0xAA));
    assert_eq!(state(&buf, 26), Some(BlockState::Free));
  }

  #[test]
  fn test_damaged_state() {
    let mut buf = vec![0u8; 13];
    buf[8] = 9;

    assert_eq!(state(&buf, 13), None);
    assert_eq!(state_byte(&buf, 13), 9);
  }
}
