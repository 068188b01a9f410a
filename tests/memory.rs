//! Memory-subsystem tests: little-endian round trips across the whole
//! vector, peripheral-window routing, and the byte-access semantics of
//! the device interface.

use petrel::memory::Memory;
use petrel::peripheral::{Access, NullDevice, ScratchDevice};
use petrel::word::Word;

const BASE: Word = 0x8000_0000;

fn plain(size: usize) -> Memory {
  Memory::new(size, BASE, Box::new(NullDevice))
}

#[test]
fn every_in_range_address_round_trips() {
  let size = 64;
  let mut memory = plain(size);
  for address in 0..=(size as Word - 4) {
    let value = 0x0101_0101u32.wrapping_mul(address + 1) ^ 0xA5A5_5A5A;
    memory.write_word(address, value).unwrap();
    assert_eq!(memory.read_word(address).unwrap(), value);
  }
}

#[test]
fn byte_writes_land_little_endian_inside_words() {
  let mut memory = plain(8);
  memory.write_word(0, 0x1122_3344).unwrap();
  memory.write_byte(1, 0xAA).unwrap();
  assert_eq!(memory.read_word(0).unwrap(), 0x1122_AA44);
}

#[test]
fn the_window_routes_to_the_peripheral() {
  let device = ScratchDevice::new();
  let mut memory = Memory::new(16, BASE, Box::new(device.clone()));

  memory.write_word(BASE + 8, 0xFEED_FACE).unwrap();
  assert_eq!(memory.read_word(BASE + 8).unwrap(), 0xFEED_FACE);

  // Below the base, the byte vector answers instead.
  memory.write_word(0, 123).unwrap();
  assert_eq!(device.cell(0), 0);
  assert_eq!(
    device.log(),
    vec![
      Access::Write(BASE + 8, 0xFEED_FACE),
      Access::Read(BASE + 8),
    ]
  );
}

#[test]
fn peripheral_byte_access_is_widened_to_words() {
  let device = ScratchDevice::new();
  let mut memory = Memory::new(16, BASE, Box::new(device.clone()));

  // A byte write reaches the device zero-extended.
  memory.write_byte(BASE + 4, 0xAB).unwrap();
  assert_eq!(device.cell(BASE + 4), 0xAB);

  // A byte read takes the low byte of the device's word.
  memory.write_word(BASE + 4, 0xDEAD_BEEF).unwrap();
  assert_eq!(memory.read_byte(BASE + 4).unwrap(), 0xEF);
}

#[test]
fn out_of_range_accesses_fault_without_panicking() {
  let mut memory = plain(8);
  assert!(memory.read_word(6).is_err());
  assert!(memory.write_word(6, 1).is_err());
  assert!(memory.read_byte(8).is_err());
  assert!(memory.write_byte(8, 1).is_err());

  // The gap between the vector end and the window base is all fault.
  assert!(memory.read_word(0x7FFF_FFFF).is_err());
  assert!(memory.read_word(BASE).is_ok());
}

#[test]
fn wipe_zeroes_the_vector_but_not_the_device() {
  let device = ScratchDevice::new();
  let mut memory = Memory::new(8, BASE, Box::new(device.clone()));
  memory.write_word(0, 42).unwrap();
  memory.write_word(BASE, 43).unwrap();

  memory.wipe();
  assert_eq!(memory.read_word(0).unwrap(), 0);
  assert_eq!(device.cell(BASE), 43);
}
