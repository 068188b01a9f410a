/*!

  The machine's atomic value is a 32-bit word. A word has no intrinsic type:
  the arithmetic opcodes choose a view of it (signed integer, unsigned
  integer, IEEE-754 single float, or four little-endian bytes), and transfer
  between views is a pure reinterpretation of the bits. The views live here
  as free functions over a single `u32` rather than as overlapping-field
  structs, so there is exactly one canonical representation.

*/

// If you change this you must also change the encode and decode functions of
// everything that serializes to words.
pub type Word = u32;

/// The signed-integer view of a word.
pub fn signed(w: Word) -> i32 {
  w as i32
}

/// A word holding the bits of a signed integer.
pub fn from_signed(v: i32) -> Word {
  v as Word
}

/// The float view of a word.
pub fn float(w: Word) -> f32 {
  f32::from_bits(w)
}

/// A word holding the bits of a float.
pub fn from_float(v: f32) -> Word {
  v.to_bits()
}

/// The four-byte view. Byte 0 is the least significant byte.
pub fn bytes(w: Word) -> [u8; 4] {
  w.to_le_bytes()
}

/// A word assembled from four little-endian bytes.
pub fn from_bytes(b: [u8; 4]) -> Word {
  Word::from_le_bytes(b)
}
