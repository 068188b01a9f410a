//! Property tests over the instruction-word packing: whatever the encoder
//! emits, the decoder reads back, and the sentinel always announces an
//! extension word.

use proptest::prelude::*;

use petrel::bytecode::{decode, encode, inline_mask, Condition, Opcode};

const OPCODE_COUNT: u8 = 37;
const CONDITION_COUNT: u8 = 7;

fn arbitrary_opcode() -> impl Strategy<Value = Opcode> {
  (0..OPCODE_COUNT).prop_map(|raw| Opcode::try_from(raw).unwrap())
}

fn arbitrary_condition() -> impl Strategy<Value = Condition> {
  (0..CONDITION_COUNT).prop_map(|raw| Condition::try_from(raw).unwrap())
}

proptest! {
  #[test]
  fn inline_immediates_round_trip(
    opcode in arbitrary_opcode(),
    condition in arbitrary_condition(),
    registers in prop::collection::vec(0u8..64, 0..3),
    raw in any::<u32>(),
  ) {
    let slot = registers.len();
    // Strictly below the mask: the mask itself is the sentinel.
    let value = raw % inline_mask(slot);

    let (packed, extension) = encode(condition, opcode, &registers, Some(value), false);
    prop_assert_eq!(extension, None);

    let decoded = decode(packed).unwrap();
    prop_assert_eq!(decoded.opcode, opcode);
    prop_assert_eq!(decoded.condition, condition);
    prop_assert_eq!(decoded.immediate_slot, Some(slot));
    prop_assert_eq!(decoded.inline, value);
    prop_assert!(!decoded.wants_extension());
    for (index, register) in registers.iter().enumerate() {
      prop_assert!(decoded.register_flags[index]);
      prop_assert_eq!(decoded.registers[index], *register);
    }
  }

  #[test]
  fn extended_immediates_round_trip(
    opcode in arbitrary_opcode(),
    condition in arbitrary_condition(),
    registers in prop::collection::vec(0u8..64, 0..3),
    value in any::<u32>(),
  ) {
    let slot = registers.len();
    let (packed, extension) = encode(condition, opcode, &registers, Some(value), true);
    prop_assert_eq!(extension, Some(value));

    let decoded = decode(packed).unwrap();
    prop_assert_eq!(decoded.inline, inline_mask(slot));
    prop_assert!(decoded.wants_extension());
  }

  #[test]
  fn three_register_instructions_have_no_immediate(
    opcode in arbitrary_opcode(),
    condition in arbitrary_condition(),
    registers in prop::collection::vec(0u8..64, 3),
  ) {
    let (packed, extension) = encode(condition, opcode, &registers, None, false);
    prop_assert_eq!(extension, None);

    let decoded = decode(packed).unwrap();
    prop_assert_eq!(decoded.immediate_slot, None);
    prop_assert!(!decoded.wants_extension());
    prop_assert_eq!(decoded.registers, [registers[0], registers[1], registers[2]]);
  }

  #[test]
  fn register_only_encodings_never_fetch_an_extension(
    opcode in arbitrary_opcode(),
    condition in arbitrary_condition(),
    registers in prop::collection::vec(0u8..64, 0..4),
  ) {
    // With no immediate the unused low bits stay zero, which is never the
    // sentinel for any slot width.
    let (packed, _) = encode(condition, opcode, &registers, None, false);
    let decoded = decode(packed).unwrap();
    prop_assert!(!decoded.wants_extension());
  }
}
