/*!
  The human readable textual form of a packed word stream. This module
  walks the stream, pairing each instruction word with its extension word
  where the sentinel announces one, and renders a listing the assembler's
  own grammar would accept again (modulo label names, which are not part
  of the bytecode).
*/

use std::fmt::Write as _;

use super::binary::{decode, Decoded};
use super::instruction::MnemonicDisplay;
use crate::word::Word;

/// Renders a word stream as a listing, one instruction per line, prefixed
/// with its word-stream address. Undecodable words are kept as raw data so
/// the listing stays aligned with the stream.
pub fn disassemble(words: &[Word]) -> String {
  let mut listing = String::new();
  let mut index = 0;

  while index < words.len() {
    let address = index;
    let packed = words[index];
    index += 1;

    match decode(packed) {
      None => {
        let _ = writeln!(listing, "{:04}  .raw 0x{:08x}", address, packed);
      }

      Some(decoded) => {
        let immediate = match decoded.wants_extension() {
          true if index < words.len() => {
            let extension = words[index];
            index += 1;
            Some(extension)
          }
          // A sentinel with no trailing word; render the inline bits.
          true => Some(decoded.inline),
          false => Some(decoded.inline),
        };
        let _ = writeln!(listing, "{:04}  {}", address, render(&decoded, immediate));
      }
    }
  }

  listing
}

fn render(decoded: &Decoded, immediate: Option<Word>) -> String {
  let mut text = format!("{}", MnemonicDisplay(decoded.opcode, decoded.condition));

  for slot in 0..decoded.opcode.arity() {
    match decoded.immediate_slot {
      Some(imm_slot) if slot == imm_slot => {
        let value = immediate.unwrap_or(decoded.inline);
        match value > 0xFFFF {
          true => {
            let _ = write!(text, " 0x{:x}", value);
          }
          false => {
            let _ = write!(text, " {}", value);
          }
        }
        // The immediate consumes every later slot.
        break;
      }

      _ => {
        let _ = write!(text, " r{}", decoded.registers[slot]);
      }
    }
  }

  text
}
