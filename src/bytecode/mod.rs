/*!

  Representation of machine instructions abstractly and as packed words.

  The machine uses a 32-bit word size. An instruction is one word, or two
  when it carries an immediate that does not fit its inline field. The bit
  layout of the first word, most significant bit at 31:

  ```text
  [31:29] condition code
  [28:23] opcode
  [22]    operand 1 is a register
  [21:16] operand 1 (register index, or part of an inline immediate)
  [15]    operand 2 is a register
  [14:9]  operand 2
  [8]     operand 3 is a register
  [7:2]   operand 3
  [1:0]   low immediate bits
  ```

  At most one operand is an immediate, and it is always the last operand
  present: the immediate claims every bit below the first cleared register
  flag, so its width is 22, 15, or 8 bits depending on whether it sits in
  the first, second, or third slot. An inline field holding the all-ones
  value for its width is the sentinel meaning "the next word in the stream
  is the full 32-bit immediate"; that trailing word is the extension word.

  Opcodes are grouped by operand family, and the order the variants are
  listed in is significant: a given opcode's family is determined with a
  trivial comparison. Order-dependencies:
  ```text
  Opcode::arity()
  cpu::Cpu dispatch
  ```

*/

mod binary;
mod instruction;
pub mod assembly;

pub use binary::{decode, encode, inline_mask, Decoded};
pub use instruction::{
  Condition, MnemonicDisplay, Opcode, MAX_ONE_OPERAND_OPCODE, MAX_TWO_OPERAND_OPCODE,
  MAX_ZERO_OPERAND_OPCODE,
};
