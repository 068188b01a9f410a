/*!
  The opcode and condition enums, grouped by operand family.
*/

use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display as StrumDisplay, EnumString, IntoStaticStr};

use crate::word::Word;

/**
  Opcodes of the virtual machine.

  Variants are grouped by the number of operands they take, zero-operand
  opcodes first, so that an opcode's family can be determined by comparing
  its numeric code against the `MAX_*_OPCODE` constants. Consequently, the
  order the opcodes are listed below is significant.

  `Ldrb` and `Strb` are reserved: they decode, but the execution path traps
  them as missing instructions.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq,        Debug,  Hash,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[repr(u8)]
pub enum Opcode {
  // Zero-operand //
  Nop,
  Ret,
  Cli,
  Sei,
  // Opcode 4

  // One-operand //
  Jmp,
  Call,
  Push,
  Pop,
  Itof,
  Ftoi,
  Rngi,
  Rngf,
  // Opcode 12

  // Two-operand //
  Mov,
  Cmpi,
  Cmpu,
  Cmpf,
  // Opcode 16

  // Three-operand //
  Ldr,
  Str,
  Ldrb, // reserved
  Strb, // reserved
  Shrs,
  Shru,
  Shl,
  And,
  Or,
  Xor,
  Not,
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Addf,
  Subf,
  Mulf,
  Divf,
  Modf,
}

pub const MAX_ZERO_OPERAND_OPCODE: Word = 4;
pub const MAX_ONE_OPERAND_OPCODE: Word = 12;
pub const MAX_TWO_OPERAND_OPCODE: Word = 16;

impl Opcode {
  /// Gives the 6-bit numeric value that represents the opcode, padded with
  /// zeros to make a `Word`.
  pub fn code(&self) -> Word {
    let val: u8 = (*self).into();
    val as Word
  }

  /// The number of operands the opcode takes.
  pub fn arity(&self) -> usize {
    match self.code() {
      value if value < MAX_ZERO_OPERAND_OPCODE => 0,
      value if value < MAX_ONE_OPERAND_OPCODE => 1,
      value if value < MAX_TWO_OPERAND_OPCODE => 2,
      _value => 3,
    }
  }

  /// Whether the opcode writes its first operand, which must therefore be
  /// encoded as a register.
  pub fn writes_first_operand(&self) -> bool {
    use Opcode::*;
    !matches!(
      self,
      Nop | Ret | Cli | Sei | Jmp | Call | Push | Cmpi | Cmpu | Cmpf | Str | Strb
    )
  }
}

/**
  Condition codes. Every instruction carries one; `Al` (always) is the
  encoding of an unsuffixed mnemonic. The remaining codes test the flags
  written by the comparison opcodes.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq,        Debug,  Hash,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[repr(u8)]
pub enum Condition {
  Al,
  Eq,
  Ne,
  Gt,
  Ge,
  Lt,
  Le,
}

impl Condition {
  pub fn code(&self) -> Word {
    let val: u8 = (*self).into();
    val as Word
  }
}

/// The mnemonic with its condition suffix, as it appears in source text.
pub struct MnemonicDisplay(pub Opcode, pub Condition);

impl Display for MnemonicDisplay {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.1 {
      Condition::Al => write!(f, "{}", self.0),
      cond => write!(f, "{}.{}", self.0, cond),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::str::FromStr;

  #[test]
  fn families_follow_declaration_order() {
    assert_eq!(Opcode::Nop.arity(), 0);
    assert_eq!(Opcode::Sei.arity(), 0);
    assert_eq!(Opcode::Jmp.arity(), 1);
    assert_eq!(Opcode::Rngf.arity(), 1);
    assert_eq!(Opcode::Mov.arity(), 2);
    assert_eq!(Opcode::Cmpf.arity(), 2);
    assert_eq!(Opcode::Ldr.arity(), 3);
    assert_eq!(Opcode::Modf.arity(), 3);
  }

  #[test]
  fn mnemonics_are_case_insensitive() {
    assert_eq!(Opcode::from_str("MOV").unwrap(), Opcode::Mov);
    assert_eq!(Opcode::from_str("mov").unwrap(), Opcode::Mov);
    assert_eq!(Condition::from_str("NE").unwrap(), Condition::Ne);
    assert!(Opcode::from_str("frobnicate").is_err());
  }
}
