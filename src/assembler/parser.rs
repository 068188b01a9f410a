/*!

  The middle of the assembler: two passes over the statement stream.

  The first pass binds each label to the index of the instruction it
  precedes, so forward references resolve. The second pass materializes
  directives and instructions, resolving identifier operands against the
  symbol table — registers were pre-populated there, so `r3` and a user
  label look up identically. Immediates stay symbolic in the IR: the code
  generator decides inline-versus-extension placement, which for label
  immediates depends on the very addresses being assigned.

*/

use string_cache::DefaultAtom;

use super::lexer::{OperandToken, SourceLine, Statement};
use crate::bytecode::{Condition, Opcode};
use crate::symboltable::{Symbol, SymbolKind, SymbolTable};
use crate::word::Word;

/// An instruction's immediate before layout: either a literal with its
/// 32-bit pattern, or a deferred label reference.
#[derive(Clone, PartialEq, Debug)]
pub enum Immediate {
  Literal { value: Word, float: bool },
  Label(DefaultAtom),
}

/**
  One IR instruction. `address`, `inline` and `extension` are filled by the
  code generator: `address` is the instruction's word-stream position,
  `inline` the value of the inline immediate field, and `extension` the
  trailing word's payload when the immediate does not fit inline.
*/
#[derive(Clone, PartialEq, Debug)]
pub struct IrInstruction {
  pub opcode: Opcode,
  pub condition: Condition,
  /// Register operands in order; the immediate, if any, follows them.
  pub registers: Vec<u8>,
  pub immediate: Option<Immediate>,
  pub line: u32,

  pub address: Word,
  pub inline: Word,
  pub extension: Option<Word>,
}

/// A pending `.isr` rewrite, applied after layout.
#[derive(Clone, PartialEq, Debug)]
pub struct IsrPatch {
  pub target: DefaultAtom,
  pub replacement: DefaultAtom,
  pub line: u32,
}

/// Everything the code generator needs: the symbol table (labels still
/// holding IR indexes), the IR, the initial data image, and the pending
/// ISR rewrites.
#[derive(Debug)]
pub struct Parsed {
  pub symbols: SymbolTable,
  pub instructions: Vec<IrInstruction>,
  pub data: Vec<u8>,
  pub isr_patches: Vec<IsrPatch>,
}

pub fn parse(lines: &[SourceLine]) -> Result<Parsed, Vec<String>> {
  let mut symbols = SymbolTable::new();
  let mut errors = Vec::new();

  // First pass: labels to IR indexes.
  let mut instruction_count: Word = 0;
  for line in lines {
    match &line.statement {
      Statement::Label(name) => {
        let symbol = Symbol::new(SymbolKind::Label, instruction_count);
        if symbols.insert(name.clone(), symbol).is_err() {
          errors.push(format!(
            "Error on line {}: `{}` is already defined.",
            line.number, name
          ));
        }
      }
      Statement::Instruction { .. } => {
        instruction_count += 1;
      }
      _ => {}
    }
  }

  // Second pass: directives and instructions.
  let mut instructions = Vec::with_capacity(instruction_count as usize);
  let mut data: Vec<u8> = Vec::new();
  let mut isr_patches = Vec::new();

  for line in lines {
    match &line.statement {
      Statement::Label(_) => {}

      Statement::Const(name, literal) => {
        let symbol = Symbol {
          kind: SymbolKind::Constant,
          value: literal.bits(),
          float: literal.is_float(),
        };
        if symbols.insert(name.clone(), symbol).is_err() {
          errors.push(format!(
            "Error on line {}: `{}` is already defined.",
            line.number, name
          ));
        }
      }

      Statement::DataWord(name, literal) => {
        let address = data.len() as Word;
        data.extend_from_slice(&literal.bits().to_le_bytes());
        let symbol = Symbol::new(SymbolKind::Literal, address);
        if symbols.insert(name.clone(), symbol).is_err() {
          errors.push(format!(
            "Error on line {}: `{}` is already defined.",
            line.number, name
          ));
        }
      }

      Statement::IsrRedirect(target, replacement) => {
        isr_patches.push(IsrPatch {
          target: target.clone(),
          replacement: replacement.clone(),
          line: line.number,
        });
      }

      Statement::Instruction {
        opcode,
        condition,
        operands,
      } => {
        match resolve_operands(*opcode, operands, &symbols) {
          Ok((registers, immediate)) => instructions.push(IrInstruction {
            opcode: *opcode,
            condition: *condition,
            registers,
            immediate,
            line: line.number,
            address: 0,
            inline: 0,
            extension: None,
          }),
          Err(message) => {
            errors.push(format!("Error on line {}: {}", line.number, message));
          }
        }
      }
    }
  }

  match errors.is_empty() {
    true => Ok(Parsed {
      symbols,
      instructions,
      data,
      isr_patches,
    }),
    false => Err(errors),
  }
}

/**
  Resolves operand tokens to register slots and at most one immediate. The
  immediate must be the final operand: the inline field consumes every bit
  after the first non-register slot, so nothing can be encoded behind it.
*/
fn resolve_operands(
  opcode: Opcode,
  operands: &[OperandToken],
  symbols: &SymbolTable,
) -> Result<(Vec<u8>, Option<Immediate>), String> {
  let mut registers = Vec::new();
  let mut immediate: Option<Immediate> = None;

  for token in operands {
    let resolved = match token {
      OperandToken::Literal(literal) => Immediate::Literal {
        value: literal.bits(),
        float: literal.is_float(),
      },

      OperandToken::Identifier(name) => {
        let symbol = symbols
          .get(name)
          .ok_or_else(|| format!("`{}` is undefined.", name))?;
        match symbol.kind {
          SymbolKind::Register => {
            if immediate.is_some() {
              return Err("an immediate must be the final operand.".to_string());
            }
            registers.push(symbol.value as u8);
            continue;
          }
          SymbolKind::Label => Immediate::Label(name.clone()),
          SymbolKind::Constant | SymbolKind::Literal => Immediate::Literal {
            value: symbol.value,
            float: symbol.float,
          },
        }
      }
    };

    if immediate.is_some() {
      return Err("at most one operand may be an immediate.".to_string());
    }
    immediate = Some(resolved);
  }

  let count = registers.len() + immediate.is_some() as usize;
  if count > opcode.arity() {
    return Err(format!(
      "{} takes at most {} operands but was given {}.",
      opcode,
      opcode.arity(),
      count
    ));
  }

  if opcode.writes_first_operand() && registers.is_empty() {
    return Err(format!("{} needs a register as its first operand.", opcode));
  }

  Ok((registers, immediate))
}
