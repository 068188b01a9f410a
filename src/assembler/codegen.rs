/*!

  The heart of the assembler: address assignment under the variable-width
  encoding. An instruction's address depends on how many extension words
  precede it, which depends on whether each earlier immediate fits its
  inline field — and for label immediates, that depends on the very
  addresses being assigned.

  Layout runs in three passes:

  - Pass A decides extension words for everything knowable up front: float
    immediates and integer immediates at or above the inline mask for their
    operand slot. A value exactly equal to the mask must take the extension
    word, or decode would misread it as the sentinel. Label immediates are
    deferred.
  - Pass B resolves labels. Growth is monotone — an extension flag never
    turns back off — but one new extension word shifts every later address
    and can push another label past its own threshold, so the pass repeats
    until no new extension word appears, then writes final addresses into
    the inline fields, the extension payloads, and the label symbols.
  - Pass C applies `.isr` rewrites: the immediate of the instruction at the
    target label is replaced with the replacement label's address, which
    must fit inline on both ends.

  Emission walks the IR in order, packing each instruction and its
  extension word into the word stream.

*/

use string_cache::DefaultAtom;

use super::parser::{Immediate, IrInstruction, Parsed};
use crate::bytecode::{self, inline_mask};
use crate::symboltable::{SymbolKind, SymbolTable};
use crate::word::Word;

/**
  An assembled program: the packed word stream, the initial data image, the
  entry address, and the symbol table with labels rebound to their final
  stream addresses. `Cpu::load` installs it.
*/
#[derive(Clone, Debug)]
pub struct Program {
  pub words: Vec<Word>,
  pub data: Vec<u8>,
  pub entry: Word,
  pub symbols: SymbolTable,
  /// The memory size the program was laid out against.
  pub memory_bytes: usize,
}

pub fn generate(parsed: Parsed, memory_bytes: usize) -> Result<Program, Vec<String>> {
  let Parsed {
    mut symbols,
    mut instructions,
    data,
    isr_patches,
  } = parsed;
  let mut errors = Vec::new();

  if data.len() > memory_bytes {
    errors.push(format!(
      "Error: the data image is {} bytes but memory holds only {}.",
      data.len(),
      memory_bytes
    ));
  }

  // Pass A: extension words for non-label immediates.
  for instruction in instructions.iter_mut() {
    let slot = instruction.registers.len();
    match &instruction.immediate {
      Some(Immediate::Literal { value, float }) => {
        match *float || *value >= inline_mask(slot) {
          true => instruction.extension = Some(*value),
          false => instruction.inline = *value,
        }
      }
      _ => {}
    }
  }

  // Pass B: label resolution to a fixed point.
  let mut stream_length = assign_addresses(&mut instructions);
  loop {
    let mut grew = false;

    for index in 0..instructions.len() {
      if instructions[index].extension.is_some() {
        continue;
      }
      let target = match &instructions[index].immediate {
        Some(Immediate::Label(name)) => label_index(&symbols, name),
        _ => continue,
      };
      let slot = instructions[index].registers.len();
      let address = index_address(&instructions, stream_length, target);
      if address >= inline_mask(slot) {
        // Payload is written once addresses are final.
        instructions[index].extension = Some(0);
        grew = true;
      }
    }

    stream_length = assign_addresses(&mut instructions);
    if !grew {
      break;
    }
  }

  // Addresses are stable; write the label immediates.
  for index in 0..instructions.len() {
    let target = match &instructions[index].immediate {
      Some(Immediate::Label(name)) => label_index(&symbols, name),
      _ => continue,
    };
    let address = index_address(&instructions, stream_length, target);
    match instructions[index].extension.is_some() {
      true => instructions[index].extension = Some(address),
      false => instructions[index].inline = address,
    }
  }

  // Pass C: ISR rewrites.
  for patch in &isr_patches {
    if let Err(message) = apply_isr_patch(patch, &symbols, &mut instructions, stream_length) {
      errors.push(format!("Error on line {}: {}", patch.line, message));
    }
  }

  // Labels move from IR indexes to stream addresses.
  let labels: Vec<(DefaultAtom, usize)> = symbols
    .of_kind(SymbolKind::Label)
    .map(|(name, symbol)| (name.clone(), symbol.value as usize))
    .collect();
  for (name, index) in labels {
    let address = index_address(&instructions, stream_length, index);
    symbols.rebind(&name, address);
  }

  let entry = match symbols.get(&DefaultAtom::from("main")) {
    Some(symbol) if symbol.kind == SymbolKind::Label => symbol.value,
    _ => {
      errors.push("Error: the program has no `main` label.".to_string());
      0
    }
  };

  if !errors.is_empty() {
    return Err(errors);
  }

  // Emission.
  let mut words = Vec::with_capacity(stream_length as usize);
  for instruction in &instructions {
    debug_assert_eq!(instruction.address as usize, words.len());

    let immediate = match (&instruction.immediate, instruction.extension) {
      (None, _) => None,
      (Some(_), Some(payload)) => Some(payload),
      (Some(_), None) => Some(instruction.inline),
    };
    let (packed, extension) = bytecode::encode(
      instruction.condition,
      instruction.opcode,
      &instruction.registers,
      immediate,
      instruction.extension.is_some(),
    );

    words.push(packed);
    if let Some(extension) = extension {
      words.push(extension);
    }
  }
  debug_assert_eq!(words.len(), stream_length as usize);

  Ok(Program {
    words,
    data,
    entry,
    symbols,
    memory_bytes,
  })
}

/// Sequential address assignment under the current extension flags.
/// Returns the stream length in words.
fn assign_addresses(instructions: &mut [IrInstruction]) -> Word {
  let mut cursor: Word = 0;
  for instruction in instructions.iter_mut() {
    instruction.address = cursor;
    cursor += 1 + instruction.extension.is_some() as Word;
  }
  cursor
}

/// The IR index a label symbol is bound to. Label immediates are only
/// created from existing label symbols, so the lookup cannot miss.
fn label_index(symbols: &SymbolTable, name: &DefaultAtom) -> usize {
  match symbols.get(name) {
    Some(symbol) => symbol.value as usize,
    None => unreachable!("label `{}` vanished from the symbol table", name),
  }
}

/// The stream address of an IR slot. A label bound past the last
/// instruction addresses the end of the stream.
fn index_address(instructions: &[IrInstruction], stream_length: Word, index: usize) -> Word {
  match instructions.get(index) {
    Some(instruction) => instruction.address,
    None => stream_length,
  }
}

fn apply_isr_patch(
  patch: &super::parser::IsrPatch,
  symbols: &SymbolTable,
  instructions: &mut [IrInstruction],
  stream_length: Word,
) -> Result<(), String> {
  let target = match symbols.get(&patch.target) {
    Some(symbol) if symbol.kind == SymbolKind::Label => symbol.value as usize,
    _ => return Err(format!("`{}` is not a label.", patch.target)),
  };
  let replacement = match symbols.get(&patch.replacement) {
    Some(symbol) if symbol.kind == SymbolKind::Label => symbol.value as usize,
    _ => return Err(format!("`{}` is not a label.", patch.replacement)),
  };

  let stub = match instructions.get(target) {
    Some(stub) => stub,
    None => {
      return Err(format!(
        "`{}` does not name an instruction.",
        patch.target
      ))
    }
  };
  if stub.immediate.is_none() {
    return Err(format!(
      "the stub at `{}` has no immediate to rewrite.",
      patch.target
    ));
  }
  if stub.extension.is_some() {
    return Err(format!(
      "the stub at `{}` carries an extension word; its address is too large to rewrite.",
      patch.target
    ));
  }

  let slot = stub.registers.len();
  let address = index_address(instructions, stream_length, replacement);
  if address >= inline_mask(slot) {
    return Err(format!(
      "the replacement `{}` at address {} does not fit the stub's inline field.",
      patch.replacement, address
    ));
  }

  instructions[target].inline = address;
  Ok(())
}
