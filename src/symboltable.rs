/*!

  The assembler's symbol table: a mapping from interned names to symbols.
  Register names are pre-populated at construction so that operands look up
  registers and user-defined names through the same path. Labels are bound
  to their IR index during parsing; after code generation they are rebound
  to their final word-stream address.

  Names are case-sensitive, so the pre-populated register names are the
  lowercase `r0..r63`, `sp`, `bp`.

*/

use std::collections::HashMap;

use string_cache::DefaultAtom;

use crate::cpu::{BP_SLOT, REGISTER_COUNT, SP_SLOT};
use crate::word::Word;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SymbolKind {
  /// A code label; value is an IR index until layout, then a stream address.
  Label,
  /// A `.word` name; value is the byte address of its data cell.
  Literal,
  /// A `.const` name; value is the bound literal's bits.
  Constant,
  /// A register name; value is the register slot.
  Register,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Symbol {
  pub kind: SymbolKind,
  pub value: Word,
  /// Set when `value` holds float bits (a constant bound to a float
  /// literal). Layout uses this: float immediates never fit inline.
  pub float: bool,
}

impl Symbol {
  pub fn new(kind: SymbolKind, value: Word) -> Symbol {
    Symbol {
      kind,
      value,
      float: false,
    }
  }
}

#[derive(Clone, Debug)]
pub struct SymbolTable {
  table: HashMap<DefaultAtom, Symbol>,
}

impl SymbolTable {
  /// An empty table apart from the pre-populated register names.
  pub fn new() -> SymbolTable {
    let mut table = HashMap::new();
    for slot in 0..REGISTER_COUNT {
      table.insert(
        DefaultAtom::from(format!("r{}", slot)),
        Symbol::new(SymbolKind::Register, slot as Word),
      );
    }
    table.insert(
      DefaultAtom::from("sp"),
      Symbol::new(SymbolKind::Register, SP_SLOT as Word),
    );
    table.insert(
      DefaultAtom::from("bp"),
      Symbol::new(SymbolKind::Register, BP_SLOT as Word),
    );

    SymbolTable { table }
  }

  pub fn get(&self, name: &DefaultAtom) -> Option<&Symbol> {
    self.table.get(name)
  }

  /// Binds a new name. Fails when the name is already bound, register
  /// names included.
  pub fn insert(&mut self, name: DefaultAtom, symbol: Symbol) -> Result<(), ()> {
    match self.table.contains_key(&name) {
      true => Err(()),
      false => {
        self.table.insert(name, symbol);
        Ok(())
      }
    }
  }

  /// Replaces the value of an existing binding. Used by layout to move
  /// labels from IR indexes to stream addresses.
  pub fn rebind(&mut self, name: &DefaultAtom, value: Word) {
    if let Some(symbol) = self.table.get_mut(name) {
      symbol.value = value;
    }
  }

  /// All bindings of the given kind.
  pub fn of_kind(&self, kind: SymbolKind) -> impl Iterator<Item = (&DefaultAtom, &Symbol)> {
    self
      .table
      .iter()
      .filter(move |(_name, symbol)| symbol.kind == kind)
  }
}

impl Default for SymbolTable {
  fn default() -> Self {
    SymbolTable::new()
  }
}
