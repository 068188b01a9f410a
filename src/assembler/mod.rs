/*!

  The assembler: source text to an executable [`Program`].

  The pipeline is three stages, each accumulating line-numbered errors
  rather than stopping at the first failure:

  ```text
  text -> [`lexer::tokenize`] -> statements ->⋯

  ⋯-> [`parser::parse`] -> symbol table + IR ->⋯

  ⋯-> [`codegen::generate`] -> `Program`
  ```

  Partial output is never produced: the caller gets either a complete
  program or the full error list.

*/

pub mod codegen;
pub mod lexer;
pub mod parser;

pub use codegen::Program;

use crate::word::Word;

/// Translates assembly source into a program laid out against a memory of
/// `memory_bytes` bytes. On failure the accumulated error list is
/// returned; no partial output is produced.
pub fn assemble(text: &str, memory_bytes: usize) -> Result<Program, Vec<String>> {
  let lines = lexer::tokenize(text)?;
  let parsed = parser::parse(&lines)?;
  codegen::generate(parsed, memory_bytes)
}

impl Program {
  /// The stream address a label was assigned, when it names one.
  pub fn address_of(&self, label: &str) -> Option<Word> {
    use crate::symboltable::SymbolKind;
    use string_cache::DefaultAtom;

    let symbol = self.symbols.get(&DefaultAtom::from(label))?;
    match symbol.kind {
      SymbolKind::Label => Some(symbol.value),
      _ => None,
    }
  }
}
