/*!

  `petrel` is a small virtual machine for embedded-style programming
  exercises: an assembler that translates a line-oriented assembly language
  into a fixed-width word stream, and a register-based CPU emulator that
  executes that stream against a linear byte-addressed memory and a
  memory-mapped peripheral window.

  The pipeline is:

  ```text
  text -> [`assembler::lexer`] -> statements ->⋯

  ⋯-> [`assembler::parser`] -> symbol table + IR ->⋯

  ⋯-> [`assembler::codegen`] -> `Program` -> [`Cpu::load`] -> [`Cpu::cycle`]
  ```

  Instructions are one word, or two when an immediate does not fit its
  inline field (see the `bytecode` module for the bit layout). Execution is
  single-threaded and deterministic; the cycle budget passed to
  [`Cpu::cycle`] bounds latency, and traps are surfaced as [`Status`] codes
  rather than panics.

*/

#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

pub mod word;
pub mod bytecode;
pub mod memory;
pub mod peripheral;
pub mod cpu;
pub mod symboltable;
pub mod assembler;

pub use crate::assembler::{assemble, Program};
pub use crate::cpu::{Cpu, Status};
pub use crate::memory::Peripheral;
pub use crate::word::Word;
