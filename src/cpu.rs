/*!

  The register-based CPU: register file, program counter, status flags,
  pending-interrupt queue, and the bounded fetch/decode/execute loop.

  A cycle proceeds through a fixed sequence: report any trap latched by the
  previous instruction's memory traffic, service one pending interrupt,
  fetch, decode, resolve the inline or extension-word immediate, evaluate
  the condition code, and dispatch by opcode family. Memory faults
  discovered mid-instruction latch into a saved status; the current
  instruction completes and the next cycle boundary reports the trap. The
  machine makes no further progress after a trap until `reset` and a fresh
  `load`.

*/

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

use prettytable::{format as TableFormat, Table};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strum_macros::{Display as StrumDisplay, IntoStaticStr};

use crate::assembler::Program;
use crate::bytecode::{decode, Condition, Decoded, Opcode};
use crate::memory::{Memory, Peripheral};
use crate::word::{self, Word};

#[cfg(feature = "trace_execution")]
use crate::bytecode::MnemonicDisplay;

pub const REGISTER_COUNT: usize = 64;
/// The stack pointer is an architectural alias for this register slot.
pub const SP_SLOT: usize = 16;
/// The base pointer is an architectural alias for this register slot.
pub const BP_SLOT: usize = 17;

/// Capacity of the pending-interrupt queue. Requests past the capacity are
/// silently dropped.
pub const PENDING_INTERRUPT_CAPACITY: usize = 32;

// Flag bits.
pub const INTERRUPTS_ENABLED: Word = 1 << 0;
pub const EQUAL: Word = 1 << 1;
pub const GREATER_THAN: Word = 1 << 2;
pub const LESS_THAN: Word = 1 << 3;
pub const READY: Word = 1 << 4;

/// The flags register. Reset state is `INTERRUPTS_ENABLED` alone.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Flags(Word);

impl Flags {
  fn reset() -> Flags {
    Flags(INTERRUPTS_ENABLED)
  }

  pub fn bits(&self) -> Word {
    self.0
  }

  pub fn any(&self, mask: Word) -> bool {
    self.0 & mask != 0
  }

  pub fn all(&self, mask: Word) -> bool {
    self.0 & mask == mask
  }

  fn set(&mut self, mask: Word) {
    self.0 |= mask;
  }

  fn clear(&mut self, mask: Word) {
    self.0 &= !mask;
  }

  fn assign(&mut self, mask: Word, on: bool) {
    match on {
      true => self.set(mask),
      false => self.clear(mask),
    }
  }
}

/**
  Terminal statuses of the machine. `Undefined` is the reset sentinel and
  must never be returned from `cycle`; a trap is any status other than
  `Success` and `OutOfInstructions`.
*/
#[derive(StrumDisplay, IntoStaticStr, Copy, Clone, Eq, PartialEq, Debug)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
  Undefined,
  Success,
  OutOfInstructions,
  MissingInstruction,
  BadInstruction,
  Segfault,
  DivisionByZero,
}

impl Status {
  pub fn is_trap(&self) -> bool {
    !matches!(
      self,
      Status::Undefined | Status::Success | Status::OutOfInstructions
    )
  }
}

pub struct Cpu {
  // Register file. SP and BP live at their architectural slots.
  registers: [Word; REGISTER_COUNT],
  // Program counter: an index into the word stream, not a byte address.
  pc: Word,
  flags: Flags,

  // Terminal status once trapped.
  status: Status,
  // A memory fault latched mid-instruction, reported at the next boundary.
  fault: Option<Status>,

  pending: VecDeque<Word>,
  code: Vec<Word>,
  memory: Memory,
  rng: StdRng,
}

impl Cpu {
  pub fn new(memory_bytes: usize, peripheral_base: Word, peripheral: Box<dyn Peripheral>) -> Cpu {
    Cpu {
      registers: [0; REGISTER_COUNT],
      pc: 0,
      flags: Flags::reset(),
      status: Status::Undefined,
      fault: None,
      pending: VecDeque::with_capacity(PENDING_INTERRUPT_CAPACITY),
      code: Vec::new(),
      memory: Memory::new(memory_bytes, peripheral_base, peripheral),
      rng: StdRng::from_entropy(),
    }
  }

  /// Reseeds the PRNG behind RNGI/RNGF so runs are reproducible.
  pub fn seed(&mut self, seed: u64) {
    self.rng = StdRng::seed_from_u64(seed);
  }

  // region Accessors

  pub fn register(&self, slot: usize) -> Word {
    self.registers[slot]
  }

  pub fn pc(&self) -> Word {
    self.pc
  }

  pub fn sp(&self) -> Word {
    self.registers[SP_SLOT]
  }

  pub fn flags(&self) -> Flags {
    self.flags
  }

  pub fn status(&self) -> Status {
    self.status
  }

  // endregion

  // region Control

  /// Returns the machine to its post-construction state: registers, memory
  /// and code wiped, flags back to `INTERRUPTS_ENABLED` alone, the pending
  /// queue drained.
  pub fn reset(&mut self) {
    self.registers = [0; REGISTER_COUNT];
    self.pc = 0;
    self.flags = Flags::reset();
    self.status = Status::Undefined;
    self.fault = None;
    self.pending.clear();
    self.code.clear();
    self.memory.wipe();
  }

  /**
    Installs an assembled program: data image at the bottom of memory, word
    stream as the instruction store, SP at the end of the data image, PC at
    the entry point. Sets READY, which gates interrupt acceptance.
  */
  pub fn load(&mut self, program: &Program) -> Result<(), String> {
    if program.data.len() > self.memory.len() {
      return Err(format!(
        "data image of {} bytes does not fit the {}-byte memory",
        program.data.len(),
        self.memory.len()
      ));
    }

    self.reset();
    self.memory.install(&program.data);
    self.code = program.words.clone();
    self.registers[SP_SLOT] = program.data.len() as Word;
    self.pc = program.entry;
    self.flags.set(READY);
    Ok(())
  }

  /**
    Enqueues a jump target for interrupt service. Returns false, changing
    nothing, when no program is loaded (READY clear) or the queue is full.

    The queue is unguarded: callers enqueueing from another thread must
    supply their own mutual exclusion.
  */
  pub fn interrupt(&mut self, target: Word) -> bool {
    if !self.flags.any(READY) || self.pending.len() >= PENDING_INTERRUPT_CAPACITY {
      return false;
    }
    self.pending.push_back(target);
    true
  }

  /**
    Runs up to `budget` instructions, stopping early on a trap or when the
    program counter runs past the word stream. Returns the terminal status
    and whether the machine halted: `(Success, false)` means the budget
    expired with the machine still runnable.
  */
  pub fn cycle(&mut self, budget: usize) -> (Status, bool) {
    if self.status.is_trap() {
      return (self.status, true);
    }

    for _ in 0..budget {
      match self.step() {
        None => {}
        Some(status) => {
          if status.is_trap() {
            self.status = status;
          }
          return (status, true);
        }
      }
    }

    (Status::Success, false)
  }

  // endregion

  // region Fetch/decode/execute

  /// One instruction. `None` means keep running.
  fn step(&mut self) -> Option<Status> {
    // A fault latched by the previous instruction's memory traffic.
    if let Some(fault) = self.fault.take() {
      return Some(fault);
    }

    // Interrupt service: push the return address, jump to the target. No
    // flag is cleared here; handlers that must not be re-entered CLI
    // themselves.
    if self.flags.all(INTERRUPTS_ENABLED | READY) {
      if let Some(target) = self.pending.pop_front() {
        #[cfg(feature = "trace_execution")]
        println!("interrupt -> {:04}", target);

        let return_address = self.pc;
        self.push_word(return_address);
        self.pc = target;

        // The push may have faulted.
        if let Some(fault) = self.fault.take() {
          return Some(fault);
        }
      }
    }

    // Fetch.
    #[cfg(feature = "trace_execution")]
    let fetch_address = self.pc;
    if self.pc as usize >= self.code.len() {
      return Some(Status::OutOfInstructions);
    }
    let packed = self.code[self.pc as usize];
    self.pc += 1;

    // Decode.
    let decoded = match decode(packed) {
      Some(decoded) => decoded,
      None => return Some(Status::BadInstruction),
    };

    // Immediate resolution. The sentinel replaces the inline bits with the
    // next stream word.
    let mut immediate = decoded.inline;
    if decoded.wants_extension() {
      if self.pc as usize >= self.code.len() {
        return Some(Status::OutOfInstructions);
      }
      immediate = self.code[self.pc as usize];
      self.pc += 1;
    }

    // Condition evaluation. PC is already past the extension word, so a
    // failed condition costs nothing but the fetch.
    if !self.condition_holds(decoded.condition) {
      return None;
    }

    #[cfg(feature = "trace_execution")]
    println!(
      "{:04}  {}",
      fetch_address,
      MnemonicDisplay(decoded.opcode, decoded.condition)
    );

    self.exec(&decoded, immediate)
  }

  fn condition_holds(&self, condition: Condition) -> bool {
    match condition {
      Condition::Al => true,
      Condition::Eq => self.flags.any(EQUAL),
      Condition::Ne => !self.flags.any(EQUAL),
      Condition::Gt => self.flags.any(GREATER_THAN),
      Condition::Ge => self.flags.any(GREATER_THAN | EQUAL),
      Condition::Lt => self.flags.any(LESS_THAN),
      Condition::Le => self.flags.any(LESS_THAN | EQUAL),
    }
  }

  /**
    Executes one decoded instruction. Returns `None` to keep running, or
    the status ending the run. Each opcode match arm reads its operands
    through `operand`, which yields a register's contents, the resolved
    immediate, or zero for operand slots the immediate swallowed.
  */
  fn exec(&mut self, decoded: &Decoded, immediate: Word) -> Option<Status> {
    use Opcode::*;

    // Opcodes that write their first operand need it to be a register; an
    // immediate destination only occurs in hand-crafted bytecode.
    let dest = match decoded.opcode.writes_first_operand() {
      true => match decoded.register_flags[0] {
        true => decoded.registers[0] as usize,
        false => return Some(Status::BadInstruction),
      },
      false => 0,
    };

    match decoded.opcode {
      // Zero-operand //
      Nop => {}

      Ret => {
        self.pc = self.pop_word();
      }

      Cli => self.flags.clear(INTERRUPTS_ENABLED),

      Sei => self.flags.set(INTERRUPTS_ENABLED),

      // One-operand //
      Jmp => {
        self.pc = self.operand(decoded, immediate, 0);
      }

      Call => {
        let return_address = self.pc;
        self.push_word(return_address);
        self.pc = self.operand(decoded, immediate, 0);
      }

      Push => {
        let value = self.operand(decoded, immediate, 0);
        self.push_word(value);
      }

      Pop => {
        self.registers[dest] = self.pop_word();
      }

      Itof => {
        self.registers[dest] = word::from_float(word::signed(self.registers[dest]) as f32);
      }

      Ftoi => {
        // Truncates toward zero, saturating at the i32 bounds.
        self.registers[dest] = word::from_signed(word::float(self.registers[dest]) as i32);
      }

      Rngi => {
        self.registers[dest] = self.rng.gen::<Word>();
      }

      Rngf => {
        // Uniform in [0, 1).
        self.registers[dest] = word::from_float(self.rng.gen::<f32>());
      }

      // Two-operand //
      Mov => {
        self.registers[dest] = self.operand(decoded, immediate, 1);
      }

      Cmpi => {
        let a = word::signed(self.operand(decoded, immediate, 0));
        let b = word::signed(self.operand(decoded, immediate, 1));
        self.set_comparison(a == b, a > b, a < b);
      }

      Cmpu => {
        let a = self.operand(decoded, immediate, 0);
        let b = self.operand(decoded, immediate, 1);
        self.set_comparison(a == b, a > b, a < b);
      }

      Cmpf => {
        // NaN satisfies no ordering: all three flags clear.
        let a = word::float(self.operand(decoded, immediate, 0));
        let b = word::float(self.operand(decoded, immediate, 1));
        self.set_comparison(a == b, a > b, a < b);
      }

      // Three-operand //
      Ldr => {
        let base = self.operand(decoded, immediate, 1);
        let offset = self.operand(decoded, immediate, 2);
        // The offset is signed; two's-complement wrap-around is the same
        // addition.
        self.registers[dest] = self.mem_read_word(base.wrapping_add(offset));
      }

      Str => {
        let value = self.operand(decoded, immediate, 0);
        let base = self.operand(decoded, immediate, 1);
        let offset = self.operand(decoded, immediate, 2);
        self.mem_write_word(base.wrapping_add(offset), value);
      }

      // Reserved byte-granularity opcodes.
      Ldrb | Strb => return Some(Status::MissingInstruction),

      Shrs => {
        let value = word::signed(self.operand(decoded, immediate, 1));
        let count = self.operand(decoded, immediate, 2);
        self.registers[dest] = word::from_signed(value.wrapping_shr(count));
      }

      Shru => {
        let value = self.operand(decoded, immediate, 1);
        let count = self.operand(decoded, immediate, 2);
        self.registers[dest] = value.wrapping_shr(count);
      }

      Shl => {
        let value = self.operand(decoded, immediate, 1);
        let count = self.operand(decoded, immediate, 2);
        self.registers[dest] = value.wrapping_shl(count);
      }

      And => {
        self.registers[dest] =
          self.operand(decoded, immediate, 1) & self.operand(decoded, immediate, 2);
      }

      Or => {
        self.registers[dest] =
          self.operand(decoded, immediate, 1) | self.operand(decoded, immediate, 2);
      }

      Xor => {
        self.registers[dest] =
          self.operand(decoded, immediate, 1) ^ self.operand(decoded, immediate, 2);
      }

      Not => {
        self.registers[dest] = !self.operand(decoded, immediate, 1);
      }

      Add => {
        let a = word::signed(self.operand(decoded, immediate, 1));
        let b = word::signed(self.operand(decoded, immediate, 2));
        self.registers[dest] = word::from_signed(a.wrapping_add(b));
      }

      Sub => {
        let a = word::signed(self.operand(decoded, immediate, 1));
        let b = word::signed(self.operand(decoded, immediate, 2));
        self.registers[dest] = word::from_signed(a.wrapping_sub(b));
      }

      Mul => {
        let a = word::signed(self.operand(decoded, immediate, 1));
        let b = word::signed(self.operand(decoded, immediate, 2));
        self.registers[dest] = word::from_signed(a.wrapping_mul(b));
      }

      Div => {
        let a = word::signed(self.operand(decoded, immediate, 1));
        let b = word::signed(self.operand(decoded, immediate, 2));
        if b == 0 {
          return Some(Status::DivisionByZero);
        }
        self.registers[dest] = word::from_signed(a.wrapping_div(b));
      }

      Mod => {
        let a = word::signed(self.operand(decoded, immediate, 1));
        let b = word::signed(self.operand(decoded, immediate, 2));
        if b == 0 {
          return Some(Status::DivisionByZero);
        }
        self.registers[dest] = word::from_signed(a.wrapping_rem(b));
      }

      Addf => {
        let a = word::float(self.operand(decoded, immediate, 1));
        let b = word::float(self.operand(decoded, immediate, 2));
        self.registers[dest] = word::from_float(a + b);
      }

      Subf => {
        let a = word::float(self.operand(decoded, immediate, 1));
        let b = word::float(self.operand(decoded, immediate, 2));
        self.registers[dest] = word::from_float(a - b);
      }

      Mulf => {
        let a = word::float(self.operand(decoded, immediate, 1));
        let b = word::float(self.operand(decoded, immediate, 2));
        self.registers[dest] = word::from_float(a * b);
      }

      Divf => {
        let a = word::float(self.operand(decoded, immediate, 1));
        let b = word::float(self.operand(decoded, immediate, 2));
        if b == 0.0 {
          return Some(Status::DivisionByZero);
        }
        self.registers[dest] = word::from_float(a / b);
      }

      Modf => {
        // Truncated remainder: the result carries the dividend's sign.
        let a = word::float(self.operand(decoded, immediate, 1));
        let b = word::float(self.operand(decoded, immediate, 2));
        if b == 0.0 {
          return Some(Status::DivisionByZero);
        }
        self.registers[dest] = word::from_float(a % b);
      }
    }

    None
  }

  // endregion

  // region Operand and memory helpers

  /// The value of operand `slot`: a register's contents, the resolved
  /// immediate, or zero for a slot past the immediate (its bits belonged
  /// to the immediate, so the operand is absent).
  fn operand(&self, decoded: &Decoded, immediate: Word, slot: usize) -> Word {
    match decoded.immediate_slot {
      Some(imm_slot) if slot == imm_slot => immediate,
      Some(imm_slot) if slot > imm_slot => 0,
      _ => self.registers[decoded.registers[slot] as usize],
    }
  }

  fn set_comparison(&mut self, equal: bool, greater: bool, less: bool) {
    self.flags.assign(EQUAL, equal);
    self.flags.assign(GREATER_THAN, greater);
    self.flags.assign(LESS_THAN, less);
  }

  /// A word read that latches SEGFAULT instead of failing, returning zero.
  fn mem_read_word(&mut self, address: Word) -> Word {
    match self.memory.read_word(address) {
      Ok(value) => value,
      Err(_fault) => {
        self.fault = Some(Status::Segfault);
        0
      }
    }
  }

  /// A word write that latches SEGFAULT instead of failing.
  fn mem_write_word(&mut self, address: Word, value: Word) {
    if self.memory.write_word(address, value).is_err() {
      self.fault = Some(Status::Segfault);
    }
  }

  /// The stack grows upward: write at SP, then SP += 4.
  fn push_word(&mut self, value: Word) {
    let sp = self.registers[SP_SLOT];
    self.mem_write_word(sp, value);
    self.registers[SP_SLOT] = sp.wrapping_add(4);
  }

  /// SP -= 4, then read at SP.
  fn pop_word(&mut self) -> Word {
    let sp = self.registers[SP_SLOT].wrapping_sub(4);
    self.registers[SP_SLOT] = sp;
    self.mem_read_word(sp)
  }

  // endregion
}

lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for Cpu {
  // Non-zero registers plus the pointer slots; dumping all 64 drowns the
  // interesting ones.
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut table = Table::new();
    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Register", ubl->"Contents"]);

    table.add_row(row![r->"pc =", format!("{}", self.pc)]);
    for (slot, value) in self.registers.iter().enumerate() {
      if *value != 0 || slot == SP_SLOT || slot == BP_SLOT {
        let name = match slot {
          SP_SLOT => "sp".to_string(),
          BP_SLOT => "bp".to_string(),
          _ => format!("r{}", slot),
        };
        table.add_row(row![r->format!("{} =", name), format!("0x{:08x}", value)]);
      }
    }

    write!(
      f,
      "Status: {}  Flags: 0b{:05b}\n{}",
      self.status,
      self.flags.bits(),
      table
    )
  }
}
