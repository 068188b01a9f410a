/*!
  Assemble-and-run harness. Reads a source file, assembles it against the
  default machine configuration, runs it under a cycle budget, and reports
  the terminal status with a register dump. `--listing` prints the
  disassembled word stream instead of running.
*/

use std::env;
use std::fs;
use std::process::ExitCode;

use petrel::assembler::assemble;
use petrel::bytecode::assembly::disassemble;
use petrel::cpu::Cpu;
use petrel::peripheral::NullDevice;
use petrel::word::Word;

const MEMORY_BYTES: usize = 64 * 1024;
const PERIPHERAL_BASE: Word = 0x8000_0000;
const CYCLE_BUDGET: usize = 1_000_000;

fn main() -> ExitCode {
  let mut listing = false;
  let mut path = None;
  for argument in env::args().skip(1) {
    match argument.as_str() {
      "--listing" => listing = true,
      _ => path = Some(argument),
    }
  }

  let path = match path {
    Some(path) => path,
    None => {
      eprintln!("usage: petrel [--listing] <source-file>");
      return ExitCode::FAILURE;
    }
  };

  let text = match fs::read_to_string(&path) {
    Ok(text) => text,
    Err(error) => {
      eprintln!("Cannot read `{}`: {}", path, error);
      return ExitCode::FAILURE;
    }
  };

  let program = match assemble(&text, MEMORY_BYTES) {
    Ok(program) => program,
    Err(errors) => {
      for error in &errors {
        eprintln!("{}", error);
      }
      eprintln!("Failed to assemble `{}`.", path);
      return ExitCode::FAILURE;
    }
  };

  if listing {
    print!("{}", disassemble(&program.words));
    return ExitCode::SUCCESS;
  }

  let mut machine = Cpu::new(MEMORY_BYTES, PERIPHERAL_BASE, Box::new(NullDevice));
  if let Err(error) = machine.load(&program) {
    eprintln!("{}", error);
    return ExitCode::FAILURE;
  }

  let (status, halted) = machine.cycle(CYCLE_BUDGET);
  match halted {
    true => println!("Halted: {}", status),
    false => println!("Cycle budget of {} exhausted: {}", CYCLE_BUDGET, status),
  }
  println!("{}", machine);

  ExitCode::SUCCESS
}
