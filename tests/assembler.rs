//! Layout and error-surface tests for the assembler: inline/extension
//! decisions, label growth accounting, and the accumulated error list.

use petrel::assembler::assemble;
use petrel::bytecode::{decode, inline_mask};
use petrel::word::Word;

const MEMORY_BYTES: usize = 1024;

fn words_of(text: &str) -> Vec<Word> {
  assemble(text, MEMORY_BYTES).expect("program should assemble").words
}

#[test]
fn immediates_below_the_mask_stay_inline() {
  assert_eq!(words_of("main: jmp 0x3ffffe\n").len(), 1);
  assert_eq!(words_of("main: mov r0 32766\n").len(), 1);
  assert_eq!(words_of("main: add r0 r1 254\n").len(), 1);
}

#[test]
fn an_immediate_equal_to_the_mask_forces_an_extension_word() {
  // The all-ones inline value is the sentinel; storing it inline would
  // decode as "extension word follows".
  for (text, mask) in [
    ("main: jmp 0x3fffff\n", inline_mask(0)),
    ("main: mov r0 32767\n", inline_mask(1)),
    ("main: add r0 r1 255\n", inline_mask(2)),
  ] {
    let words = words_of(text);
    assert_eq!(words.len(), 2);
    let decoded = decode(words[0]).unwrap();
    assert!(decoded.wants_extension());
    assert_eq!(words[1], mask);
  }
}

#[test]
fn immediates_above_the_mask_take_an_extension_word() {
  let words = words_of("main: mov r0 0xdeadbeef\n");
  assert_eq!(words.len(), 2);
  assert_eq!(words[1], 0xDEAD_BEEF);
}

#[test]
fn float_immediates_always_take_an_extension_word() {
  let words = words_of("main: mov r0 0.25\n");
  assert_eq!(words.len(), 2);
  assert_eq!(words[1], 0.25f32.to_bits());

  // Even a float whose bit pattern would fit inline.
  let words = words_of("main: mov r0 0.0\n");
  assert_eq!(words.len(), 2);
  assert_eq!(words[1], 0);
}

#[test]
fn label_addresses_account_for_extension_words() {
  let text = "\
main: mov r0 -1
loop: add r1 r1 1
      jmp loop
";
  let program = assemble(text, MEMORY_BYTES).unwrap();
  // `mov r0 -1` is two words, so `loop` lands at address 2.
  assert_eq!(program.address_of("loop"), Some(2));
  assert_eq!(program.words.len(), 4);

  let jump = decode(program.words[3]).unwrap();
  assert_eq!(jump.inline, 2);
}

#[test]
fn a_trailing_label_addresses_the_end_of_the_stream() {
  let program = assemble("main: nop\nend:\n", MEMORY_BYTES).unwrap();
  assert_eq!(program.address_of("end"), Some(1));
  assert_eq!(program.words.len(), 1);
}

// A forward reference whose target sits exactly at the 8-bit inline mask:
// granting the extension word moves the target, and the layout must
// account for its own growth.
#[test]
fn growth_accounting_when_a_target_straddles_the_threshold() {
  let mask = inline_mask(2); // 255

  // Just below the threshold: stays inline.
  let mut text = String::from("main:\n");
  for _ in 0..252 {
    text.push_str("  nop\n");
  }
  text.push_str("  add r0 r1 tail\n  nop\ntail:\n");
  let program = assemble(&text, MEMORY_BYTES).unwrap();
  assert_eq!(program.address_of("tail"), Some(254));
  assert_eq!(program.words.len(), 254);
  let reference = decode(program.words[252]).unwrap();
  assert!(!reference.wants_extension());
  assert_eq!(reference.inline, 254);

  // At the threshold: the reference grows an extension word, which pushes
  // the target one further.
  let mut text = String::from("main:\n");
  for _ in 0..253 {
    text.push_str("  nop\n");
  }
  text.push_str("  add r0 r1 tail\n  nop\ntail:\n");
  let program = assemble(&text, MEMORY_BYTES).unwrap();
  assert_eq!(program.address_of("tail"), Some(256));
  assert_eq!(program.words.len(), 256);
  let reference = decode(program.words[253]).unwrap();
  assert!(reference.wants_extension());
  assert_eq!(reference.inline, mask);
  assert_eq!(program.words[254], 256);
}

#[test]
fn stream_length_equals_the_sum_of_instruction_sizes() {
  let text = "\
main: mov r0 42
      mov r1 0xdeadbeef
      mov r2 0.5
      add r3 r0 r1
      jmp main
";
  let program = assemble(text, MEMORY_BYTES).unwrap();
  // 1 + 2 + 2 + 1 + 1
  assert_eq!(program.words.len(), 7);

  // Walking the stream by decode agrees with the layout.
  let mut index = 0;
  let mut instructions = 0;
  while index < program.words.len() {
    let decoded = decode(program.words[index]).unwrap();
    index += 1 + decoded.wants_extension() as usize;
    instructions += 1;
  }
  assert_eq!(instructions, 5);
}

#[test]
fn isr_rewrites_point_the_stub_at_the_replacement() {
  let text = "\
stub: jmp stub
.isr stub handler
handler: ret
main: nop
";
  let program = assemble(text, MEMORY_BYTES).unwrap();
  let stub = decode(program.words[0]).unwrap();
  assert_eq!(stub.inline, program.address_of("handler").unwrap());
}

#[test]
fn isr_rejects_a_stub_that_carries_an_extension_word() {
  let text = "\
stub: mov r0 0.5
.isr stub handler
handler: ret
main: nop
";
  let errors = assemble(text, MEMORY_BYTES).unwrap_err();
  assert_eq!(errors.len(), 1);
  assert!(errors[0].contains("Error on line 2"));
  assert!(errors[0].contains("extension word"));
}

#[test]
fn isr_rejects_non_label_names() {
  let text = "\
.const k 7
stub: jmp stub
.isr stub k
main: nop
";
  let errors = assemble(text, MEMORY_BYTES).unwrap_err();
  assert!(errors[0].contains("`k` is not a label"));
}

#[test]
fn a_program_without_main_fails() {
  let errors = assemble("start: nop\n", MEMORY_BYTES).unwrap_err();
  assert!(errors[0].contains("no `main` label"));
}

#[test]
fn a_data_image_larger_than_memory_fails() {
  let text = "\
.word a 1
.word b 2
.word c 3
main: nop
";
  let errors = assemble(text, 8).unwrap_err();
  assert!(errors[0].contains("data image"));
}

#[test]
fn errors_accumulate_across_lines() {
  let text = "\
main: bogus r0
      mov r0 nowhere
";
  // The first line dies in the lexer, so the parse pass never sees the
  // second; each stage still reports everything it saw.
  let errors = assemble(text, MEMORY_BYTES).unwrap_err();
  assert_eq!(errors.len(), 1);
  assert!(errors[0].contains("line 1"));

  let text = "\
main: mov r0 nowhere
      mov r1 elsewhere
";
  let errors = assemble(text, MEMORY_BYTES).unwrap_err();
  assert_eq!(errors.len(), 2);
  assert!(errors[0].contains("line 1"));
  assert!(errors[1].contains("line 2"));
}

#[test]
fn constants_inline_like_literals() {
  let text = "\
.const small 7
.const large 0x10000
main: mov r0 small
      mov r1 large
";
  let program = assemble(text, MEMORY_BYTES).unwrap();
  // small inline, large extended.
  assert_eq!(program.words.len(), 3);
  assert_eq!(program.words[2], 0x10000);
}

#[test]
fn address_of_only_names_labels() {
  let text = "\
.const k 7
.word x 1
main: nop
";
  let program = assemble(text, MEMORY_BYTES).unwrap();
  assert_eq!(program.address_of("main"), Some(0));
  assert_eq!(program.address_of("k"), None);
  assert_eq!(program.address_of("x"), None);
  assert_eq!(program.address_of("absent"), None);
}
