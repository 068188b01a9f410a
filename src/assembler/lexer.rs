/*!

  The line-oriented front end of the assembler. Source text is split into
  lines; `#` starts a comment, blank lines are skipped, and the remaining
  lines are split on whitespace into tokens. The zero'th token decides the
  statement: a label `name:`, a directive `.name`, or an instruction
  mnemonic optionally suffixed with a condition (`jmp.ne`). Subsequent
  tokens are identifiers, integer literals, or float literals.

  Integer literals take an optional sign and are decimal, `0x...` hex, or
  `0b...` binary. Float literals take an optional sign, optional digits, a
  mandatory `.`, and trailing digits; `.5`, `+0.25` and `-1.` are all
  accepted, the bare `.` is not.

  Errors are accumulated, never thrown: every line is examined even after
  an earlier line fails, so one run reports everything.

*/

use std::str::FromStr;

use nom::{
  branch::alt,
  bytes::complete::{is_a, tag},
  character::complete::{alpha1, alphanumeric1, char as one_char, digit0, digit1, hex_digit1, one_of},
  combinator::{all_consuming, map_res, opt, recognize},
  multi::many0_count,
  sequence::{pair, preceded, tuple},
  IResult,
};
use string_cache::DefaultAtom;

use crate::bytecode::{Condition, Opcode};
use crate::word::{self, Word};

/// A parsed literal. The distinction matters to layout: float immediates
/// never fit an inline field.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Literal {
  Int(Word),
  Float(f32),
}

impl Literal {
  /// The 32-bit pattern of the literal, stored verbatim for floats.
  pub fn bits(&self) -> Word {
    match self {
      Literal::Int(value) => *value,
      Literal::Float(value) => word::from_float(*value),
    }
  }

  pub fn is_float(&self) -> bool {
    matches!(self, Literal::Float(_))
  }
}

#[derive(Clone, PartialEq, Debug)]
pub enum OperandToken {
  Identifier(DefaultAtom),
  Literal(Literal),
}

#[derive(Clone, PartialEq, Debug)]
pub enum Statement {
  Label(DefaultAtom),
  /// `.const NAME VALUE`
  Const(DefaultAtom, Literal),
  /// `.word NAME VALUE`
  DataWord(DefaultAtom, Literal),
  /// `.isr TARGET_LABEL REPLACEMENT_LABEL`
  IsrRedirect(DefaultAtom, DefaultAtom),
  Instruction {
    opcode: Opcode,
    condition: Condition,
    operands: Vec<OperandToken>,
  },
}

/// One statement with the 1-based source line it came from.
#[derive(Clone, PartialEq, Debug)]
pub struct SourceLine {
  pub number: u32,
  pub statement: Statement,
}

// region Token grammars

fn identifier(input: &str) -> IResult<&str, &str> {
  recognize(pair(
    alt((alpha1, tag("_"))),
    many0_count(alt((alphanumeric1, tag("_")))),
  ))(input)
}

fn integer(input: &str) -> IResult<&str, Word> {
  let (rest, sign) = opt(one_of("+-"))(input)?;
  let (rest, magnitude) = alt((
    map_res(preceded(tag("0x"), hex_digit1), |digits: &str| {
      Word::from_str_radix(digits, 16)
    }),
    map_res(preceded(tag("0b"), is_a("01")), |digits: &str| {
      Word::from_str_radix(digits, 2)
    }),
    map_res(digit1, |digits: &str| digits.parse::<Word>()),
  ))(rest)?;

  let value = match sign {
    Some('-') => magnitude.wrapping_neg(),
    _ => magnitude,
  };
  Ok((rest, value))
}

fn float(input: &str) -> IResult<&str, f32> {
  map_res(
    recognize(tuple((
      opt(one_of("+-")),
      alt((
        // At least one digit on one side of the dot.
        recognize(tuple((digit1, one_char('.'), digit0))),
        recognize(tuple((digit0, one_char('.'), digit1))),
      )),
    ))),
    |text: &str| text.parse::<f32>(),
  )(input)
}

fn classify_operand(token: &str) -> Option<OperandToken> {
  if let Ok((_, value)) = all_consuming(float)(token) {
    return Some(OperandToken::Literal(Literal::Float(value)));
  }
  if let Ok((_, value)) = all_consuming(integer)(token) {
    return Some(OperandToken::Literal(Literal::Int(value)));
  }
  if all_consuming(identifier)(token).is_ok() {
    return Some(OperandToken::Identifier(DefaultAtom::from(token)));
  }
  None
}

fn classify_literal(token: &str) -> Option<Literal> {
  match classify_operand(token) {
    Some(OperandToken::Literal(literal)) => Some(literal),
    _ => None,
  }
}

fn classify_identifier(token: &str) -> Option<DefaultAtom> {
  match all_consuming(identifier)(token).is_ok() {
    true => Some(DefaultAtom::from(token)),
    false => None,
  }
}

// endregion

/// Splits source text into a statement stream. All lines are examined; on
/// any failure the full accumulated error list is returned.
pub fn tokenize(text: &str) -> Result<Vec<SourceLine>, Vec<String>> {
  let mut lines = Vec::new();
  let mut errors = Vec::new();

  for (index, raw_line) in text.lines().enumerate() {
    let number = (index + 1) as u32;

    // Strip the comment, collapse whitespace runs into token boundaries.
    let uncommented = match raw_line.split_once('#') {
      Some((before, _comment)) => before,
      None => raw_line,
    };
    let tokens: Vec<&str> = uncommented.split_whitespace().collect();
    if tokens.is_empty() {
      continue;
    }

    // Leading labels may share a line with the statement they precede.
    let mut rest: &[&str] = &tokens;
    while let Some(name) = rest.first().and_then(|head| head.strip_suffix(':')) {
      match classify_identifier(name) {
        Some(name) => lines.push(SourceLine {
          number,
          statement: Statement::Label(name),
        }),
        None => {
          errors.push(format!(
            "Error on line {}: `{}` is not a valid label name.",
            number, name
          ));
        }
      }
      rest = &rest[1..];
    }
    if rest.is_empty() {
      continue;
    }

    match classify_statement(rest) {
      Ok(statement) => lines.push(SourceLine { number, statement }),
      Err(message) => errors.push(format!("Error on line {}: {}", number, message)),
    }
  }

  match errors.is_empty() {
    true => Ok(lines),
    false => Err(errors),
  }
}

fn classify_statement(tokens: &[&str]) -> Result<Statement, String> {
  let head = tokens[0];

  if let Some(directive) = head.strip_prefix('.') {
    return classify_directive(directive, &tokens[1..]);
  }

  classify_instruction(head, &tokens[1..])
}

fn classify_directive(directive: &str, args: &[&str]) -> Result<Statement, String> {
  match directive {
    "const" | "word" => {
      if args.len() != 2 {
        return Err(format!(".{} takes a name and a literal.", directive));
      }
      let name = classify_identifier(args[0])
        .ok_or_else(|| format!("`{}` is not a valid name.", args[0]))?;
      let literal = classify_literal(args[1])
        .ok_or_else(|| format!("`{}` is not a valid literal.", args[1]))?;
      match directive {
        "const" => Ok(Statement::Const(name, literal)),
        _word => Ok(Statement::DataWord(name, literal)),
      }
    }

    "isr" => {
      if args.len() != 2 {
        return Err(".isr takes a target label and a replacement label.".to_string());
      }
      let target = classify_identifier(args[0])
        .ok_or_else(|| format!("`{}` is not a valid label name.", args[0]))?;
      let replacement = classify_identifier(args[1])
        .ok_or_else(|| format!("`{}` is not a valid label name.", args[1]))?;
      Ok(Statement::IsrRedirect(target, replacement))
    }

    unknown => Err(format!("unknown directive `.{}`.", unknown)),
  }
}

fn classify_instruction(head: &str, args: &[&str]) -> Result<Statement, String> {
  let (mnemonic, suffix) = match head.split_once('.') {
    Some((mnemonic, suffix)) => (mnemonic, Some(suffix)),
    None => (head, None),
  };

  let opcode = Opcode::from_str(mnemonic)
    .map_err(|_| format!("`{}` is not an instruction mnemonic.", mnemonic))?;
  let condition = match suffix {
    None => Condition::Al,
    Some(suffix) => Condition::from_str(suffix)
      .map_err(|_| format!("`{}` is not a condition code.", suffix))?,
  };

  let mut operands = Vec::with_capacity(args.len());
  for token in args {
    match classify_operand(token) {
      Some(operand) => operands.push(operand),
      None => return Err(format!("`{}` is not a valid operand.", token)),
    }
  }

  Ok(Statement::Instruction {
    opcode,
    condition,
    operands,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn int_token(text: &str) -> Option<Word> {
    match classify_operand(text) {
      Some(OperandToken::Literal(Literal::Int(value))) => Some(value),
      _ => None,
    }
  }

  fn float_token(text: &str) -> Option<f32> {
    match classify_operand(text) {
      Some(OperandToken::Literal(Literal::Float(value))) => Some(value),
      _ => None,
    }
  }

  #[test]
  fn integer_literal_radixes_and_signs() {
    assert_eq!(int_token("42"), Some(42));
    assert_eq!(int_token("-1"), Some(0xFFFF_FFFF));
    assert_eq!(int_token("+7"), Some(7));
    assert_eq!(int_token("0xdeadbeef"), Some(0xDEAD_BEEF));
    assert_eq!(int_token("0b101"), Some(5));
    assert_eq!(int_token("0x"), None);
    assert_eq!(int_token("12ab"), None);
  }

  #[test]
  fn float_literal_shapes() {
    assert_eq!(float_token(".5"), Some(0.5));
    assert_eq!(float_token("+0.25"), Some(0.25));
    assert_eq!(float_token("-1."), Some(-1.0));
    assert_eq!(float_token("."), None);
    assert_eq!(float_token("-."), None);
    // No dot: an integer, not a float.
    assert_eq!(float_token("5"), None);
  }

  #[test]
  fn comments_and_blank_lines_are_skipped() {
    let lines = tokenize("# a comment\n\n  mov r0 1 # trailing\n").unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].number, 3);
    match &lines[0].statement {
      Statement::Instruction { opcode, operands, .. } => {
        assert_eq!(*opcode, Opcode::Mov);
        assert_eq!(operands.len(), 2);
      }
      other => panic!("unexpected statement {:?}", other),
    }
  }

  #[test]
  fn labels_may_share_a_line_with_their_statement() {
    let lines = tokenize("main: mov r0 1\ndone:\n").unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(
      lines[0].statement,
      Statement::Label(DefaultAtom::from("main"))
    );
    assert!(matches!(lines[1].statement, Statement::Instruction { .. }));
    assert_eq!(lines[1].number, 1);
    assert_eq!(lines[2].number, 2);
  }

  #[test]
  fn condition_suffixes_parse_case_insensitively() {
    let lines = tokenize("JMP.NE somewhere\n").unwrap();
    match &lines[0].statement {
      Statement::Instruction { opcode, condition, .. } => {
        assert_eq!(*opcode, Opcode::Jmp);
        assert_eq!(*condition, Condition::Ne);
      }
      other => panic!("unexpected statement {:?}", other),
    }
  }

  #[test]
  fn bad_lines_accumulate_errors() {
    let errors = tokenize("bogus r0\n.shrug x 1\nmov r0 .\n").unwrap_err();
    assert_eq!(errors.len(), 3);
    assert!(errors[0].starts_with("Error on line 1:"));
    assert!(errors[1].contains("unknown directive"));
    assert!(errors[2].contains("not a valid operand"));
  }
}
