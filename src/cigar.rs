/// CIGAR-family operation strings
///
/// Tokenizes run-length encoded alignment strings (`50M2I3D`) into ordered
/// `(length, operation)` pairs. The same grammar covers plain CIGAR strings and
/// FATCIGAR strings, which only differ in how `M` and `X` are interpreted.
use nom::character::complete::{digit1, satisfy};
use nom::sequence::pair;
use nom::IResult;
use std::fmt;
use thiserror::Error;

/// Single alignment operation code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOp {
    Match,            // M - alignment match (FATCIGAR: true match)
    Insertion,        // I
    Deletion,         // D
    Skip,             // N
    SoftClip,         // S
    HardClip,         // H
    Padding,          // P
    SequenceMatch,    // =
    SequenceMismatch, // X
    Other(char),      // any other ASCII letter
}

impl CigarOp {
    /// Map an operation character to its code, `None` if it can never be one
    pub fn from_char(c: char) -> Option<Self> {
        let op = match c {
            'M' => CigarOp::Match,
            'I' => CigarOp::Insertion,
            'D' => CigarOp::Deletion,
            'N' => CigarOp::Skip,
            'S' => CigarOp::SoftClip,
            'H' => CigarOp::HardClip,
            'P' => CigarOp::Padding,
            '=' => CigarOp::SequenceMatch,
            'X' => CigarOp::SequenceMismatch,
            c if c.is_ascii_alphabetic() => CigarOp::Other(c),
            _ => return None,
        };
        Some(op)
    }

    pub fn as_char(&self) -> char {
        match self {
            CigarOp::Match => 'M',
            CigarOp::Insertion => 'I',
            CigarOp::Deletion => 'D',
            CigarOp::Skip => 'N',
            CigarOp::SoftClip => 'S',
            CigarOp::HardClip => 'H',
            CigarOp::Padding => 'P',
            CigarOp::SequenceMatch => '=',
            CigarOp::SequenceMismatch => 'X',
            CigarOp::Other(c) => *c,
        }
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One `(length, operation)` unit of an operation string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarToken {
    pub len: u32,
    pub op: CigarOp,
}

impl CigarToken {
    pub fn new(len: u32, op: CigarOp) -> Self {
        CigarToken { len, op }
    }
}

impl fmt::Display for CigarToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.op)
    }
}

/// Why an operation string failed to tokenize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingLength,
    MissingOperation,
    InvalidCharacter(char),
    ZeroLength,
    LeadingZero,
    LengthOverflow,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::MissingLength => write!(f, "operation without a length"),
            ParseErrorKind::MissingOperation => write!(f, "length without an operation"),
            ParseErrorKind::InvalidCharacter(c) => write!(f, "invalid character {c:?}"),
            ParseErrorKind::ZeroLength => write!(f, "zero-length operation"),
            ParseErrorKind::LeadingZero => write!(f, "operation length with a leading zero"),
            ParseErrorKind::LengthOverflow => write!(f, "operation length does not fit in 32 bits"),
        }
    }
}

/// Tokenizer failure
///
/// `position` is the byte offset of the offending character. When the string
/// ends in a length with no operation, it is the start of that length.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse operation string {input:?} at byte {position}: {kind}")]
pub struct ParseError {
    pub input: String,
    pub position: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    fn new(input: &str, position: usize, kind: ParseErrorKind) -> Self {
        ParseError {
            input: input.to_string(),
            position,
            kind,
        }
    }
}

fn is_op_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '='
}

/// `<digits><op>` segment, returned unconverted
fn segment(input: &str) -> IResult<&str, (&str, char)> {
    pair(digit1, satisfy(is_op_char))(input)
}

/// Classify the character a segment failed on
fn failure_kind(rest: &str) -> ParseErrorKind {
    match rest.chars().next() {
        None => ParseErrorKind::MissingOperation,
        Some(c) if is_op_char(c) => ParseErrorKind::MissingLength,
        Some(c) => ParseErrorKind::InvalidCharacter(c),
    }
}

/// Tokenize an operation string into ordered `(length, op)` pairs
///
/// Lengths must be canonical (no leading zeros) so that displaying the tokens
/// gives back the input. The empty string yields no tokens.
pub fn parse_cigar(input: &str) -> Result<Vec<CigarToken>, ParseError> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        let start = input.len() - rest.len();
        match segment(rest) {
            Ok((remaining, (digits, op_char))) => {
                let len: u32 = digits
                    .parse()
                    .map_err(|_| ParseError::new(input, start, ParseErrorKind::LengthOverflow))?;
                if len == 0 {
                    return Err(ParseError::new(input, start, ParseErrorKind::ZeroLength));
                }
                if digits.starts_with('0') {
                    return Err(ParseError::new(input, start, ParseErrorKind::LeadingZero));
                }
                let op = CigarOp::from_char(op_char).ok_or_else(|| {
                    ParseError::new(
                        input,
                        start + digits.len(),
                        ParseErrorKind::InvalidCharacter(op_char),
                    )
                })?;
                tokens.push(CigarToken::new(len, op));
                rest = remaining;
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                // a dangling length is reported where it starts
                let position = if e.input.is_empty() {
                    start
                } else {
                    input.len() - e.input.len()
                };
                return Err(ParseError::new(input, position, failure_kind(e.input)));
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(ParseError::new(input, start, ParseErrorKind::MissingOperation));
            }
        }
    }

    Ok(tokens)
}

/// Re-encode tokens as an operation string
pub fn to_cigar_string(tokens: &[CigarToken]) -> String {
    tokens.iter().map(|t| t.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let tokens = parse_cigar("45M5I").unwrap();
        assert_eq!(
            tokens,
            vec![
                CigarToken::new(45, CigarOp::Match),
                CigarToken::new(5, CigarOp::Insertion)
            ]
        );
    }

    #[test]
    fn test_parse_all_standard_ops() {
        let tokens = parse_cigar("1M2I3D4N5S6H7P8=9X").unwrap();
        let ops: Vec<char> = tokens.iter().map(|t| t.op.as_char()).collect();
        assert_eq!(ops, vec!['M', 'I', 'D', 'N', 'S', 'H', 'P', '=', 'X']);
        let lens: Vec<u32> = tokens.iter().map(|t| t.len).collect();
        assert_eq!(lens, (1..=9).collect::<Vec<u32>>());
    }

    #[test]
    fn test_parse_unknown_letter_is_kept() {
        let tokens = parse_cigar("3M2B").unwrap();
        assert_eq!(tokens[1], CigarToken::new(2, CigarOp::Other('B')));
        assert_eq!(to_cigar_string(&tokens), "3M2B");
    }

    #[test]
    fn test_parse_multi_digit_lengths() {
        let tokens = parse_cigar("123456M").unwrap();
        assert_eq!(tokens, vec![CigarToken::new(123456, CigarOp::Match)]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_cigar("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_letter_first() {
        let err = parse_cigar("M50").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingLength);
        assert_eq!(err.position, 0);
    }

    #[test]
    fn test_parse_trailing_digits() {
        let err = parse_cigar("10M5").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingOperation);
        assert_eq!(err.position, 3);

        let err = parse_cigar("10M250").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingOperation);
        assert_eq!(err.position, 3);
    }

    #[test]
    fn test_parse_leading_zero() {
        let err = parse_cigar("050M").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::LeadingZero);
        assert_eq!(err.position, 0);

        let err = parse_cigar("10M007I").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::LeadingZero);
        assert_eq!(err.position, 3);

        // all zeros is a zero length, not a leading zero
        let err = parse_cigar("00M").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ZeroLength);
    }

    #[test]
    fn test_parse_invalid_character() {
        let err = parse_cigar("10M 5I").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidCharacter(' '));
        assert_eq!(err.position, 3);

        let err = parse_cigar("10*").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidCharacter('*'));
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_parse_zero_length() {
        let err = parse_cigar("10M0I").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ZeroLength);
        assert_eq!(err.position, 3);
    }

    #[test]
    fn test_parse_overflow() {
        let err = parse_cigar("99999999999M").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::LengthOverflow);
    }

    #[test]
    fn test_error_message_names_input() {
        let err = parse_cigar("M50").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"M50\""), "got: {msg}");
        assert!(msg.contains("operation without a length"), "got: {msg}");
    }

    #[test]
    fn test_round_trip() {
        for s in ["50M", "30M2X8M", "5S40M1I4M3H", "10=1X10=", "7M2N7M"] {
            let tokens = parse_cigar(s).unwrap();
            assert_eq!(to_cigar_string(&tokens), s);
        }
    }
}
