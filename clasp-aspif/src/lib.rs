//! ASPIF ground program parser and writer.
//!
//! The format is line-oriented: a header line, then one directive per line, each starting with an
//! integer tag, terminated by a line containing a lone `0`. Parsing is chunked the same way the
//! sibling DIMACS reader is: bytes are fed in via [`parse_chunk`](AspifParser::parse_chunk) and
//! buffered until a full line is available, so the same parser works over a [`Read`](io::Read)
//! stream or a fixed buffer.

use std::io;

use clasp_formula::Lit;

use anyhow::Error;
use thiserror::Error;

/// A ground atom id, always positive.
pub type Atom = u32;

/// Possible errors while parsing an ASPIF stream.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("line {}: invalid ASPIF header: {}", line, header)]
    InvalidHeader { line: usize, header: String },
    #[error("line {}: unexpected end of line", line)]
    UnexpectedEol { line: usize },
    #[error("line {}: expected an integer, found '{}'", line, token)]
    ExpectedInt { line: usize, token: String },
    #[error("line {}: atom or literal {} is out of range", line, value)]
    OutOfRange { line: usize, value: i64 },
    #[error("line {}: unknown directive tag {}", line, tag)]
    UnknownTag { line: usize, tag: i64 },
    #[error("line {}: unknown modifier {} for heuristic directive", line, modifier)]
    UnknownModifier { line: usize, modifier: i64 },
    #[error("line {}: unknown external value {}", line, value)]
    UnknownExternalValue { line: usize, value: i64 },
    #[error("line {}: trailing data after directive", line)]
    TrailingData { line: usize },
    #[error("parser invoked after a previous error")]
    PreviousError,
}

/// Header data of an ASPIF stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AspifHeader {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
    pub incremental: bool,
}

/// Body of a [`Directive::Rule`].
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// A normal body, true when every literal is true.
    Normal(Vec<Lit>),
    /// A sum (weight) body, true when the weighted sum of true literals reaches `bound`.
    Sum { bound: i64, terms: Vec<(Lit, i64)> },
}

/// Value assigned to an atom by a [`Directive::External`] directive.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExternalValue {
    Free,
    True,
    False,
    Release,
}

/// What a [`Directive::Heuristic`] modifies.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HeuristicModifier {
    Level,
    Sign,
    Factor,
    Init,
    True,
    False,
}

/// A single ASPIF directive.
#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    Rule {
        choice: bool,
        head: Vec<Atom>,
        body: Body,
    },
    Minimize {
        priority: i64,
        terms: Vec<(Lit, i64)>,
    },
    Project {
        atoms: Vec<Atom>,
    },
    Output {
        text: String,
        condition: Vec<Lit>,
    },
    External {
        atom: Atom,
        value: ExternalValue,
    },
    Assume {
        lits: Vec<Lit>,
    },
    Heuristic {
        modifier: HeuristicModifier,
        atom: Atom,
        bias: i64,
        prio: u32,
        condition: Vec<Lit>,
    },
    Edge {
        u: i64,
        v: i64,
        condition: Vec<Lit>,
    },
    /// Theory data, kept as the raw integer payload; interpreting theory atoms is a Non-goal.
    Theory(Vec<i64>),
    Comment(String),
}

/// Cursor over a single already-buffered line, tokenizing ASCII-decimal integers separated by
/// spaces, with an escape hatch to read a fixed number of raw bytes for [`Directive::Output`]'s
/// string payload.
struct LineCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> LineCursor<'a> {
    fn new(bytes: &'a [u8], line: usize) -> LineCursor<'a> {
        LineCursor { bytes, pos: 0, line }
    }

    fn skip_spaces(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] == b' ' {
            self.pos += 1;
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_spaces();
        self.pos >= self.bytes.len()
    }

    fn next_token(&mut self) -> Option<&'a [u8]> {
        self.skip_spaces();
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b' ' {
            self.pos += 1;
        }
        if start == self.pos {
            None
        } else {
            Some(&self.bytes[start..self.pos])
        }
    }

    fn int(&mut self) -> Result<i64, ParserError> {
        let token = self.next_token().ok_or(ParserError::UnexpectedEol { line: self.line })?;
        let text = std::str::from_utf8(token).unwrap_or("");
        text.parse().map_err(|_| ParserError::ExpectedInt {
            line: self.line,
            token: String::from_utf8_lossy(token).into_owned(),
        })
    }

    fn atom(&mut self) -> Result<Atom, ParserError> {
        let value = self.int()?;
        if value <= 0 || value > Atom::max_value() as i64 {
            return Err(ParserError::OutOfRange { line: self.line, value });
        }
        Ok(value as Atom)
    }

    fn lit(&mut self) -> Result<Lit, ParserError> {
        let value = self.int()?;
        if value == 0 || value.unsigned_abs() > Atom::max_value() as u64 {
            return Err(ParserError::OutOfRange { line: self.line, value });
        }
        Ok(Lit::from_dimacs(value as isize))
    }

    fn atoms(&mut self) -> Result<Vec<Atom>, ParserError> {
        let count = self.int()?;
        (0..count).map(|_| self.atom()).collect()
    }

    fn lits(&mut self) -> Result<Vec<Lit>, ParserError> {
        let count = self.int()?;
        (0..count).map(|_| self.lit()).collect()
    }

    fn weighted_lits(&mut self) -> Result<Vec<(Lit, i64)>, ParserError> {
        let count = self.int()?;
        (0..count)
            .map(|_| Ok((self.lit()?, self.int()?)))
            .collect()
    }

    /// Read a length-prefixed raw string: an integer byte count, a single separating space, then
    /// exactly that many bytes (which may themselves contain spaces).
    fn string(&mut self) -> Result<String, ParserError> {
        let len = self.int()?;
        if len < 0 {
            return Err(ParserError::OutOfRange { line: self.line, value: len });
        }
        let len = len as usize;
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b' ' {
            self.pos += 1;
        }
        if self.pos + len > self.bytes.len() {
            return Err(ParserError::UnexpectedEol { line: self.line });
        }
        let text = String::from_utf8_lossy(&self.bytes[self.pos..self.pos + len]).into_owned();
        self.pos += len;
        Ok(text)
    }

    fn finish(&mut self) -> Result<(), ParserError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(ParserError::TrailingData { line: self.line })
        }
    }
}

fn parse_directive_line(line: &[u8], line_number: usize) -> Result<Option<Directive>, ParserError> {
    let mut cursor = LineCursor::new(line, line_number);

    if cursor.at_end() {
        return Ok(None);
    }

    let tag = cursor.int()?;

    let directive = match tag {
        0 => return Ok(None),
        1 => {
            let ht = cursor.int()?;
            let choice = match ht {
                0 => false,
                1 => true,
                _ => return Err(ParserError::UnknownModifier { line: line_number, modifier: ht }),
            };
            let head = cursor.atoms()?;
            let body_type = cursor.int()?;
            let body = match body_type {
                0 => Body::Normal(cursor.lits()?),
                1 => {
                    let bound = cursor.int()?;
                    Body::Sum { bound, terms: cursor.weighted_lits()? }
                }
                _ => return Err(ParserError::UnknownModifier { line: line_number, modifier: body_type }),
            };
            Directive::Rule { choice, head, body }
        }
        2 => {
            let priority = cursor.int()?;
            Directive::Minimize { priority, terms: cursor.weighted_lits()? }
        }
        3 => Directive::Project { atoms: cursor.atoms()? },
        4 => {
            let text = cursor.string()?;
            Directive::Output { text, condition: cursor.lits()? }
        }
        5 => {
            let atom = cursor.atom()?;
            let value = match cursor.int()? {
                0 => ExternalValue::Free,
                1 => ExternalValue::True,
                2 => ExternalValue::False,
                3 => ExternalValue::Release,
                other => return Err(ParserError::UnknownExternalValue { line: line_number, value: other }),
            };
            Directive::External { atom, value }
        }
        6 => Directive::Assume { lits: cursor.lits()? },
        7 => {
            let modifier = match cursor.int()? {
                0 => HeuristicModifier::Level,
                1 => HeuristicModifier::Sign,
                2 => HeuristicModifier::Factor,
                3 => HeuristicModifier::Init,
                4 => HeuristicModifier::True,
                5 => HeuristicModifier::False,
                other => return Err(ParserError::UnknownModifier { line: line_number, modifier: other }),
            };
            let atom = cursor.atom()?;
            let bias = cursor.int()?;
            let prio = cursor.int()?;
            if prio < 0 {
                return Err(ParserError::OutOfRange { line: line_number, value: prio });
            }
            let condition = cursor.lits()?;
            Directive::Heuristic { modifier, atom, bias, prio: prio as u32, condition }
        }
        8 => {
            let u = cursor.int()?;
            let v = cursor.int()?;
            Directive::Edge { u, v, condition: cursor.lits()? }
        }
        9 => {
            let mut raw = vec![9];
            while !cursor.at_end() {
                raw.push(cursor.int()?);
            }
            return Ok(Some(Directive::Theory(raw)));
        }
        10 => {
            let rest = String::from_utf8_lossy(&line[cursor.pos..]).into_owned();
            return Ok(Some(Directive::Comment(rest.trim_start().to_owned())));
        }
        other => return Err(ParserError::UnknownTag { line: line_number, tag: other }),
    };

    cursor.finish()?;
    Ok(Some(directive))
}

fn parse_header_line(line: &[u8], line_number: usize) -> Result<AspifHeader, ParserError> {
    let text = String::from_utf8_lossy(line);
    let invalid = || ParserError::InvalidHeader { line: line_number, header: text.clone().into_owned() };

    let mut parts = text.split(' ').filter(|part| !part.is_empty());
    if parts.next() != Some("asp") {
        return Err(invalid());
    }
    let major = parts.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
    let minor = parts.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
    let revision = parts.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
    let incremental = match parts.next() {
        None => false,
        Some("incremental") => true,
        Some(_) => return Err(invalid()),
    };
    if parts.next().is_some() {
        return Err(invalid());
    }

    Ok(AspifHeader { major, minor, revision, incremental })
}

/// Parser for ASPIF ground programs.
///
/// This parser can consume the input in chunks while also producing the parsed directives in
/// chunks via [`take_directives`](AspifParser::take_directives).
#[derive(Default)]
pub struct AspifParser {
    directives: Vec<Directive>,
    header: Option<AspifHeader>,

    buffer: Vec<u8>,
    line_number: usize,
    error: bool,
}

impl AspifParser {
    /// Create a new ASPIF parser.
    pub fn new() -> AspifParser {
        AspifParser {
            directives: vec![],
            header: None,
            buffer: vec![],
            line_number: 1,
            error: false,
        }
    }

    /// Parse the given input into a single vector of directives.
    pub fn parse(input: impl io::Read) -> Result<Vec<Directive>, Error> {
        Ok(Self::parse_incremental(input, |_| Ok(()))?.take_directives())
    }

    /// Parse the given input incrementally.
    ///
    /// The callback is invoked after every chunk with a reference to the parser, which can drain
    /// directives parsed so far via [`take_directives`](AspifParser::take_directives).
    pub fn parse_incremental(
        input: impl io::Read,
        mut callback: impl FnMut(&mut AspifParser) -> Result<(), Error>,
    ) -> Result<AspifParser, Error> {
        use io::BufRead;

        let mut buffer = io::BufReader::new(input);
        let mut parser = Self::new();

        loop {
            let data = buffer.fill_buf()?;
            if data.is_empty() {
                break;
            }
            parser.parse_chunk(data)?;
            let len = data.len();
            buffer.consume(len);

            callback(&mut parser)?;
        }
        parser.eof()?;
        callback(&mut parser)?;

        Ok(parser)
    }

    /// Parse a chunk of input.
    ///
    /// After parsing the last chunk call [`eof`](AspifParser::eof).
    ///
    /// If this method returns an error, the parser is in an invalid state and cannot parse
    /// further chunks.
    pub fn parse_chunk(&mut self, chunk: &[u8]) -> Result<(), ParserError> {
        if self.error {
            return Err(ParserError::PreviousError);
        }

        self.buffer.extend_from_slice(chunk);

        let mut consumed = 0;
        loop {
            let rest = &self.buffer[consumed..];
            match rest.iter().position(|&b| b == b'\n') {
                None => break,
                Some(newline) => {
                    let line = &rest[..newline];
                    if let Err(err) = self.process_line(line) {
                        self.error = true;
                        return Err(err);
                    }
                    consumed += newline + 1;
                    self.line_number += 1;
                }
            }
        }
        self.buffer.drain(..consumed);

        Ok(())
    }

    fn process_line(&mut self, line: &[u8]) -> Result<(), ParserError> {
        let line = strip_cr(line);

        if self.header.is_none() {
            self.header = Some(parse_header_line(line, self.line_number)?);
            return Ok(());
        }

        if let Some(directive) = parse_directive_line(line, self.line_number)? {
            self.directives.push(directive);
        }

        Ok(())
    }

    /// Finish parsing the input.
    pub fn eof(&mut self) -> Result<(), ParserError> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            if let Err(err) = self.process_line(&line) {
                self.error = true;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Returns the directives parsed since the last call to this method.
    pub fn take_directives(&mut self) -> Vec<Directive> {
        std::mem::take(&mut self.directives)
    }

    /// The header data, once the header line has been parsed.
    pub fn header(&self) -> Option<AspifHeader> {
        self.header
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    if line.last() == Some(&b'\r') {
        &line[..line.len() - 1]
    } else {
        line
    }
}

/// Write an ASPIF header line.
pub fn write_aspif_header(target: &mut impl io::Write, header: AspifHeader) -> io::Result<()> {
    if header.incremental {
        writeln!(
            target,
            "asp {} {} {} incremental",
            header.major, header.minor, header.revision
        )
    } else {
        writeln!(target, "asp {} {} {}", header.major, header.minor, header.revision)
    }
}

fn write_lits(target: &mut impl io::Write, lits: &[Lit]) -> io::Result<()> {
    write!(target, "{}", lits.len())?;
    for lit in lits {
        write!(target, " {}", lit.to_dimacs())?;
    }
    Ok(())
}

fn write_weighted_lits(target: &mut impl io::Write, terms: &[(Lit, i64)]) -> io::Result<()> {
    write!(target, "{}", terms.len())?;
    for &(lit, weight) in terms {
        write!(target, " {} {}", lit.to_dimacs(), weight)?;
    }
    Ok(())
}

/// Write a single ASPIF directive.
pub fn write_aspif_directive(target: &mut impl io::Write, directive: &Directive) -> io::Result<()> {
    match directive {
        Directive::Rule { choice, head, body } => {
            write!(target, "1 {} {}", *choice as u8, head.len())?;
            for atom in head {
                write!(target, " {}", atom)?;
            }
            match body {
                Body::Normal(lits) => {
                    write!(target, " 0 ")?;
                    write_lits(target, lits)?;
                }
                Body::Sum { bound, terms } => {
                    write!(target, " 1 {} ", bound)?;
                    write_weighted_lits(target, terms)?;
                }
            }
            writeln!(target)
        }
        Directive::Minimize { priority, terms } => {
            write!(target, "2 {} ", priority)?;
            write_weighted_lits(target, terms)?;
            writeln!(target)
        }
        Directive::Project { atoms } => {
            write!(target, "3 {}", atoms.len())?;
            for atom in atoms {
                write!(target, " {}", atom)?;
            }
            writeln!(target)
        }
        Directive::Output { text, condition } => {
            write!(target, "4 {} {} ", text.len(), text)?;
            write_lits(target, condition)?;
            writeln!(target)
        }
        Directive::External { atom, value } => {
            let value = match value {
                ExternalValue::Free => 0,
                ExternalValue::True => 1,
                ExternalValue::False => 2,
                ExternalValue::Release => 3,
            };
            writeln!(target, "5 {} {}", atom, value)
        }
        Directive::Assume { lits } => {
            write!(target, "6 ")?;
            write_lits(target, lits)?;
            writeln!(target)
        }
        Directive::Heuristic { modifier, atom, bias, prio, condition } => {
            let modifier = match modifier {
                HeuristicModifier::Level => 0,
                HeuristicModifier::Sign => 1,
                HeuristicModifier::Factor => 2,
                HeuristicModifier::Init => 3,
                HeuristicModifier::True => 4,
                HeuristicModifier::False => 5,
            };
            write!(target, "7 {} {} {} {} ", modifier, atom, bias, prio)?;
            write_lits(target, condition)?;
            writeln!(target)
        }
        Directive::Edge { u, v, condition } => {
            write!(target, "8 {} {} ", u, v)?;
            write_lits(target, condition)?;
            writeln!(target)
        }
        Directive::Theory(raw) => {
            write!(target, "9")?;
            for value in raw.iter().skip(1) {
                write!(target, " {}", value)?;
            }
            writeln!(target)
        }
        Directive::Comment(text) => writeln!(target, "10 {}", text),
    }
}

/// Write a full ASPIF stream: header, directives, and the trailing `0` terminator.
pub fn write_aspif(
    target: &mut impl io::Write,
    header: AspifHeader,
    directives: impl IntoIterator<Item = impl std::borrow::Borrow<Directive>>,
) -> io::Result<()> {
    write_aspif_header(target, header)?;
    for directive in directives {
        write_aspif_directive(target, directive.borrow())?;
    }
    writeln!(target, "0")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(n: isize) -> Lit {
        Lit::from_dimacs(n)
    }

    #[test]
    fn parses_header() {
        let mut parser = AspifParser::new();
        parser.parse_chunk(b"asp 1 0 0 incremental\n0\n").unwrap();
        parser.eof().unwrap();

        assert_eq!(
            parser.header(),
            Some(AspifHeader { major: 1, minor: 0, revision: 0, incremental: true })
        );
        assert_eq!(parser.take_directives(), vec![]);
    }

    #[test]
    fn parses_normal_rule() {
        let mut parser = AspifParser::new();
        parser.parse_chunk(b"asp 1 0 0\n1 0 1 1 0 2 2 -3\n0\n").unwrap();
        parser.eof().unwrap();

        assert_eq!(
            parser.take_directives(),
            vec![Directive::Rule {
                choice: false,
                head: vec![1],
                body: Body::Normal(vec![lit(2), lit(-3)]),
            }]
        );
    }

    #[test]
    fn parses_choice_rule_with_sum_body() {
        let mut parser = AspifParser::new();
        parser
            .parse_chunk(b"asp 1 0 0\n1 1 2 1 2 1 3 2 1 2 2 3\n0\n")
            .unwrap();
        parser.eof().unwrap();

        assert_eq!(
            parser.take_directives(),
            vec![Directive::Rule {
                choice: true,
                head: vec![1, 2],
                body: Body::Sum { bound: 3, terms: vec![(lit(1), 2), (lit(2), 3)] },
            }]
        );
    }

    #[test]
    fn parses_minimize_and_project() {
        let mut parser = AspifParser::new();
        parser
            .parse_chunk(b"asp 1 0 0\n2 0 2 1 5 -2 3\n3 1 4\n0\n")
            .unwrap();
        parser.eof().unwrap();

        assert_eq!(
            parser.take_directives(),
            vec![
                Directive::Minimize { priority: 0, terms: vec![(lit(1), 5), (lit(-2), 3)] },
                Directive::Project { atoms: vec![4] },
            ]
        );
    }

    #[test]
    fn parses_output_with_embedded_space() {
        let mut parser = AspifParser::new();
        parser
            .parse_chunk(b"asp 1 0 0\n4 7 a(1,2) 1 1\n0\n")
            .unwrap();
        parser.eof().unwrap();

        assert_eq!(
            parser.take_directives(),
            vec![Directive::Output { text: "a(1,2)".to_owned(), condition: vec![lit(1)] }]
        );
    }

    #[test]
    fn parses_external_assume_heuristic_edge() {
        let mut parser = AspifParser::new();
        parser
            .parse_chunk(b"asp 1 0 0\n5 1 2\n6 1 -1\n7 0 1 2 1 0\n8 1 2 0\n0\n")
            .unwrap();
        parser.eof().unwrap();

        assert_eq!(
            parser.take_directives(),
            vec![
                Directive::External { atom: 1, value: ExternalValue::False },
                Directive::Assume { lits: vec![lit(-1)] },
                Directive::Heuristic {
                    modifier: HeuristicModifier::Level,
                    atom: 1,
                    bias: 2,
                    prio: 1,
                    condition: vec![],
                },
                Directive::Edge { u: 1, v: 2, condition: vec![] },
            ]
        );
    }

    #[test]
    fn parses_across_chunk_boundaries() {
        let mut parser = AspifParser::new();
        parser.parse_chunk(b"asp 1 0 0\n1 0 1 1 0 1 ").unwrap();
        parser.parse_chunk(b"1\n0\n").unwrap();
        parser.eof().unwrap();

        assert_eq!(
            parser.take_directives(),
            vec![Directive::Rule { choice: false, head: vec![1], body: Body::Normal(vec![lit(1)]) }]
        );
    }

    #[test]
    fn rejects_invalid_header() {
        let mut parser = AspifParser::new();
        let err = parser.parse_chunk(b"not-asp 1 0 0\n").unwrap_err();
        assert!(matches!(err, ParserError::InvalidHeader { .. }));
    }

    #[test]
    fn rejects_unknown_tag() {
        let mut parser = AspifParser::new();
        parser.parse_chunk(b"asp 1 0 0\n").unwrap();
        let err = parser.parse_chunk(b"42 1 2\n").unwrap_err();
        assert!(matches!(err, ParserError::UnknownTag { tag: 42, .. }));
    }

    #[test]
    fn roundtrip_through_writer() {
        let header = AspifHeader { major: 1, minor: 0, revision: 0, incremental: false };
        let directives = vec![
            Directive::Rule {
                choice: false,
                head: vec![1],
                body: Body::Sum { bound: 2, terms: vec![(lit(2), 1), (lit(-3), 2)] },
            },
            Directive::Output { text: "p".to_owned(), condition: vec![lit(1)] },
            Directive::Minimize { priority: 0, terms: vec![(lit(1), 1)] },
        ];

        let mut buf = vec![];
        write_aspif(&mut buf, header, &directives).unwrap();

        let mut parser = AspifParser::new();
        parser.parse_chunk(&buf).unwrap();
        parser.eof().unwrap();

        assert_eq!(parser.header(), Some(header));
        assert_eq!(parser.take_directives(), directives);
    }
}
