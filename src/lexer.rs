//! Argument lexing for macro lines.
//!
//! A macro line is split into whitespace- or quote-delimited values. Values
//! keep their troff escapes by default so the text renderer can decode them
//! later; link targets ask for them to be resolved instead.

/// Longest value the lexer returns. Longer values are truncated silently and
/// the remainder of the value is still consumed.
pub const MAX_VALUE_LEN: usize = 1024;

/// How backslash escapes inside a value are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Escapes {
    /// Keep `\x` as the two bytes `\` and `x`.
    #[default]
    Preserve,
    /// Replace `\x` with `x`.
    Unescape,
}

/// Cursor over the arguments of a single line.
#[derive(Debug, Clone)]
pub struct ValueLexer<'a> {
    line: &'a [u8],
    pos: usize,
}

impl<'a> ValueLexer<'a> {
    pub fn new(line: &'a [u8]) -> Self {
        Self { line, pos: 0 }
    }

    /// The unconsumed part of the line.
    pub fn rest(&self) -> &'a [u8] {
        &self.line[self.pos..]
    }

    pub fn next_value(&mut self) -> Option<Vec<u8>> {
        self.next_value_with(Escapes::Preserve)
    }

    /// Returns the next value, or `None` once only whitespace remains.
    ///
    /// `""` yields `Some` of an empty value, which is how callers tell an
    /// explicitly empty argument apart from a missing one.
    pub fn next_value_with(&mut self, escapes: Escapes) -> Option<Vec<u8>> {
        let line = self.line;
        let mut pos = skip_space(line, self.pos);
        if pos >= line.len() {
            self.pos = pos;
            return None;
        }

        let quoted = line[pos] == b'"';
        if quoted {
            pos += 1;
        }

        let mut value = Vec::new();
        while pos < line.len() {
            let byte = line[pos];
            if quoted && byte == b'"' {
                break;
            }
            if !quoted && byte.is_ascii_whitespace() {
                break;
            }
            if byte == b'\\' && pos + 1 < line.len() {
                if escapes == Escapes::Preserve {
                    push_bounded(&mut value, b'\\');
                }
                push_bounded(&mut value, line[pos + 1]);
                pos += 2;
                continue;
            }
            push_bounded(&mut value, byte);
            pos += 1;
        }
        if quoted && pos < line.len() {
            pos += 1;
        }

        self.pos = skip_space(line, pos);
        Some(value)
    }

    pub fn peek_value(&self) -> Option<Vec<u8>> {
        self.clone().next_value()
    }

    /// Consumes a value and converts it with [`parse_measurement`].
    pub fn next_measurement(&mut self, default_unit: u8) -> Option<String> {
        let value = self.next_value()?;
        parse_measurement(&value, default_unit)
    }
}

fn push_bounded(value: &mut Vec<u8>, byte: u8) {
    if value.len() < MAX_VALUE_LEN {
        value.push(byte);
    }
}

fn skip_space(line: &[u8], mut pos: usize) -> usize {
    while pos < line.len() && line[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Converts a troff measurement such as `4n` or `0.5i` into a CSS length.
///
/// A trailing letter selects the unit, otherwise `default_unit` applies.
/// Returns `None` when the number does not parse or the unit is unknown.
///
/// ```
/// assert_eq!(manhtml::parse_measurement(b"10n", b'n').as_deref(), Some("5em"));
/// assert_eq!(manhtml::parse_measurement(b"0.5i", b'n').as_deref(), Some("0.5in"));
/// assert_eq!(manhtml::parse_measurement(b"3", b'm').as_deref(), Some("3em"));
/// ```
pub fn parse_measurement(value: &[u8], default_unit: u8) -> Option<String> {
    let text = std::str::from_utf8(value).ok()?;
    let (number, unit) = match text.as_bytes().last() {
        None => return None,
        Some(last) if last.is_ascii_alphabetic() => (&text[..text.len() - 1], *last),
        Some(_) => (text, default_unit),
    };
    let amount: f64 = number.parse().ok()?;

    let css = match unit {
        b'c' => format!("{number}cm"),
        b'i' => format!("{number}in"),
        b'm' => format!("{number}em"),
        b'P' => format!("{number}pc"),
        b'p' => format!("{number}pt"),
        b'u' => format!("{number}px"),
        b'v' => number.to_string(),
        b'M' => format!("{:.2}em", amount * 0.01),
        b'n' => format!("{}em", amount * 0.5),
        b'f' => format!("{:.1}%", amount * 100.0 / 655.36),
        b's' => format!("{:.1}%", amount * 100.0),
        _ => return None,
    };
    Some(css)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(line: &str) -> Vec<String> {
        let mut lexer = ValueLexer::new(line.as_bytes());
        let mut out = Vec::new();
        while let Some(value) = lexer.next_value() {
            out.push(String::from_utf8(value).expect("utf-8 value"));
        }
        out
    }

    #[test]
    fn splits_on_whitespace_and_quotes() {
        assert_eq!(values("  one two\tthree  "), ["one", "two", "three"]);
        assert_eq!(values(r#""SEE ALSO" more"#), ["SEE ALSO", "more"]);
        assert_eq!(values(r#""unterminated value"#), ["unterminated value"]);
    }

    #[test]
    fn empty_quotes_are_distinct_from_no_value() {
        let mut lexer = ValueLexer::new(br#""" next"#);
        assert_eq!(lexer.next_value(), Some(Vec::new()));
        assert_eq!(lexer.next_value(), Some(b"next".to_vec()));
        assert_eq!(lexer.next_value(), None);

        let mut blank = ValueLexer::new(b"   ");
        assert_eq!(blank.next_value(), None);
    }

    #[test]
    fn escaped_space_does_not_split_value() {
        assert_eq!(values(r"foo\ bar baz"), [r"foo\ bar", "baz"]);
    }

    #[test]
    fn unescape_mode_drops_backslashes() {
        let mut lexer = ValueLexer::new(br#"https://example.com/a\-b "q\"x""#);
        assert_eq!(
            lexer.next_value_with(Escapes::Unescape),
            Some(b"https://example.com/a-b".to_vec())
        );
        assert_eq!(lexer.next_value_with(Escapes::Unescape), Some(b"q\"x".to_vec()));
    }

    #[test]
    fn rest_and_peek_do_not_lose_input() {
        let mut lexer = ValueLexer::new(b".B bold text here");
        assert_eq!(lexer.next_value(), Some(b".B".to_vec()));
        assert_eq!(lexer.peek_value(), Some(b"bold".to_vec()));
        assert_eq!(lexer.rest(), b"bold text here");
    }

    #[test]
    fn long_values_are_truncated_not_rejected() {
        let long = "x".repeat(MAX_VALUE_LEN + 50);
        let line = format!("{long} tail");
        let mut lexer = ValueLexer::new(line.as_bytes());
        let first = lexer.next_value().expect("first value");
        assert_eq!(first.len(), MAX_VALUE_LEN);
        assert_eq!(lexer.next_value(), Some(b"tail".to_vec()));
    }

    #[test]
    fn measurement_units() {
        let cases = [
            ("10c", "10cm"),
            ("10i", "10in"),
            ("10m", "10em"),
            ("100M", "1.00em"),
            ("10n", "5em"),
            ("10P", "10pc"),
            ("10p", "10pt"),
            ("10u", "10px"),
            ("10f", "1.5%"),
            ("10s", "1000.0%"),
            ("10v", "10"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                parse_measurement(input.as_bytes(), b'n').as_deref(),
                Some(expected),
                "{input}"
            );
        }
    }

    #[test]
    fn measurement_default_unit_and_rejections() {
        assert_eq!(parse_measurement(b"5", b'n').as_deref(), Some("2.5em"));
        assert_eq!(parse_measurement(b"2", b'm').as_deref(), Some("2em"));
        assert_eq!(parse_measurement(b"3x", b'n'), None);
        assert_eq!(parse_measurement(b"abc", b'n'), None);
        assert_eq!(parse_measurement(b"", b'n'), None);
        assert_eq!(parse_measurement(b"n", b'n'), None);
    }
}
