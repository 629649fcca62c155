//! Logical line reading for man page sources.

use std::io::{self, BufRead};

/// Reads logical lines: backslash-newline joins physical lines and `\"`
/// starts a comment that runs to the end of the physical line.
///
/// Other escapes are passed through untouched for the renderer.
pub struct LineReader<R> {
    reader: R,
    raw: Vec<u8>,
    line_number: usize,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            raw: Vec::new(),
            line_number: 0,
        }
    }

    /// 1-based number of the last physical line consumed.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut logical = Vec::new();
        let mut read_any = false;

        loop {
            self.raw.clear();
            if self.reader.read_until(b'\n', &mut self.raw)? == 0 {
                return Ok(read_any.then_some(logical));
            }
            read_any = true;
            self.line_number += 1;

            let had_newline = self.raw.last() == Some(&b'\n');
            if had_newline {
                self.raw.pop();
                if self.raw.last() == Some(&b'\r') {
                    self.raw.pop();
                }
            }

            match split_physical(&self.raw, &mut logical) {
                LineEnd::Continued if had_newline => continue,
                _ => return Ok(Some(logical)),
            }
        }
    }
}

enum LineEnd {
    Complete,
    Continued,
    Comment,
}

fn split_physical(raw: &[u8], logical: &mut Vec<u8>) -> LineEnd {
    let mut pos = 0;
    while pos < raw.len() {
        if raw[pos] == b'\\' {
            match raw.get(pos + 1) {
                None => return LineEnd::Continued,
                Some(b'"') => return LineEnd::Comment,
                Some(&next) => {
                    logical.push(b'\\');
                    logical.push(next);
                    pos += 2;
                    continue;
                }
            }
        }
        logical.push(raw[pos]);
        pos += 1;
    }
    LineEnd::Complete
}
