//! HTML output helpers: entity quoting, anchor ids and heading case.

use std::io::{self, Write};

/// Longest anchor id produced by [`anchor`].
pub const MAX_ANCHOR_LEN: usize = 255;

const MINOR_WORDS: [&[u8]; 4] = [b"a", b"and", b"or", b"the"];

fn entity(byte: u8) -> Option<&'static [u8]> {
    match byte {
        b'&' => Some(b"&amp;"),
        b'<' => Some(b"&lt;"),
        b'"' => Some(b"&quot;"),
        _ => None,
    }
}

/// Writes `text`, replacing `&`, `<` and `"` with entities.
///
/// Runs between special characters are written in one call.
pub fn write_escaped<W: Write + ?Sized>(out: &mut W, text: &[u8]) -> io::Result<()> {
    let mut start = 0;
    for (pos, &byte) in text.iter().enumerate() {
        if let Some(replacement) = entity(byte) {
            out.write_all(&text[start..pos])?;
            out.write_all(replacement)?;
            start = pos + 1;
        }
    }
    out.write_all(&text[start..])
}

pub(crate) fn escape_end(text: &[u8], pos: usize) -> usize {
    let len = text.len();
    let name_end = |at: usize| match text.get(at) {
        Some(b'(') => (at + 3).min(len),
        Some(b'[') => text[at..]
            .iter()
            .position(|&byte| byte == b']')
            .map_or(len, |close| at + close + 1),
        Some(_) => at + 1,
        None => at,
    };
    match text.get(pos + 1) {
        Some(b'f') | Some(b'*') => name_end(pos + 2),
        Some(b'(') | Some(b'[') => name_end(pos + 1),
        Some(_) => pos + 2,
        None => pos + 1,
    }
}

/// Builds an anchor id: lowercase alphanumerics, `.` and `-` are kept,
/// runs of `(`, space and tab collapse to a single `-`, escapes and
/// everything else are dropped.
pub fn anchor(text: &[u8]) -> String {
    let mut out = String::new();
    let mut pos = 0;
    while pos < text.len() && out.len() < MAX_ANCHOR_LEN {
        let byte = text[pos];
        if byte == b'\\' {
            pos = escape_end(text, pos);
            continue;
        }
        if byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-' {
            out.push(char::from(byte.to_ascii_lowercase()));
        } else if matches!(byte, b'(' | b' ' | b'\t')
            && pos + 1 < text.len()
            && !out.is_empty()
            && !out.ends_with('-')
        {
            out.push('-');
        }
        pos += 1;
    }
    out
}

/// Title-cases heading text one word at a time.
///
/// Minor words keep lowercase unless they open the heading or end it.
/// Escape sequences pass through untouched.
pub fn capitalize_heading(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut pos = 0;
    while pos < text.len() {
        let byte = text[pos];
        if byte == b'\\' {
            let end = escape_end(text, pos);
            out.extend_from_slice(&text[pos..end]);
            pos = end;
        } else if byte.is_ascii_alphabetic() {
            let end = text[pos..]
                .iter()
                .position(|byte| !byte.is_ascii_alphabetic())
                .map_or(text.len(), |len| pos + len);
            let word = &text[pos..end];
            let minor = pos > 0
                && text.get(end) == Some(&b' ')
                && MINOR_WORDS
                    .iter()
                    .any(|candidate| word.eq_ignore_ascii_case(candidate));
            for (index, letter) in word.iter().enumerate() {
                if index == 0 && !minor {
                    out.push(letter.to_ascii_uppercase());
                } else {
                    out.push(letter.to_ascii_lowercase());
                }
            }
            pos = end;
        } else {
            out.push(byte);
            pos += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_only_sensitive_characters() {
        let mut out = Vec::new();
        write_escaped(&mut out, b"x > y && \"z\" < w").expect("write");
        assert_eq!(out, b"x > y &amp;&amp; &quot;z&quot; &lt; w");

        let mut plain = Vec::new();
        write_escaped(&mut plain, b"plain text").expect("write");
        assert_eq!(plain, b"plain text");
    }

    #[test]
    fn anchors_collapse_separators() {
        assert_eq!(anchor(b"SEE ALSO"), "see-also");
        assert_eq!(anchor(b"ls(1)"), "ls-1");
        assert_eq!(anchor(b"  Leading"), "leading");
        assert_eq!(anchor(b"a  (b)"), "a-b");
        assert_eq!(anchor(b"trailing "), "trailing");
        assert_eq!(anchor(b"v1.2-rc"), "v1.2-rc");
        assert_eq!(anchor(b"\\fBBold\\fR Name"), "bold-name");
    }

    #[test]
    fn anchors_are_bounded() {
        let long = vec![b'a'; MAX_ANCHOR_LEN * 2];
        assert_eq!(anchor(&long).len(), MAX_ANCHOR_LEN);
    }

    #[test]
    fn capitalizes_words_but_not_minor_ones() {
        assert_eq!(capitalize_heading(b"NAME"), b"Name");
        assert_eq!(capitalize_heading(b"SEE ALSO"), b"See Also");
        assert_eq!(
            capitalize_heading(b"FILES AND DIRECTORIES"),
            b"Files and Directories"
        );
        assert_eq!(capitalize_heading(b"THE END OR A START"), b"The End or a Start");
        assert_eq!(capitalize_heading(b"WHAT TO DO AND"), b"What To Do And");
    }

    #[test]
    fn capitalization_skips_escapes() {
        assert_eq!(
            capitalize_heading(b"\\fBEXIT\\fR STATUS"),
            b"\\fBExit\\fR Status"
        );
        assert_eq!(capitalize_heading(b"OPTIONS \\(em MORE"), b"Options \\(em More");
    }
}
