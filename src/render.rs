//! Inline text: troff escapes, font spans and URL autolinking.

use std::io::Write;

use crate::convert::{Block, Converter, DiagnosticKind};
use crate::html::write_escaped;
use crate::lexer::MAX_VALUE_LEN;
use crate::lookup::PageLookup;
use crate::Result;

/// Inline font; at most one span is open at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Font {
    #[default]
    Regular,
    Bold,
    Italic,
    Small,
    SmallBold,
    Monospace,
}

impl Font {
    fn open_tag(self) -> &'static str {
        match self {
            Font::Regular => "",
            Font::Bold => "<strong>",
            Font::Italic => "<em>",
            Font::Small => "<small>",
            Font::SmallBold => "<small style=\"font-weight: bold;\">",
            Font::Monospace => "<code>",
        }
    }

    fn element(self) -> Option<&'static str> {
        match self {
            Font::Regular => None,
            Font::Bold => Some("strong"),
            Font::Italic => Some("em"),
            Font::Small | Font::SmallBold => Some("small"),
            Font::Monospace => Some("code"),
        }
    }

    fn from_name(name: &[u8]) -> Option<Font> {
        match name {
            b"R" | b"P" | b"r" | b"" => Some(Font::Regular),
            b"B" | b"b" => Some(Font::Bold),
            b"I" | b"i" => Some(Font::Italic),
            b"C" | b"CW" | b"CR" => Some(Font::Monospace),
            _ => None,
        }
    }
}

fn glyph(name: &[u8]) -> Option<&'static str> {
    let text = match name {
        b"aq" => "'",
        b"bu" => "&middot;",
        b"co" => "&copy;",
        b"cq" => "&rsquo;",
        b"de" => "&deg;",
        b"dq" => "&quot;",
        b"em" => "&mdash;",
        b"en" => "&ndash;",
        b"ga" => "`",
        b"ha" => "^",
        b"hy" => "-",
        b"lq" => "&ldquo;",
        b"mc" => "&mu;",
        b"mi" => "&minus;",
        b"oq" => "&lsquo;",
        b"R" | b"rg" => "&reg;",
        b"rq" => "&rdquo;",
        b"rs" => "\\",
        b"ti" => "~",
        b"tm" | b"Tm" => "<sup>TM</sup>",
        _ => return None,
    };
    Some(text)
}

// `(xx`, `[name]` or a single character; `None` for an unterminated bracket.
fn escape_name(text: &[u8], at: usize) -> Option<(&[u8], usize)> {
    match text.get(at)? {
        b'(' => {
            let end = (at + 3).min(text.len());
            Some((&text[at + 1..end], end))
        }
        b'[' => {
            let close = text[at..].iter().position(|&byte| byte == b']')? + at;
            Some((&text[at + 1..close], close + 1))
        }
        _ => Some((&text[at..at + 1], at + 1)),
    }
}

fn is_octal(byte: u8) -> bool {
    (b'0'..=b'7').contains(&byte)
}

fn starts_url(text: &[u8]) -> bool {
    text.starts_with(b"http://") || text.starts_with(b"https://")
}

fn ends_url(text: &[u8], pos: usize) -> bool {
    matches!(text[pos], b',' | b'.' | b')')
        && text
            .get(pos + 1)
            .is_none_or(|next| matches!(next, b',' | b'.' | b' ' | b'\t' | b'\r' | b'\n'))
}

impl<W: Write, L: PageLookup> Converter<W, L> {
    fn has_container(&self) -> bool {
        self.block.is_some() || self.in_heading
    }

    /// Opens a plain paragraph when nothing is open to hold inline content.
    pub(crate) fn ensure_container(&mut self) -> Result<()> {
        if !self.has_container() {
            self.out.write_all(b"<p>")?;
            self.block = Some(Block::Paragraph);
        }
        Ok(())
    }

    pub(crate) fn set_font(&mut self, font: Font) -> Result<()> {
        if self.font == font && self.has_container() {
            return Ok(());
        }
        if let Some(element) = self.font.element() {
            write!(self.out, "</{element}>")?;
        }
        self.ensure_container()?;
        self.out.write_all(font.open_tag().as_bytes())?;
        self.font = font;
        Ok(())
    }

    pub(crate) fn close_font(&mut self) -> Result<()> {
        if let Some(element) = self.font.element() {
            write!(self.out, "</{element}>")?;
        }
        self.font = Font::Regular;
        Ok(())
    }

    /// Writes body text as HTML.
    pub fn render_text(&mut self, text: &[u8]) -> Result<()> {
        let mut start = 0;
        let mut pos = 0;
        while pos < text.len() {
            let byte = text[pos];
            if byte == b'\\' && pos + 1 < text.len() {
                self.out.write_all(&text[start..pos])?;
                pos = self.render_escape(text, pos + 1)?;
                start = pos;
            } else if byte == b'h' && starts_url(&text[pos..]) {
                self.out.write_all(&text[start..pos])?;
                pos = self.render_url(text, pos)?;
                start = pos;
            } else if matches!(byte, b'&' | b'<' | b'"') {
                self.out.write_all(&text[start..pos])?;
                write_escaped(&mut self.out, &text[pos..pos + 1])?;
                pos += 1;
                start = pos;
            } else {
                pos += 1;
            }
        }
        self.out.write_all(&text[start..])?;
        Ok(())
    }

    fn render_escape(&mut self, text: &[u8], at: usize) -> Result<usize> {
        let code = text[at];
        let has_name = at + 1 < text.len();
        match code {
            b'f' if has_name => self.font_escape(text, at),
            b'*' if has_name => match escape_name(text, at + 1) {
                Some((name, end)) => {
                    self.emit_glyph(name, end, "string", &text[at - 1..end])
                }
                None => self.unrecognized_escape(code, at),
            },
            b'(' | b'[' => match escape_name(text, at) {
                Some((name, end)) => {
                    self.emit_glyph(name, end, "character", &text[at - 1..end])
                }
                None => self.unrecognized_escape(code, at),
            },
            digit
                if is_octal(digit)
                    && text.get(at + 1).copied().is_some_and(is_octal)
                    && text.get(at + 2).copied().is_some_and(is_octal) =>
            {
                let value = text[at..at + 3]
                    .iter()
                    .fold(0u32, |acc, &byte| acc * 8 + u32::from(byte - b'0'));
                write!(self.out, "&#{value};")?;
                Ok(at + 3)
            }
            b'e' => {
                self.out.write_all(b"\\")?;
                Ok(at + 1)
            }
            b'\\' | b'"' | b'\'' | b'-' | b' ' | b'.' => {
                write_escaped(&mut self.out, &text[at..at + 1])?;
                Ok(at + 1)
            }
            b'&' | b'%' | b'|' | b'^' | b')' => Ok(at + 1),
            other => self.unrecognized_escape(other, at),
        }
    }

    fn unrecognized_escape(&mut self, code: u8, at: usize) -> Result<usize> {
        self.warn(
            DiagnosticKind::Content,
            format!("unrecognized escape '\\{}'", char::from(code)),
        );
        self.out.write_all(b"\\")?;
        write_escaped(&mut self.out, &[code])?;
        Ok(at + 1)
    }

    fn font_escape(&mut self, text: &[u8], at: usize) -> Result<usize> {
        let Some((name, end)) = escape_name(text, at + 1) else {
            return self.unrecognized_escape(text[at], at);
        };
        match Font::from_name(name) {
            Some(font) => self.set_font(font)?,
            None => self.warn(
                DiagnosticKind::Content,
                format!(
                    "unknown font '{}' ignored",
                    String::from_utf8_lossy(&text[at - 1..end])
                ),
            ),
        }
        Ok(end)
    }

    fn emit_glyph(&mut self, name: &[u8], end: usize, what: &str, sequence: &[u8]) -> Result<usize> {
        match glyph(name) {
            Some(replacement) => self.out.write_all(replacement.as_bytes())?,
            None => self.warn(
                DiagnosticKind::Content,
                format!(
                    "unknown {what} '{}' ignored",
                    String::from_utf8_lossy(sequence)
                ),
            ),
        }
        Ok(end)
    }

    fn render_url(&mut self, text: &[u8], start: usize) -> Result<usize> {
        let mut url = Vec::new();
        let mut pos = start;
        while pos < text.len() && !text[pos].is_ascii_whitespace() && url.len() < MAX_VALUE_LEN {
            if ends_url(text, pos) {
                break;
            }
            if text[pos] == b'\\' && pos + 1 < text.len() {
                match text[pos + 1] {
                    b'f' | b'(' | b'[' | b'*' => break,
                    b'&' | b'%' | b'|' | b'^' | b')' => {}
                    b'e' => url.push(b'\\'),
                    literal => url.push(literal),
                }
                pos += 2;
                continue;
            }
            url.push(text[pos]);
            pos += 1;
        }

        self.out.write_all(b"<a href=\"")?;
        write_escaped(&mut self.out, &url)?;
        self.out.write_all(b"\">")?;
        write_escaped(&mut self.out, &url)?;
        self.out.write_all(b"</a>")?;
        Ok(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metadata;

    fn converter() -> Converter<Vec<u8>> {
        let mut converter = Converter::new(Vec::new(), Metadata::default());
        converter.block = Some(Block::Paragraph);
        converter
    }

    fn render(text: &str) -> (String, usize) {
        let mut converter = converter();
        converter.render_text(text.as_bytes()).expect("render");
        let warnings = converter.diagnostics().len();
        (String::from_utf8(converter.out).expect("utf-8 output"), warnings)
    }

    #[test]
    fn plain_text_is_unchanged() {
        let text = "Plain text with (parens), 'quotes' and > arrows.";
        assert_eq!(render(text), (text.to_string(), 0));
    }

    #[test]
    fn quotes_html_characters() {
        let (html, _) = render(r#"a < b && "c""#);
        assert_eq!(html, "a &lt; b &amp;&amp; &quot;c&quot;");
    }

    #[test]
    fn font_escapes_open_and_close_spans() {
        let (html, warnings) = render(r"\fBbold\fR and \fIitalic\fP \fCcode\fR");
        assert_eq!(
            html,
            "<strong>bold</strong> and <em>italic</em> <code>code</code>"
        );
        assert_eq!(warnings, 0);
    }

    #[test]
    fn unknown_font_is_reported_and_ignored() {
        let (html, warnings) = render(r"\fXtext");
        assert_eq!(html, "text");
        assert_eq!(warnings, 1);
    }

    #[test]
    fn glyphs_and_strings() {
        let (html, warnings) = render(r"\(em \[co] \*R \*(Tm \(bu \[lq]x\[rq] \*(aq");
        assert_eq!(
            html,
            "&mdash; &copy; &reg; <sup>TM</sup> &middot; &ldquo;x&rdquo; '"
        );
        assert_eq!(warnings, 0);
    }

    #[test]
    fn unknown_glyphs_are_dropped_with_a_warning() {
        let (html, warnings) = render(r"a\(zzb\[nope]c\*(qqd");
        assert_eq!(html, "abcd");
        assert_eq!(warnings, 3);
    }

    #[test]
    fn octal_codes_and_literal_escapes() {
        let (html, warnings) = render(r"\101\-\\\e\ \&.\.");
        assert_eq!(html, "&#65;-\\\\ ..");
        assert_eq!(warnings, 0);
    }

    #[test]
    fn unrecognized_escape_is_kept_literally() {
        let (html, warnings) = render(r"x\qy");
        assert_eq!(html, "x\\qy");
        assert_eq!(warnings, 1);
    }

    #[test]
    fn trailing_backslash_is_literal() {
        assert_eq!(render("end\\"), ("end\\".to_string(), 0));
    }

    #[test]
    fn autolinks_urls_and_trims_punctuation() {
        let (html, _) = render("See https://example.com/a\\-b. Done");
        assert_eq!(
            html,
            "See <a href=\"https://example.com/a-b\">https://example.com/a-b</a>. Done"
        );

        let (html, _) = render("(http://example.com/x?a=1&b=2)");
        assert_eq!(
            html,
            "(<a href=\"http://example.com/x?a=1&amp;b=2\">http://example.com/x?a=1&amp;b=2</a>)"
        );
    }

    #[test]
    fn url_stops_at_font_escape() {
        let (html, _) = render(r"\fBhttps://example.com\fR!");
        assert_eq!(
            html,
            "<strong><a href=\"https://example.com\">https://example.com</a></strong>!"
        );
    }

    #[test]
    fn repeated_font_emits_single_tag() {
        let mut converter = converter();
        converter.set_font(Font::Bold).expect("font");
        converter.set_font(Font::Bold).expect("font");
        converter.set_font(Font::Regular).expect("font");
        assert_eq!(converter.out, b"<strong></strong>");
    }

    #[test]
    fn small_bold_is_one_tag() {
        let mut converter = converter();
        converter.set_font(Font::SmallBold).expect("font");
        converter.set_font(Font::Italic).expect("font");
        assert_eq!(
            String::from_utf8(converter.out).expect("utf-8"),
            "<small style=\"font-weight: bold;\"></small><em>"
        );
    }

    #[test]
    fn font_change_opens_paragraph_when_nothing_is_open() {
        let mut converter = Converter::new(Vec::new(), Metadata::default());
        converter.set_font(Font::Italic).expect("font");
        assert_eq!(converter.out, b"<p><em>");
        assert_eq!(converter.block, Some(Block::Paragraph));
    }
}
