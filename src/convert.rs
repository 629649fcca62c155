//! The macro interpreter: document state, macro rules and the HTML
//! prologue/epilogue.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::html::{anchor, capitalize_heading, write_escaped};
use crate::lexer::{Escapes, ValueLexer};
use crate::lookup::{FsLookup, PageLookup};
use crate::reader::LineReader;
use crate::render::Font;
use crate::{ManError, Metadata, Result};

const DEFAULT_INDENT: &str = "2.5em";
const DEFAULT_INSET: &str = "0.5in";

const BULLET_TAGS: [&[u8]; 4] = [b"\\(bu", b"\\[bu]", b"-", b"*"];

const LAYOUT_REQUESTS: [&[u8]; 6] = [b".PD", b".ad", b".na", b".hy", b".nh", b".ne"];

/// The macro language never nests blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Block {
    Paragraph,
    List,
    Preformatted,
}

impl Block {
    fn element(self) -> &'static str {
        match self {
            Block::Paragraph => "p",
            Block::List => "ul",
            Block::Preformatted => "pre",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heading {
    Topic,
    Section,
    Subsection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Unbalanced or misplaced structure; output is left as is.
    Structural,
    /// A construct that was dropped or passed through literally.
    Content,
}

/// A non-fatal problem found while converting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub file: String,
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.message)
    }
}

#[derive(Debug, Default)]
struct PageState {
    topic_seen: bool,
    warned: bool,
    break_text: &'static str,
}

/// Converts man pages into a single HTML document written to `W`.
///
/// Pages fed to one converter share a header and footer. Call
/// [`Converter::finish`] once all pages are converted.
pub struct Converter<W: Write, L: PageLookup = FsLookup> {
    pub(crate) out: W,
    lookup: L,
    metadata: Metadata,
    header_written: bool,
    base_path: PathBuf,
    pub(crate) block: Option<Block>,
    link_open: bool,
    indent_depth: usize,
    pub(crate) font: Font,
    pub(crate) in_heading: bool,
    topic_anchor: String,
    section_anchor: String,
    file: String,
    line: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<W: Write> Converter<W, FsLookup> {
    pub fn new(out: W, metadata: Metadata) -> Self {
        Self::with_lookup(out, metadata, FsLookup)
    }
}

impl<W: Write, L: PageLookup> Converter<W, L> {
    pub fn with_lookup(out: W, metadata: Metadata, lookup: L) -> Self {
        Self {
            out,
            lookup,
            metadata,
            header_written: false,
            base_path: PathBuf::from("."),
            block: None,
            link_open: false,
            indent_depth: 0,
            font: Font::Regular,
            in_heading: false,
            topic_anchor: String::new(),
            section_anchor: String::new(),
            file: String::new(),
            line: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    /// Directory that `.BR name (section)` cross-references resolve against.
    pub fn set_base_path(&mut self, base_path: impl Into<PathBuf>) {
        self.base_path = base_path.into();
    }

    /// Converts the page at `path`, resolving cross-references against the
    /// directory that contains it.
    pub fn convert_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ManError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let base = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        self.set_base_path(base);
        self.convert_reader(&path.display().to_string(), BufReader::new(file))
    }

    /// Converts one page read from `reader`; `name` is used in diagnostics.
    pub fn convert_reader<R: BufRead>(&mut self, name: &str, reader: R) -> Result<()> {
        debug!("converting {name}");
        self.file = name.to_string();
        self.line = 0;

        let mut lines = LineReader::new(reader);
        let mut page = PageState::default();
        while let Some(line) = lines.next_line()? {
            self.line = lines.line_number();
            if line.first() == Some(&b'.') {
                self.dispatch(&line, &mut lines, &mut page)?;
            } else if page.topic_seen {
                self.ensure_container()?;
                self.render_text(&line)?;
                self.end_line(&mut page)?;
            } else if !line.is_empty() && !page.warned {
                self.warn(DiagnosticKind::Structural, "ignoring text before '.TH'".to_string());
                page.warned = true;
            }
        }
        Ok(())
    }

    /// Closes whatever is still open, writes the footer if a header was
    /// written, and hands back the output.
    pub fn finish(mut self) -> Result<W> {
        if self.header_written {
            self.close_block()?;
            self.close_link()?;
            while self.indent_depth > 0 {
                self.out.write_all(b"    </div>\n")?;
                self.indent_depth -= 1;
            }
            self.out.write_all(b"  </body>\n</html>\n")?;
            self.header_written = false;
        }
        self.out.flush()?;
        Ok(self.out)
    }

    pub(crate) fn warn(&mut self, kind: DiagnosticKind, message: String) {
        let diagnostic = Diagnostic {
            kind,
            file: self.file.clone(),
            line: self.line,
            message,
        };
        warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    fn dispatch<R: BufRead>(
        &mut self,
        line: &[u8],
        lines: &mut LineReader<R>,
        page: &mut PageState,
    ) -> Result<()> {
        let mut args = ValueLexer::new(line);
        let name = args.next_value().unwrap_or_default();
        let name = name.as_slice();

        if name == b"." {
            return Ok(());
        }
        if name == b".TH" {
            return self.topic_heading(&mut args, page);
        }
        if !page.topic_seen {
            if !page.warned {
                self.warn(
                    DiagnosticKind::Structural,
                    format!("need '.TH' before '{}' macro", String::from_utf8_lossy(name)),
                );
                page.warned = true;
            }
            return Ok(());
        }

        match name {
            b".B" => self.font_macro(Font::Bold, args.rest(), lines, page),
            b".I" => self.font_macro(Font::Italic, args.rest(), lines, page),
            b".SM" => self.font_macro(Font::Small, args.rest(), lines, page),
            b".SB" => self.font_macro(Font::SmallBold, args.rest(), lines, page),
            b".BI" => self.alternating(Font::Bold, Font::Italic, args.rest(), lines, page),
            b".BR" => self.alternating(Font::Bold, Font::Regular, args.rest(), lines, page),
            b".IB" => self.alternating(Font::Italic, Font::Bold, args.rest(), lines, page),
            b".IR" => self.alternating(Font::Italic, Font::Regular, args.rest(), lines, page),
            b".RB" => self.alternating(Font::Regular, Font::Bold, args.rest(), lines, page),
            b".RI" => self.alternating(Font::Regular, Font::Italic, args.rest(), lines, page),
            b".SH" => self.section_heading(Heading::Section, &mut args, lines, page),
            b".SS" => self.section_heading(Heading::Subsection, &mut args, lines, page),
            b".LP" | b".P" | b".PP" => self.open_block(Block::Paragraph, "    <p>"),
            b".HP" => self.hanging_paragraph(&mut args),
            b".TP" => {
                self.hanging_paragraph(&mut args)?;
                page.break_text = "<br>";
                Ok(())
            }
            b".IP" => self.list_item(&mut args, page),
            b".SY" => self.synopsis(args.rest()),
            b".YS" => {
                if self.block == Some(Block::Paragraph) {
                    self.close_block()
                } else {
                    self.warn(
                        DiagnosticKind::Structural,
                        "'.YS' seen without prior '.SY'".to_string(),
                    );
                    Ok(())
                }
            }
            b".EX" | b".nf" => self.open_block(Block::Preformatted, "    <pre>"),
            b".EE" | b".fi" => {
                if self.block == Some(Block::Preformatted) {
                    self.close_block()
                } else {
                    self.warn(
                        DiagnosticKind::Structural,
                        format!(
                            "'{}' with no '.EX' or '.nf'",
                            String::from_utf8_lossy(name)
                        ),
                    );
                    Ok(())
                }
            }
            b".RS" => {
                let indent = args
                    .next_measurement(b'n')
                    .unwrap_or_else(|| DEFAULT_INSET.to_string());
                self.push_indent(&indent)
            }
            b".RE" => {
                if self.indent_depth > 0 {
                    self.pop_indent()
                } else {
                    self.warn(DiagnosticKind::Structural, "unbalanced '.RE'".to_string());
                    Ok(())
                }
            }
            b".in" => match args.next_measurement(b'm') {
                Some(indent) => self.push_indent(&indent),
                None if self.indent_depth > 0 => self.pop_indent(),
                None => {
                    self.warn(
                        DiagnosticKind::Structural,
                        "'.in' seen without prior '.in INDENT'".to_string(),
                    );
                    Ok(())
                }
            },
            b".UR" => self.start_link(&mut args, ""),
            b".MT" => self.start_link(&mut args, "mailto:"),
            b".UE" | b".ME" => self.end_link(args.rest()),
            b".br" => {
                self.out.write_all(b"<br>\n")?;
                Ok(())
            }
            b".sp" => {
                self.out.write_all(b"<br>&nbsp;<br>\n")?;
                Ok(())
            }
            other if LAYOUT_REQUESTS.contains(&other) => {
                debug!(
                    "{}:{}: ignoring layout request '{}'",
                    self.file,
                    self.line,
                    String::from_utf8_lossy(other)
                );
                Ok(())
            }
            other => {
                self.warn(
                    DiagnosticKind::Content,
                    format!(
                        "unsupported command/macro '{}'",
                        String::from_utf8_lossy(other)
                    ),
                );
                Ok(())
            }
        }
    }

    fn topic_heading(&mut self, args: &mut ValueLexer<'_>, page: &mut PageState) -> Result<()> {
        let title = match args.next_value() {
            Some(title) if !title.is_empty() => title,
            _ => {
                return Err(ManError::MissingTitle {
                    file: self.file.clone(),
                    line: self.line,
                });
            }
        };
        let section = match args.next_value() {
            Some(section) if section.first().is_some_and(u8::is_ascii_digit) => section,
            _ => {
                return Err(ManError::MissingSection {
                    file: self.file.clone(),
                    line: self.line,
                });
            }
        };

        let mut topic = title.clone();
        topic.push(b'(');
        topic.extend_from_slice(&section);
        topic.push(b')');

        if !self.header_written {
            self.write_header(&topic)?;
        }
        self.topic_anchor = format!("{}.{}", anchor(&title), anchor(&section));
        self.write_heading(Heading::Topic, &topic)?;
        page.topic_seen = true;
        Ok(())
    }

    /// With no arguments the heading text comes from the next line, unless
    /// that line is itself a macro.
    fn section_heading<R: BufRead>(
        &mut self,
        heading: Heading,
        args: &mut ValueLexer<'_>,
        lines: &mut LineReader<R>,
        page: &mut PageState,
    ) -> Result<()> {
        let mut text = join_values(args);
        let mut pending = None;
        if text.is_empty() {
            let next = self.next_input_line(lines)?;
            if next.first() == Some(&b'.') {
                pending = Some(next);
            } else {
                text = join_values(&mut ValueLexer::new(&next));
            }
        }
        self.write_heading(heading, &text)?;
        match pending {
            Some(line) => self.dispatch(&line, lines, page),
            None => Ok(()),
        }
    }

    fn write_heading(&mut self, heading: Heading, text: &[u8]) -> Result<()> {
        let offset = if self.metadata.chapter.is_some() { 2 } else { 1 };
        let level = heading as usize + offset;

        self.close_block()?;
        self.close_link()?;

        let id = match heading {
            Heading::Topic => self.topic_anchor.clone(),
            Heading::Section => {
                self.section_anchor = anchor(text);
                format!("{}.{}", self.topic_anchor, self.section_anchor)
            }
            Heading::Subsection => format!(
                "{}.{}.{}",
                self.topic_anchor,
                self.section_anchor,
                anchor(text)
            ),
        };
        let display = match heading {
            Heading::Topic => text.to_vec(),
            Heading::Section | Heading::Subsection => capitalize_heading(text),
        };

        write!(self.out, "    <h{level} id=\"")?;
        write_escaped(&mut self.out, id.as_bytes())?;
        self.out.write_all(b"\">")?;
        self.in_heading = true;
        self.render_text(&display)?;
        self.close_font()?;
        self.in_heading = false;
        writeln!(self.out, "</h{level}>")?;
        Ok(())
    }

    fn write_header(&mut self, topic: &[u8]) -> Result<()> {
        self.header_written = true;
        self.out.write_all(b"<!DOCTYPE html>\n<html>\n  <head>\n")?;

        if let Some(stylesheet) = &self.metadata.stylesheet {
            if stylesheet.starts_with("http://") || stylesheet.starts_with("https://") {
                self.out
                    .write_all(b"    <link rel=\"stylesheet\" type=\"text/css\" href=\"")?;
                write_escaped(&mut self.out, stylesheet.as_bytes())?;
                self.out.write_all(b"\">\n")?;
            } else {
                let css = fs::read(stylesheet).map_err(|source| ManError::Stylesheet {
                    path: PathBuf::from(stylesheet),
                    source,
                })?;
                self.out.write_all(b"    <style><!--\n")?;
                self.out.write_all(&css)?;
                if !css.ends_with(b"\n") {
                    self.out.write_all(b"\n")?;
                }
                self.out.write_all(b"--></style>\n")?;
            }
        }

        write_meta(&mut self.out, "author", self.metadata.author.as_deref())?;
        write_meta(&mut self.out, "copyright", self.metadata.copyright.as_deref())?;
        let creator = format!("manhtml v{}", env!("CARGO_PKG_VERSION"));
        write_meta(&mut self.out, "creator", Some(&creator))?;
        write_meta(&mut self.out, "subject", self.metadata.subject.as_deref())?;

        let title = self
            .metadata
            .title
            .as_deref()
            .map(str::as_bytes)
            .unwrap_or(if topic.is_empty() {
                &b"Documentation"[..]
            } else {
                topic
            });
        self.out.write_all(b"    <title>")?;
        write_escaped(&mut self.out, title)?;
        self.out.write_all(b"</title>\n  </head>\n  <body>\n")?;

        if let Some(chapter) = &self.metadata.chapter {
            write!(self.out, "    <h1 id=\"{}\">", anchor(chapter.as_bytes()))?;
            write_escaped(&mut self.out, chapter.as_bytes())?;
            self.out.write_all(b"</h1>\n")?;
        }
        Ok(())
    }

    fn font_macro<R: BufRead>(
        &mut self,
        font: Font,
        rest: &[u8],
        lines: &mut LineReader<R>,
        page: &mut PageState,
    ) -> Result<()> {
        let next;
        let text = if rest.is_empty() {
            next = self.next_input_line(lines)?;
            next.as_slice()
        } else {
            rest
        };

        let saved = self.font;
        self.set_font(font)?;
        self.render_text(text)?;
        self.set_font(saved)?;
        self.end_line(page)
    }

    // `.BR name (N)` pairs become links when the page exists.
    fn alternating<R: BufRead>(
        &mut self,
        first: Font,
        second: Font,
        rest: &[u8],
        lines: &mut LineReader<R>,
        page: &mut PageState,
    ) -> Result<()> {
        let next;
        let text = if rest.is_empty() {
            next = self.next_input_line(lines)?;
            next.as_slice()
        } else {
            rest
        };

        let saved = self.font;
        let cross_references = first == Font::Bold && second == Font::Regular;
        let mut words = ValueLexer::new(text);
        let mut use_first = true;
        while let Some(word) = words.next_value() {
            let mut linked = false;
            if cross_references && use_first {
                let following = words.peek_value();
                if let Some(section) = following.as_deref().and_then(cross_reference_section) {
                    if self.lookup.page_exists(&self.base_path, &word, section) {
                        self.set_font(Font::Regular)?;
                        self.out.write_all(b"<a href=\"")?;
                        write_escaped(&mut self.out, &word)?;
                        self.out.write_all(b".html\">")?;
                        linked = true;
                    }
                }
            }

            self.set_font(if use_first { first } else { second })?;
            self.render_text(&word)?;

            if linked {
                let section = words.next_value().unwrap_or_default();
                self.set_font(second)?;
                self.render_text(&section)?;
                self.out.write_all(b"</a>")?;
            } else {
                use_first = !use_first;
            }
        }

        self.set_font(saved)?;
        self.out.write_all(b"\n")?;
        self.end_line(page)
    }

    fn list_item(&mut self, args: &mut ValueLexer<'_>, page: &mut PageState) -> Result<()> {
        let tag = args.next_value();
        let indent = tag
            .as_ref()
            .and_then(|_| args.next_measurement(b'n'))
            .unwrap_or_else(|| DEFAULT_INDENT.to_string());

        self.close_link()?;
        if self.block == Some(Block::List) {
            self.close_font()?;
        } else {
            self.close_block()?;
            self.out.write_all(b"    <ul>\n")?;
        }

        let bullet = tag
            .as_deref()
            .is_some_and(|tag| BULLET_TAGS.contains(&tag));
        let style = if bullet { "" } else { "list-style-type: none; " };
        write!(self.out, "    <li style=\"{style}margin-left: {indent};\">")?;
        self.block = Some(Block::List);
        page.break_text = "";
        Ok(())
    }

    fn hanging_paragraph(&mut self, args: &mut ValueLexer<'_>) -> Result<()> {
        let indent = args
            .next_measurement(b'n')
            .unwrap_or_else(|| DEFAULT_INDENT.to_string());
        self.open_block(
            Block::Paragraph,
            &format!("    <p style=\"margin-left: {indent}; text-indent: -{indent};\">"),
        )
    }

    fn synopsis(&mut self, command: &[u8]) -> Result<()> {
        self.open_block(Block::Paragraph, "    <p style=\"font-family: monospace;\">")?;
        if !command.is_empty() {
            self.set_font(Font::Bold)?;
            self.render_text(command)?;
            self.set_font(Font::Regular)?;
            self.out.write_all(b" ")?;
        }
        Ok(())
    }

    fn start_link(&mut self, args: &mut ValueLexer<'_>, scheme: &str) -> Result<()> {
        let Some(target) = args
            .next_value_with(Escapes::Unescape)
            .filter(|target| !target.is_empty())
        else {
            return Ok(());
        };
        let font = self.font;
        self.close_link()?;
        self.close_font()?;
        self.ensure_container()?;
        write!(self.out, "<a href=\"{scheme}")?;
        write_escaped(&mut self.out, &target)?;
        self.out.write_all(b"\">")?;
        self.link_open = true;
        self.set_font(font)
    }

    fn end_link(&mut self, trailing: &[u8]) -> Result<()> {
        if !self.link_open {
            return Ok(());
        }
        let font = self.font;
        self.close_font()?;
        self.out.write_all(b"</a>")?;
        self.link_open = false;
        self.set_font(font)?;
        self.render_text(trailing)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn push_indent(&mut self, indent: &str) -> Result<()> {
        self.close_block()?;
        writeln!(self.out, "    <div style=\"margin-left: {indent};\">")?;
        self.indent_depth += 1;
        Ok(())
    }

    fn pop_indent(&mut self) -> Result<()> {
        self.close_block()?;
        self.out.write_all(b"    </div>\n")?;
        self.indent_depth -= 1;
        Ok(())
    }

    fn open_block(&mut self, block: Block, open_tag: &str) -> Result<()> {
        self.close_block()?;
        self.out.write_all(open_tag.as_bytes())?;
        self.block = Some(block);
        Ok(())
    }

    fn close_block(&mut self) -> Result<()> {
        if let Some(block) = self.block {
            self.close_font()?;
            self.close_link()?;
            writeln!(self.out, "</{}>", block.element())?;
            self.block = None;
        }
        Ok(())
    }

    /// A font span opened inside the link is closed with it.
    fn close_link(&mut self) -> Result<()> {
        if self.link_open {
            self.close_font()?;
            self.out.write_all(b"</a>\n")?;
            self.link_open = false;
        }
        Ok(())
    }

    fn end_line(&mut self, page: &mut PageState) -> Result<()> {
        self.out.write_all(page.break_text.as_bytes())?;
        self.out.write_all(b"\n")?;
        page.break_text = "";
        Ok(())
    }

    fn next_input_line<R: BufRead>(&mut self, lines: &mut LineReader<R>) -> Result<Vec<u8>> {
        let line = lines.next_line()?.unwrap_or_default();
        self.line = lines.line_number();
        Ok(line)
    }
}

fn write_meta<W: Write>(out: &mut W, name: &str, content: Option<&str>) -> Result<()> {
    if let Some(content) = content {
        write!(out, "    <meta name=\"{name}\" content=\"")?;
        write_escaped(out, content.as_bytes())?;
        out.write_all(b"\">\n")?;
    }
    Ok(())
}

fn join_values(args: &mut ValueLexer<'_>) -> Vec<u8> {
    let mut text = Vec::new();
    while let Some(value) = args.next_value() {
        if !text.is_empty() {
            text.push(b' ');
        }
        text.extend_from_slice(&value);
    }
    text
}

/// `3` in `(3),`.
fn cross_reference_section(token: &[u8]) -> Option<&[u8]> {
    if token.first() != Some(&b'(') || !token.get(1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let close = token.iter().position(|&byte| byte == b')')?;
    Some(&token[1..close])
}
