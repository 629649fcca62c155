#![forbid(unsafe_code)]
//! manhtml converts man pages written in the man(7) troff macros into HTML.
//!
//! # Example
//!
//! ```no_run
//! let page = ".TH ls 1\n.SH NAME\nls \\- list directory contents\n";
//! let html = manhtml::convert_str(page, &manhtml::Metadata::default())?;
//! assert!(html.contains("<h1 id=\"ls.1\">ls(1)</h1>"));
//! # Ok::<(), manhtml::ManError>(())
//! ```
//!
//! Several pages can share one document by feeding them to the same
//! [`Converter`]:
//!
//! ```no_run
//! let stdout = std::io::stdout();
//! let mut converter = manhtml::Converter::new(stdout.lock(), manhtml::Metadata::default());
//! converter.convert_file("ls.1")?;
//! converter.convert_file("cat.1")?;
//! converter.finish()?;
//! # Ok::<(), manhtml::ManError>(())
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub mod convert;
pub mod html;
pub mod lexer;
pub mod lookup;
pub mod options;
pub mod reader;
pub mod render;

pub use convert::{Converter, Diagnostic, DiagnosticKind};
pub use html::{anchor, write_escaped};
pub use lexer::{Escapes, MAX_VALUE_LEN, ValueLexer, parse_measurement};
pub use lookup::{FsLookup, PageLookup};
pub use options::{BUILTIN_SCHEMA, Metadata};
pub use render::Font;

#[derive(Debug, Error)]
pub enum ManError {
    #[error("unable to open '{}': {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("unable to read stylesheet '{}': {source}", path.display())]
    Stylesheet { path: PathBuf, source: io::Error },
    #[error("{file}:{line}: missing title in '.TH'")]
    MissingTitle { file: String, line: usize },
    #[error("{file}:{line}: missing section in '.TH'")]
    MissingSection { file: String, line: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("yaml parse error: {0}")]
    Yaml(String),
    #[error("schema validation error: {0}")]
    Schema(String),
}

pub type Result<T> = std::result::Result<T, ManError>;

/// Converts a single page held in memory into a complete HTML document.
///
/// Cross-references resolve against the current directory.
pub fn convert_str(source: &str, metadata: &Metadata) -> Result<String> {
    let mut converter = Converter::new(Vec::new(), metadata.clone());
    converter.convert_reader("<string>", source.as_bytes())?;
    let out = converter.finish()?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
