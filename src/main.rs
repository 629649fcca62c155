#![forbid(unsafe_code)]

use clap::Parser;
use log::{LevelFilter, debug};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use manhtml::{Converter, Metadata};

#[derive(Debug, Parser)]
#[command(name = "manhtml", version, about = "Convert man pages to HTML")]
struct Cli {
    /// Author written to the author meta tag
    #[arg(long = "author", value_name = "AUTHOR")]
    author: Option<String>,

    /// Chapter heading placed above the pages
    #[arg(long = "chapter", value_name = "CHAPTER")]
    chapter: Option<String>,

    #[arg(long = "copyright", value_name = "COPYRIGHT")]
    copyright: Option<String>,

    /// Stylesheet to link (http/https URL) or embed (local file)
    #[arg(long = "css", value_name = "FILE-OR-URL")]
    css: Option<String>,

    #[arg(long = "subject", value_name = "SUBJECT")]
    subject: Option<String>,

    /// Document title; defaults to the first page's topic
    #[arg(long = "title", value_name = "TITLE")]
    title: Option<String>,

    /// YAML file with default metadata
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(short = 'o', long = "output", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Log ignored requests and progress
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Man pages to convert; `-` reads standard input
    #[arg(value_name = "MAN-FILE", required = true)]
    files: Vec<String>,
}

impl Cli {
    fn metadata(&self) -> manhtml::Result<Metadata> {
        let base = match &self.config {
            Some(path) => Metadata::from_yaml_file(path)?,
            None => Metadata::default(),
        };
        Ok(base.merge(Metadata {
            author: self.author.clone(),
            chapter: self.chapter.clone(),
            copyright: self.copyright.clone(),
            stylesheet: self.css.clone(),
            subject: self.subject.clone(),
            title: self.title.clone(),
        }))
    }
}

fn open_output(path: Option<&PathBuf>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(path) => Ok(Box::new(BufWriter::new(File::create(path)?))),
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let metadata = cli.metadata()?;
    let out = open_output(cli.output.as_ref())?;
    let mut converter = Converter::new(out, metadata);

    for file in &cli.files {
        if file == "-" {
            converter.set_base_path(".");
            converter.convert_reader("<stdin>", io::stdin().lock())?;
        } else {
            converter.convert_file(file)?;
        }
    }

    let converted = converter.header_written();
    converter.finish()?;
    if !converted {
        return Err("no man page with a '.TH' topic was converted".into());
    }
    debug!("converted {} file(s)", cli.files.len());
    Ok(())
}
