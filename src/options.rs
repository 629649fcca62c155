//! Document metadata and the YAML file it can be loaded from.

use std::fs;
use std::path::Path;

use jsonschema::validator_for;
use serde_json::Value as JsonValue;
use yaml_rust2::{Yaml, YamlLoader};

use crate::{ManError, Result};

pub const BUILTIN_SCHEMA: &str = include_str!("../data/metadata_schema.yml");

/// Strings written into the HTML prologue. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub author: Option<String>,
    /// Heading placed above every page; shifts page headings down a level.
    pub chapter: Option<String>,
    pub copyright: Option<String>,
    /// A `http(s)://` URL to link, or a local file to embed.
    pub stylesheet: Option<String>,
    pub subject: Option<String>,
    pub title: Option<String>,
}

impl Metadata {
    /// Parses a metadata mapping after checking it against
    /// [`BUILTIN_SCHEMA`].
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let docs = YamlLoader::load_from_str(yaml).map_err(|err| ManError::Yaml(err.to_string()))?;
        let root = docs
            .into_iter()
            .next()
            .ok_or_else(|| ManError::Yaml("empty metadata document".to_string()))?;
        check_schema(&root)?;

        let Yaml::Hash(fields) = root else {
            return Err(ManError::Schema("metadata must be a mapping".to_string()));
        };
        let mut metadata = Metadata::default();
        for (key, value) in fields {
            let (Yaml::String(key), Yaml::String(value)) = (key, value) else {
                return Err(ManError::Schema("metadata values must be strings".to_string()));
            };
            let slot = match key.as_str() {
                "author" => &mut metadata.author,
                "chapter" => &mut metadata.chapter,
                "copyright" => &mut metadata.copyright,
                "stylesheet" => &mut metadata.stylesheet,
                "subject" => &mut metadata.subject,
                "title" => &mut metadata.title,
                other => return Err(ManError::Schema(format!("unknown metadata key '{other}'"))),
            };
            *slot = Some(value);
        }
        Ok(metadata)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|source| ManError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Fields set in `overrides` replace the ones in `self`.
    pub fn merge(self, overrides: Metadata) -> Metadata {
        Metadata {
            author: overrides.author.or(self.author),
            chapter: overrides.chapter.or(self.chapter),
            copyright: overrides.copyright.or(self.copyright),
            stylesheet: overrides.stylesheet.or(self.stylesheet),
            subject: overrides.subject.or(self.subject),
            title: overrides.title.or(self.title),
        }
    }
}

fn check_schema(document: &Yaml) -> Result<()> {
    let schema_docs =
        YamlLoader::load_from_str(BUILTIN_SCHEMA).map_err(|err| ManError::Schema(err.to_string()))?;
    let schema = schema_docs
        .first()
        .map(json_of)
        .ok_or_else(|| ManError::Schema("empty schema document".to_string()))?;
    let validator = validator_for(&schema).map_err(|err| ManError::Schema(err.to_string()))?;
    validator
        .validate(&json_of(document))
        .map_err(|err| ManError::Schema(err.to_string()))
}

/// JSON view of a YAML node, as the schema validator expects it.
fn json_of(node: &Yaml) -> JsonValue {
    match node {
        Yaml::String(text) => JsonValue::from(text.as_str()),
        Yaml::Integer(number) => JsonValue::from(*number),
        Yaml::Real(text) => text
            .parse::<f64>()
            .map_or_else(|_| JsonValue::from(text.as_str()), JsonValue::from),
        Yaml::Boolean(flag) => JsonValue::from(*flag),
        Yaml::Array(items) => items.iter().map(json_of).collect(),
        Yaml::Hash(entries) => entries
            .iter()
            .map(|(key, value)| {
                let key = key.as_str().map_or_else(|| format!("{key:?}"), str::to_string);
                (key, json_of(value))
            })
            .collect(),
        Yaml::Null | Yaml::Alias(_) | Yaml::BadValue => JsonValue::Null,
    }
}
