//! Book catalog model, JSON persistence, and cover filename derivation.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::CoverError;

const MAX_FILENAME_COMPONENT_CHARS: usize = 50;
const COVER_EXTENSION: &str = "jpg";

/// One book record needing a cover image.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(
        rename = "coverImage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cover_image: Option<String>,
    /// Fields this tool does not interpret; written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogEntry {
    #[cfg(test)]
    pub fn new(title: &str, author: &str, isbn: Option<&str>) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            isbn: isbn.map(str::to_string),
            ..Self::default()
        }
    }

    /// Trimmed ISBN. A value with no alphanumeric characters counts as absent.
    pub fn isbn(&self) -> Option<&str> {
        self.isbn
            .as_deref()
            .map(str::trim)
            .filter(|isbn| isbn.chars().any(char::is_alphanumeric))
    }

    /// ISBN with hyphens and spaces removed, as provider APIs expect it.
    pub fn normalized_isbn(&self) -> Option<String> {
        self.isbn().map(normalize_isbn)
    }

    /// Text before the first comma of the author field.
    pub fn first_author(&self) -> &str {
        self.author.split(',').next().unwrap_or("")
    }

    /// Free-text `"{title} {author}"` query used by search providers.
    pub fn search_query(&self) -> String {
        format!("{} {}", self.title, self.author).trim().to_string()
    }
}

pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars().filter(|c| *c != '-' && *c != ' ').collect()
}

/// Keeps alphanumerics, space, hyphen, and underscore, then trims and truncates.
pub fn sanitize_filename_component(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim()
        .chars()
        .take(MAX_FILENAME_COMPONENT_CHARS)
        .collect()
}

/// Deterministic cover filename: `{isbn}.jpg`, else `{title}_{first author}.jpg`.
/// ISBNs differing only in characters outside `[alnum -_]` share a file.
pub fn cover_filename(entry: &CatalogEntry) -> String {
    if let Some(isbn) = entry.isbn() {
        let safe_isbn: String = isbn
            .chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
            .collect();
        return format!("{safe_isbn}.{COVER_EXTENSION}");
    }
    format!(
        "{}_{}.{COVER_EXTENSION}",
        sanitize_filename_component(&entry.title),
        sanitize_filename_component(entry.first_author())
    )
}

/// Reference stored in `coverImage` for a cover file.
pub fn cover_reference(prefix: &str, filename: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), filename)
}

/// Entries of one partition. Either a bare array, or an object with a
/// `books` array plus partition-level fields.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum CatalogPartition {
    Entries(Vec<CatalogEntry>),
    Section {
        books: Vec<CatalogEntry>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl CatalogPartition {
    pub fn entries(&self) -> &[CatalogEntry] {
        match self {
            Self::Entries(entries) => entries,
            Self::Section { books, .. } => books,
        }
    }

    pub fn entries_mut(&mut self) -> &mut Vec<CatalogEntry> {
        match self {
            Self::Entries(entries) => entries,
            Self::Section { books, .. } => books,
        }
    }
}

/// Catalog grouped by partition key, kept in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    partitions: Vec<(String, CatalogPartition)>,
}

impl Catalog {
    #[cfg(test)]
    pub fn from_partitions(partitions: Vec<(String, CatalogPartition)>) -> Self {
        Self { partitions }
    }

    #[cfg(test)]
    pub fn partitions(&self) -> &[(String, CatalogPartition)] {
        &self.partitions
    }

    pub fn entry_count(&self) -> usize {
        self.partitions
            .iter()
            .map(|(_, partition)| partition.entries().len())
            .sum()
    }

    #[cfg(test)]
    pub fn entries(&self) -> impl Iterator<Item = (&str, &CatalogEntry)> {
        self.partitions.iter().flat_map(|(key, partition)| {
            let key = key.as_str();
            partition.entries().iter().map(move |entry| (key, entry))
        })
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = (&str, &mut CatalogEntry)> {
        self.partitions.iter_mut().flat_map(|(key, partition)| {
            let key = key.as_str();
            partition
                .entries_mut()
                .iter_mut()
                .map(move |entry| (key, entry))
        })
    }

    pub fn from_json_str(text: &str, source: &Path) -> Result<Self, CoverError> {
        let root: Value =
            serde_json::from_str(text).map_err(|error| CoverError::CatalogParse {
                path: source.to_path_buf(),
                source: error,
            })?;
        let Value::Object(root) = root else {
            return Err(CoverError::CatalogShape(
                "top level must be an object keyed by partition".to_string(),
            ));
        };

        let mut partitions = Vec::with_capacity(root.len());
        for (key, value) in root {
            let partition = serde_json::from_value::<CatalogPartition>(value).map_err(|error| {
                CoverError::CatalogShape(format!("partition '{key}': {error}"))
            })?;
            partitions.push((key, partition));
        }
        Ok(Self { partitions })
    }

    pub fn to_json_string(&self) -> Result<String, CoverError> {
        let mut root = Map::new();
        for (key, partition) in &self.partitions {
            let value = serde_json::to_value(partition).map_err(CoverError::CatalogSerialize)?;
            root.insert(key.clone(), value);
        }
        let mut text = serde_json::to_string_pretty(&Value::Object(root))
            .map_err(CoverError::CatalogSerialize)?;
        text.push('\n');
        Ok(text)
    }

    pub fn load(path: &Path) -> Result<Self, CoverError> {
        let text = fs::read_to_string(path).map_err(|source| CoverError::read(path, source))?;
        Self::from_json_str(&text, path)
    }

    /// Full rewrite via a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<(), CoverError> {
        let text = self.to_json_string()?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CoverError::write(parent, source))?;
        }
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, text).map_err(|source| CoverError::write(&temp_path, source))?;
        fs::rename(&temp_path, path).map_err(|source| CoverError::write(path, source))?;
        Ok(())
    }
}
