//! The catalog record and the rules deriving its fields.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Artist assigned to names without a `-` separator.
pub const UNKNOWN_ARTIST: &str = "Desconhecido";

/// Every tag starts with this character.
pub const TAG_MARKER: char = '#';

lazy_static! {
    static ref PDF_SUFFIX: Regex =
        Regex::new(r"(?i)(\.pdf)+$").expect("Invalid Regex, this should be fixed at compile time.");
}

/// Metadata of one stored document. The bytes themselves live in the blob
/// store under the same `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredRecord")]
pub struct Record {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub favorite: bool,
    pub collection: String,
    pub tags: Vec<String>,
    /// `data:` URL of the first page, if the rasterizer produced one.
    pub preview: Option<String>,
}

/// Lenient shape used when reading snapshots written by older versions.
#[derive(Deserialize)]
struct StoredRecord {
    id: String,
    name: String,
    artist: Option<String>,
    #[serde(default)]
    favorite: bool,
    #[serde(default)]
    collection: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    preview: Option<String>,
}

impl From<StoredRecord> for Record {
    fn from(stored: StoredRecord) -> Self {
        let artist = stored
            .artist
            .unwrap_or_else(|| artist_from_name(&stored.name));
        Record {
            id: stored.id,
            name: stored.name,
            artist,
            favorite: stored.favorite,
            collection: stored.collection.unwrap_or_default(),
            tags: stored.tags.unwrap_or_default(),
            preview: stored.preview.filter(|p| !p.is_empty()),
        }
    }
}

impl Record {
    /// A fresh record as produced by ingestion: not a favorite, no
    /// collection, no tags.
    pub fn new(id: impl Into<String>, name: impl Into<String>, preview: Option<String>) -> Self {
        let name = name.into();
        Record {
            id: id.into(),
            artist: artist_from_name(&name),
            name,
            favorite: false,
            collection: String::new(),
            tags: vec![],
            preview,
        }
    }

    /// Replaces the name and re-derives the artist from it.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.artist = artist_from_name(&self.name);
    }

    /// Case-insensitive substring match against the name or any tag.
    /// `lowercase_term` must already be lowercased.
    pub(crate) fn matches_term(&self, lowercase_term: &str) -> bool {
        if lowercase_term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(lowercase_term)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(lowercase_term))
    }
}

/// Display name for an uploaded file: the file name with any run of trailing
/// `.pdf` suffixes removed, whatever their case.
pub fn name_from_filename(filename: &str) -> String {
    PDF_SUFFIX.replace(filename, "").into_owned()
}

/// The trimmed text before the first `-`, or [`UNKNOWN_ARTIST`].
pub fn artist_from_name(name: &str) -> String {
    match name.split_once('-') {
        Some((artist, _)) => artist.trim().to_owned(),
        None => UNKNOWN_ARTIST.to_owned(),
    }
}

/// Splits free text into tags. Only whitespace-separated tokens starting with
/// [`TAG_MARKER`] and longer than the marker survive; repeats are dropped.
pub fn parse_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = vec![];
    for token in text.split_whitespace().map(str::trim) {
        if token.starts_with(TAG_MARKER)
            && token.chars().count() > 1
            && !tags.iter().any(|t| t == token)
        {
            tags.push(token.to_owned());
        }
    }
    tags
}
