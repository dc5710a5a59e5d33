//! Catalog records, the engine that owns them, and their read-only views.

mod collation;
mod engine;
mod record;
mod view;

pub use collation::{compare as compare_names, CollationKey};
pub use engine::{BlobRemoval, CatalogEngine, CatalogView};
pub use record::{
    artist_from_name, name_from_filename, parse_tags, Record, TAG_MARKER, UNKNOWN_ARTIST,
};
pub use view::{Facets, ViewQuery};
