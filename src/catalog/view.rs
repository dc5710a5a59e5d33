//! Read-only projections of the canonical sequence: filtered views and facets.

use super::collation::{self, CollationKey};
use super::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What the list should show. Empty strings in `artist`/`collection` mean
/// "no filter", like a cleared drop-down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewQuery {
    pub search_term: String,
    pub favorites_only: bool,
    pub artist: Option<String>,
    pub collection: Option<String>,
}

impl ViewQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search_term: term.into(),
            ..Self::default()
        }
    }

    pub fn favorites_only(mut self, favorites_only: bool) -> Self {
        self.favorites_only = favorites_only;
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Filters and sorts `records` without touching their order.
    ///
    /// Favorites, artist and collection narrow the set first; the remainder is
    /// sorted by name and only then matched against the search term.
    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        let artist = self.artist.as_deref().filter(|a| !a.is_empty());
        let collection = self.collection.as_deref().filter(|c| !c.is_empty());

        let mut selected: Vec<&Record> = records
            .iter()
            .filter(|r| !self.favorites_only || r.favorite)
            .filter(|r| artist.map_or(true, |a| r.artist == a))
            .filter(|r| collection.map_or(true, |c| r.collection == c))
            .collect();

        collation::sort_by_name(&mut selected, |r| r.name.as_str());

        let term = self.search_term.to_lowercase();
        selected
            .into_iter()
            .filter(|r| r.matches_term(&term))
            .cloned()
            .collect()
    }
}

/// Distinct values offered as filter options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    /// In order of first appearance in the catalog.
    pub artists: Vec<String>,
    /// Alphabetical.
    pub collections: Vec<String>,
}

impl Facets {
    pub fn derive(records: &[Record]) -> Self {
        let mut seen_artists = HashSet::new();
        let artists = records
            .iter()
            .map(|r| r.artist.as_str())
            .filter(|a| !a.trim().is_empty() && seen_artists.insert(*a))
            .map(str::to_owned)
            .collect();

        let mut collections: Vec<String> = records
            .iter()
            .map(|r| r.collection.as_str())
            .filter(|c| !c.trim().is_empty())
            .collect::<HashSet<_>>()
            .into_iter()
            .map(str::to_owned)
            .collect();
        collections.sort_by_cached_key(|c| CollationKey::new(c));

        Facets {
            artists,
            collections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str) -> Record {
        Record::new(id, name, None)
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    fn sample() -> Vec<Record> {
        let mut a = record("1", "Tim Maia-Azul da Cor do Mar");
        a.favorite = true;
        a.collection = "Ensaio".into();
        a.tags = vec!["#ensaio".into()];

        let mut b = record("2", "Djavan-Oceano");
        b.collection = "Show".into();

        let mut c = record("3", "Tim Maia-Ela Partiu");
        c.favorite = true;
        c.collection = "Show".into();
        c.tags = vec!["#Romantica".into()];

        let d = record("4", "Avulsa");
        vec![a, b, c, d]
    }

    #[test]
    fn empty_query_sorts_everything_by_name() {
        let records = sample();
        let view = ViewQuery::all().apply(&records);
        assert_eq!(
            names(&view),
            vec![
                "Avulsa",
                "Djavan-Oceano",
                "Tim Maia-Azul da Cor do Mar",
                "Tim Maia-Ela Partiu"
            ]
        );
        // canonical order untouched
        assert_eq!(records[0].id, "1");
    }

    #[test]
    fn favorites_only_keeps_other_filters() {
        let records = sample();
        let view = ViewQuery::search("ela").favorites_only(true).apply(&records);
        assert_eq!(names(&view), vec!["Tim Maia-Ela Partiu"]);

        let view = ViewQuery::all()
            .favorites_only(true)
            .with_collection("Show")
            .apply(&records);
        assert_eq!(names(&view), vec!["Tim Maia-Ela Partiu"]);
    }

    #[test]
    fn artist_and_collection_are_exact_matches() {
        let records = sample();
        assert_eq!(
            names(&ViewQuery::all().with_artist("Tim Maia").apply(&records)),
            vec!["Tim Maia-Azul da Cor do Mar", "Tim Maia-Ela Partiu"]
        );
        assert!(ViewQuery::all()
            .with_artist("Tim")
            .apply(&records)
            .is_empty());
        assert_eq!(
            names(&ViewQuery::all().with_collection("Show").apply(&records)),
            vec!["Djavan-Oceano", "Tim Maia-Ela Partiu"]
        );
    }

    #[test]
    fn empty_filter_values_mean_no_filter() {
        let records = sample();
        let view = ViewQuery::all()
            .with_artist("")
            .with_collection("")
            .apply(&records);
        assert_eq!(view.len(), 4);
    }

    #[test]
    fn search_matches_tags() {
        let records = sample();
        for term in ["ensaio", "#ens", "ENSAIO"] {
            assert_eq!(
                names(&ViewQuery::search(term).apply(&records)),
                vec!["Tim Maia-Azul da Cor do Mar"],
                "term {term}"
            );
        }
        assert_eq!(
            names(&ViewQuery::search("romantica").apply(&records)),
            vec!["Tim Maia-Ela Partiu"]
        );
    }

    #[test]
    fn facets_are_distinct_and_non_empty() {
        let mut records = sample();
        records.push(record("5", "-Sem Artista"));
        let facets = Facets::derive(&records);

        assert_eq!(facets.artists, vec!["Tim Maia", "Djavan", "Desconhecido"]);
        assert_eq!(facets.collections, vec!["Ensaio", "Show"]);
    }
}
