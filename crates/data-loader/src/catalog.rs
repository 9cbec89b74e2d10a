//! Item metadata keyed by external item id.
//!
//! Rankings never depend on the catalog; it is only consulted to turn a
//! ranked item id into something presentable.

use crate::types::{InteractionRecord, ItemId, MetadataEntry};
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

/// Read-only lookup table of `MetadataEntry` values
#[derive(Debug, Clone, Default)]
pub struct MetadataCatalog {
    entries: HashMap<ItemId, MetadataEntry>,
}

impl MetadataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = MetadataEntry>,
    {
        let mut catalog = Self::new();
        let mut duplicates = 0usize;
        for entry in entries {
            if !catalog.insert(entry) {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            debug!("Ignored {} duplicate catalog rows", duplicates);
        }
        catalog
    }

    /// Insert `entry` unless its item id already has one.
    ///
    /// The first row for an id wins. Returns `false` when `entry` was ignored.
    pub fn insert(&mut self, entry: MetadataEntry) -> bool {
        match self.entries.entry(entry.item_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    pub fn lookup(&self, item_id: ItemId) -> Option<&MetadataEntry> {
        self.entries.get(&item_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.values()
    }

    /// Fill `average_rating` / `total_ratings` for entries whose source row
    /// carried no statistics, computing them from explicit ratings.
    ///
    /// Entries that already have an average keep it. Records without a
    /// rating value are ignored.
    pub fn fill_rating_stats(&mut self, records: &[InteractionRecord]) {
        let mut per_item: HashMap<ItemId, Vec<f32>> = HashMap::new();
        for record in records {
            if let Some(rating) = record.rating {
                per_item.entry(record.item_id).or_default().push(rating);
            }
        }

        let stats: HashMap<ItemId, (f64, u32)> = per_item
            .par_iter()
            .map(|(&item_id, ratings)| {
                let count = ratings.len() as u32;
                let total: f64 = ratings.iter().map(|&r| f64::from(r)).sum();
                (item_id, (total / f64::from(count), count))
            })
            .collect();

        for entry in self.entries.values_mut() {
            if entry.average_rating.is_some() {
                continue;
            }
            if let Some(&(average, count)) = stats.get(&entry.item_id) {
                entry.average_rating = Some(average);
                entry.total_ratings = count;
            }
        }
    }

    /// Case-insensitive title search.
    ///
    /// Exact title matches come first, then substring matches; within each
    /// group entries are ordered by item id.
    pub fn search_title(&self, query: &str) -> Vec<&MetadataEntry> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<(u8, &MetadataEntry)> = self
            .entries
            .values()
            .filter_map(|entry| {
                let title = entry.title.to_lowercase();
                if title == needle {
                    Some((0, entry))
                } else if title.contains(&needle) {
                    Some((1, entry))
                } else {
                    None
                }
            })
            .collect();

        matches.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.item_id.cmp(&b.1.item_id)));
        matches.into_iter().map(|(_, entry)| entry).collect()
    }
}

/// Split a `|`-joined genre field into its parts.
///
/// Surrounding whitespace is trimmed and empty parts are dropped, so an empty
/// or blank field yields an empty list.
pub fn split_genres(field: &str) -> Vec<String> {
    field
        .split('|')
        .map(str::trim)
        .filter(|genre| !genre.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_genres() {
        assert_eq!(
            split_genres("Animation|Children's| Comedy"),
            vec!["Animation", "Children's", "Comedy"]
        );
        assert!(split_genres("").is_empty());
        assert!(split_genres("  ").is_empty());
        assert_eq!(split_genres("Drama||"), vec!["Drama"]);
    }

    #[test]
    fn test_lookup_missing_is_none() {
        let catalog = MetadataCatalog::from_entries(vec![MetadataEntry::new(1, "Toy Story (1995)")]);

        assert_eq!(catalog.lookup(1).unwrap().title, "Toy Story (1995)");
        assert!(catalog.lookup(2).is_none());
    }

    #[test]
    fn test_duplicate_ids_keep_first_entry() {
        let catalog = MetadataCatalog::from_entries(vec![
            MetadataEntry::new(1, "First"),
            MetadataEntry::new(2, "Other"),
            MetadataEntry::new(1, "Second"),
        ]);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.lookup(1).unwrap().title, "First");
    }

    #[test]
    fn test_fill_rating_stats() {
        let mut catalog = MetadataCatalog::from_entries(vec![
            MetadataEntry::new(1, "Computed"),
            MetadataEntry::new(2, "Precomputed").with_rating_stats(4.9, 1000),
            MetadataEntry::new(3, "Unrated"),
        ]);
        let records = vec![
            InteractionRecord::rated(1, 1, 4.0),
            InteractionRecord::rated(2, 1, 3.0),
            InteractionRecord::rated(1, 2, 1.0),
            InteractionRecord::new(3, 3),
        ];

        catalog.fill_rating_stats(&records);

        let computed = catalog.lookup(1).unwrap();
        assert_eq!(computed.average_rating, Some(3.5));
        assert_eq!(computed.total_ratings, 2);

        let precomputed = catalog.lookup(2).unwrap();
        assert_eq!(precomputed.average_rating, Some(4.9));
        assert_eq!(precomputed.total_ratings, 1000);

        let unrated = catalog.lookup(3).unwrap();
        assert_eq!(unrated.average_rating, None);
        assert_eq!(unrated.total_ratings, 0);
    }

    #[test]
    fn test_search_title_orders_exact_first() {
        let catalog = MetadataCatalog::from_entries(vec![
            MetadataEntry::new(3, "Alien"),
            MetadataEntry::new(1, "Aliens"),
            MetadataEntry::new(2, "Alien Nation"),
            MetadataEntry::new(4, "Heat"),
        ]);

        let ids: Vec<ItemId> = catalog.search_title("ALIEN").iter().map(|e| e.item_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(catalog.search_title(" ").is_empty());
    }
}
