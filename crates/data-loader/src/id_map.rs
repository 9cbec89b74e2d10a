//! Bidirectional mapping between external identifiers and dense indices.
//!
//! The factor matrices are addressed by row number, while requests and the
//! catalog speak in external ids. An `IdentifierMap` translates between the
//! two and guarantees the translation is a bijection onto `[0, len)`.

use crate::error::{DataLoadError, LookupError, Result};
use crate::types::EntityKind;
use std::collections::HashMap;

/// Bijective external id <-> internal index table for one entity kind
#[derive(Debug, Clone)]
pub struct IdentifierMap {
    kind: EntityKind,
    forward: HashMap<u32, usize>,
    /// `inverse[index]` is the external id stored at that index
    inverse: Vec<u32>,
}

impl IdentifierMap {
    /// Build a map from explicit `(external id, index)` pairs.
    ///
    /// Fails with `MalformedMapping` if an external id or an index appears
    /// twice, or if the indices do not cover `[0, count)` exactly.
    pub fn from_pairs<I>(kind: EntityKind, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, usize)>,
    {
        let pairs: Vec<(u32, usize)> = pairs.into_iter().collect();
        let count = pairs.len();
        let mut forward = HashMap::with_capacity(count);
        let mut slots: Vec<Option<u32>> = vec![None; count];

        for (external, index) in pairs {
            if index >= count {
                return Err(malformed(
                    kind,
                    format!("index {index} for id {external} outside [0, {count})"),
                ));
            }
            if forward.insert(external, index).is_some() {
                return Err(malformed(kind, format!("duplicate external id {external}")));
            }
            if let Some(previous) = slots[index].replace(external) {
                return Err(malformed(
                    kind,
                    format!("index {index} assigned to both {previous} and {external}"),
                ));
            }
        }

        // Every slot is filled: `count` distinct indices below `count`.
        let inverse = slots.into_iter().flatten().collect();
        Ok(Self {
            kind,
            forward,
            inverse,
        })
    }

    /// Build a map where each id's index is its position in `ids`
    pub fn from_ordered<I>(kind: EntityKind, ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = u32>,
    {
        Self::from_pairs(kind, ids.into_iter().enumerate().map(|(idx, id)| (id, idx)))
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.inverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inverse.is_empty()
    }

    pub fn contains(&self, external: u32) -> bool {
        self.forward.contains_key(&external)
    }

    /// Resolve an external id to its dense index
    pub fn to_internal(&self, external: u32) -> std::result::Result<usize, LookupError> {
        self.forward
            .get(&external)
            .copied()
            .ok_or(LookupError::UnknownIdentifier {
                kind: self.kind,
                id: external,
            })
    }

    /// Resolve a dense index back to its external id
    pub fn try_to_external(&self, index: usize) -> std::result::Result<u32, LookupError> {
        self.inverse
            .get(index)
            .copied()
            .ok_or(LookupError::IndexOutOfRange {
                kind: self.kind,
                index,
                len: self.inverse.len(),
            })
    }

    /// Resolve a dense index back to its external id.
    ///
    /// # Panics
    /// If `index >= self.len()`. Indices only ever come from this map or
    /// from a model checked against it, so this is a defect, not bad input.
    pub fn to_external(&self, index: usize) -> u32 {
        self.inverse[index]
    }

    /// External ids in index order
    pub fn external_ids(&self) -> &[u32] {
        &self.inverse
    }

    /// `(external id, index)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.inverse.iter().enumerate().map(|(idx, &id)| (id, idx))
    }
}

fn malformed(kind: EntityKind, reason: String) -> DataLoadError {
    DataLoadError::MalformedMapping { kind, reason }
}
