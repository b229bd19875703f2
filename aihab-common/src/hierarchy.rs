//! Hierarchy resolution
//!
//! Expands a leaf habitat code into its ancestor chain, root first.
//!
//! UKHab places a code of length *k* at level *k + 1*: `g` is level 2,
//! `g1` level 3, `g1c` level 4. Root-level entries (`sea`, `montane`) are
//! the exception and resolve to a single level-1 rung with no definition.

use crate::error::TaxonomyError;
use crate::taxonomy::TaxonomyStore;
use serde::Serialize;

/// Deepest level a prediction can be requested at
pub const MAX_HIERARCHY_LEVEL: u32 = 5;

/// One rung of a resolved ancestor chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyLevel {
    /// Level in the tree (1 = coarsest)
    #[serde(rename = "uk_hab_level")]
    pub level: u32,
    pub code: String,
    pub name: String,
    pub definition: String,
}

/// Resolves leaf codes against a taxonomy store
#[derive(Debug, Clone, Copy)]
pub struct HierarchyResolver<'a> {
    store: &'a TaxonomyStore,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(store: &'a TaxonomyStore) -> Self {
        Self { store }
    }

    /// Resolve `leaf_code` into its ordered ancestor chain
    ///
    /// The chain runs root → leaf, levels strictly increasing by one, and its
    /// last element always carries `leaf_code`.
    ///
    /// # Errors
    /// `UnknownCode` naming the first prefix (or root-level code) missing from
    /// the store. A missing prefix is a taxonomy integrity fault; it is never
    /// skipped.
    pub fn resolve(&self, leaf_code: &str) -> Result<Vec<HierarchyLevel>, TaxonomyError> {
        if let Some(entry) = self.store.get(leaf_code).filter(|e| e.root_level) {
            return Ok(vec![HierarchyLevel {
                level: 1,
                code: entry.code.clone(),
                name: entry.name.clone(),
                definition: String::new(),
            }]);
        }

        if leaf_code.is_empty() {
            return Err(TaxonomyError::UnknownCode(String::new()));
        }

        let prefix_ends = leaf_code
            .char_indices()
            .skip(1)
            .map(|(idx, _)| idx)
            .chain(std::iter::once(leaf_code.len()));

        let mut chain = Vec::with_capacity(leaf_code.len());
        for (depth, end) in prefix_ends.enumerate() {
            let entry = self.store.lookup(&leaf_code[..end])?;
            chain.push(HierarchyLevel {
                level: depth as u32 + 2,
                code: entry.code.clone(),
                name: entry.name.clone(),
                definition: entry.definition.clone(),
            });
        }

        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::TaxonomyEntry;

    fn store() -> TaxonomyStore {
        TaxonomyStore::from_entries(vec![
            TaxonomyEntry::new("g", "Grassland", "Grass-dominated vegetation."),
            TaxonomyEntry::new("g1", "Acid grassland", "On acidic soils."),
            TaxonomyEntry::new("g1c", "Bracken", "Dominated by bracken."),
            TaxonomyEntry::new("w", "Woodland and forest", "Tree cover."),
            TaxonomyEntry::root_level("sea", "Sea"),
            TaxonomyEntry::root_level("montane", "Montane"),
        ])
    }

    #[test]
    fn test_resolve_full_chain() {
        let store = store();
        let chain = HierarchyResolver::new(&store).resolve("g1c").unwrap();

        let codes: Vec<&str> = chain.iter().map(|l| l.code.as_str()).collect();
        let levels: Vec<u32> = chain.iter().map(|l| l.level).collect();
        assert_eq!(codes, vec!["g", "g1", "g1c"]);
        assert_eq!(levels, vec![2, 3, 4]);
        assert_eq!(chain[2].name, "Bracken");
        assert_eq!(chain[0].definition, "Grass-dominated vegetation.");
    }

    #[test]
    fn test_single_character_code_is_level_two() {
        let store = store();
        let chain = HierarchyResolver::new(&store).resolve("w").unwrap();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].level, 2);
        assert_eq!(chain[0].code, "w");
    }

    #[test]
    fn test_root_level_codes_resolve_to_level_one() {
        let store = store();
        let resolver = HierarchyResolver::new(&store);

        for code in ["sea", "montane"] {
            let chain = resolver.resolve(code).unwrap();
            assert_eq!(chain.len(), 1, "{code} should resolve to one level");
            assert_eq!(chain[0].level, 1);
            assert_eq!(chain[0].code, code);
            assert_eq!(chain[0].definition, "");
        }
        assert_eq!(resolver.resolve("sea").unwrap()[0].name, "Sea");
    }

    #[test]
    fn test_root_level_definition_is_blanked() {
        let mut entry = TaxonomyEntry::root_level("sea", "Sea");
        entry.definition = "Open sea beyond the low-water mark.".to_string();
        let store = TaxonomyStore::from_entries(vec![entry]);

        let chain = HierarchyResolver::new(&store).resolve("sea").unwrap();
        assert_eq!(chain[0].definition, "");
    }

    #[test]
    fn test_prefix_gap_fails() {
        let store = TaxonomyStore::from_entries(vec![
            TaxonomyEntry::new("g", "Grassland", ""),
            TaxonomyEntry::new("g1a", "Orphan", ""),
        ]);

        let err = HierarchyResolver::new(&store).resolve("g1a").unwrap_err();
        assert_eq!(err, TaxonomyError::UnknownCode("g1".to_string()));
    }

    #[test]
    fn test_unknown_leaf_fails() {
        let store = store();
        let err = HierarchyResolver::new(&store).resolve("g1z").unwrap_err();
        assert_eq!(err, TaxonomyError::UnknownCode("g1z".to_string()));
    }

    #[test]
    fn test_empty_code_fails() {
        let store = store();
        assert!(HierarchyResolver::new(&store).resolve("").is_err());
    }

    #[test]
    fn test_level_serializes_with_wire_name() {
        let level = HierarchyLevel {
            level: 3,
            code: "g1".to_string(),
            name: "Acid grassland".to_string(),
            definition: String::new(),
        };

        let json = serde_json::to_value(&level).unwrap();
        assert_eq!(json["uk_hab_level"], 3);
        assert!(json.get("level").is_none());
    }
}
