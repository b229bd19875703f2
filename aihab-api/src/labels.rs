//! Model output index → UKHab code table
//!
//! Static configuration loaded once alongside the model. Index `i` of the
//! probability vector returned by the classifier belongs to `codes[i]`.

use aihab_common::{Error, HierarchyResolver, Result, TaxonomyStore};

/// Output order of the released habitat network
pub const DEFAULT_LABELS: [&str; 20] = [
    "u1",      // Built-up areas and gardens
    "w1",      // Broadleaved and mixed woodland
    "w2",      // Coniferous woodland
    "sea",     // Sea
    "c1",      // Arable and horticulture
    "g4",      // Modified grassland
    "g3",      // Neutral grassland
    "g2",      // Calcareous grassland
    "g1",      // Acid grassland
    "g1c",     // Bracken
    "h1",      // Dwarf shrub heath
    "f2",      // Fen, marsh and swamp
    "f1",      // Bog
    "t1",      // Littoral rock
    "t2",      // Littoral sediment
    "montane", // Montane
    "r1",      // Standing open water and canals
    "s1",      // Inland rock
    "s2",      // Supralittoral rock
    "s3",      // Supralittoral sediment
];

/// Ordered habitat codes, one per model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    codes: Vec<String>,
}

impl LabelTable {
    /// Table matching the released network
    pub fn default_ukhab() -> Self {
        Self {
            codes: DEFAULT_LABELS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Table from configuration
    ///
    /// Rejects empty tables and duplicate codes.
    pub fn from_codes(codes: Vec<String>) -> Result<Self> {
        if codes.is_empty() {
            return Err(Error::Config("label table is empty".to_string()));
        }
        for (i, code) in codes.iter().enumerate() {
            if codes[..i].contains(code) {
                return Err(Error::Config(format!(
                    "label table lists '{}' more than once",
                    code
                )));
            }
        }
        Ok(Self { codes })
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn code(&self, index: usize) -> Option<&str> {
        self.codes.get(index).map(String::as_str)
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Check that every label resolves to a full chain in `store`
    pub fn verify(&self, store: &TaxonomyStore) -> Result<()> {
        let resolver = HierarchyResolver::new(store);
        for code in &self.codes {
            resolver.resolve(code)?;
        }
        Ok(())
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::default_ukhab()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aihab_common::{TaxonomyEntry, TaxonomyError};

    #[test]
    fn test_default_table_order() {
        let labels = LabelTable::default_ukhab();

        assert_eq!(labels.len(), 20);
        assert_eq!(labels.code(0), Some("u1"));
        assert_eq!(labels.code(3), Some("sea"));
        assert_eq!(labels.code(15), Some("montane"));
        assert_eq!(labels.code(19), Some("s3"));
        assert_eq!(labels.code(20), None);
    }

    #[test]
    fn test_duplicate_codes_rejected() {
        let result = LabelTable::from_codes(vec!["g1".into(), "w1".into(), "g1".into()]);
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("g1")));
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(LabelTable::from_codes(Vec::new()).is_err());
    }

    #[test]
    fn test_verify_reports_missing_prefix() {
        let store = TaxonomyStore::from_entries(vec![
            TaxonomyEntry::new("g", "Grassland", ""),
            TaxonomyEntry::new("g1c", "Bracken", ""),
        ]);
        let labels = LabelTable::from_codes(vec!["g".into(), "g1c".into()]).unwrap();

        match labels.verify(&store) {
            Err(Error::Taxonomy(TaxonomyError::UnknownCode(code))) => assert_eq!(code, "g1"),
            other => panic!("expected missing prefix, got {other:?}"),
        }
    }
}
