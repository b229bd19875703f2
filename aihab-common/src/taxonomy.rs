//! UKHab taxonomy store
//!
//! Immutable mapping from every valid habitat code to its display name and
//! definition. Loaded once at startup from a JSON document shaped as:
//!
//! ```json
//! {
//!   "g":   { "name": "Grassland", "definition": "..." },
//!   "g1":  { "name": "Acid grassland", "definition": "..." },
//!   "sea": { "name": "Sea", "definition": "", "root_level": true }
//! }
//! ```
//!
//! Codes are prefix-structured: `g1c` sits under `g1`, which sits under `g`.
//! Root-level codes (`sea`, `montane`) break that rule and are terminal at
//! level 1. They are flagged on the entry itself, either in the document or
//! through the configured irregular code list passed to [`TaxonomyStore::load`].

use crate::error::TaxonomyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One node in the classification tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonomyEntry {
    /// Habitat code, e.g. "g1c"
    pub code: String,
    /// Human-readable label, e.g. "Bracken"
    pub name: String,
    /// Free-text description (may be empty)
    pub definition: String,
    /// Terminal at level 1, not derived from a parent prefix
    pub root_level: bool,
}

impl TaxonomyEntry {
    pub fn new(code: impl Into<String>, name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            definition: definition.into(),
            root_level: false,
        }
    }

    /// Create a root-level (irregular) entry
    pub fn root_level(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            definition: String::new(),
            root_level: true,
        }
    }
}

/// Entry shape in the JSON document (the code is the map key)
#[derive(Debug, Deserialize)]
struct RawEntry {
    name: String,
    #[serde(default)]
    definition: String,
    #[serde(default)]
    root_level: bool,
}

/// Read-only taxonomy, shared across requests without synchronization
#[derive(Debug, Clone, Default)]
pub struct TaxonomyStore {
    entries: BTreeMap<String, TaxonomyEntry>,
}

impl TaxonomyStore {
    /// Load the taxonomy document from disk
    ///
    /// Codes listed in `irregular_codes` are marked root-level in addition to
    /// any `root_level` flags in the document.
    ///
    /// # Errors
    /// - `SourceMissing` if the file does not exist
    /// - `SourceUnreadable` for any other I/O failure
    /// - `SourceMalformed` if the JSON does not parse or a code is invalid
    pub fn load(path: &Path, irregular_codes: &[String]) -> Result<Self, TaxonomyError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TaxonomyError::SourceMissing(path.to_path_buf())
            } else {
                TaxonomyError::SourceUnreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        })?;

        let store = Self::parse(&content, path, irregular_codes)?;
        info!(
            "Loaded {} taxonomy entries from {}",
            store.len(),
            path.display()
        );
        Ok(store)
    }

    /// Parse a taxonomy document held in memory
    pub fn from_json_str(json: &str, irregular_codes: &[String]) -> Result<Self, TaxonomyError> {
        Self::parse(json, Path::new("<inline>"), irregular_codes)
    }

    fn parse(json: &str, path: &Path, irregular_codes: &[String]) -> Result<Self, TaxonomyError> {
        let malformed = |reason: String| TaxonomyError::SourceMalformed {
            path: PathBuf::from(path),
            reason,
        };

        let raw: BTreeMap<String, RawEntry> =
            serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;

        if raw.is_empty() {
            return Err(malformed("document contains no habitat codes".to_string()));
        }

        let mut entries = BTreeMap::new();
        for (code, entry) in raw {
            if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(malformed(format!("invalid habitat code '{}'", code)));
            }
            let root_level = entry.root_level || irregular_codes.iter().any(|c| c == &code);
            entries.insert(
                code.clone(),
                TaxonomyEntry {
                    code,
                    name: entry.name,
                    definition: entry.definition,
                    root_level,
                },
            );
        }

        for code in irregular_codes {
            if !entries.contains_key(code) {
                debug!("Irregular code '{}' not present in taxonomy document", code);
            }
        }

        Ok(Self { entries })
    }

    /// Build a store directly from entries (no integrity checks)
    pub fn from_entries(entries: impl IntoIterator<Item = TaxonomyEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.code.clone(), entry))
                .collect(),
        }
    }

    /// Look up a code, failing with `UnknownCode` when absent
    pub fn lookup(&self, code: &str) -> Result<&TaxonomyEntry, TaxonomyError> {
        self.entries
            .get(code)
            .ok_or_else(|| TaxonomyError::UnknownCode(code.to_string()))
    }

    pub fn get(&self, code: &str) -> Option<&TaxonomyEntry> {
        self.entries.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All codes in lexical order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Find prefix gaps in the tree
    ///
    /// Returns one `UnknownCode` error per missing prefix, naming the prefix.
    /// Root-level entries are exempt. An empty result means every regular
    /// code can be resolved to a full chain.
    pub fn check_integrity(&self) -> Vec<TaxonomyError> {
        let mut missing: Vec<String> = Vec::new();

        for entry in self.entries.values().filter(|e| !e.root_level) {
            for (idx, _) in entry.code.char_indices().skip(1) {
                let prefix = &entry.code[..idx];
                if !self.entries.contains_key(prefix) && !missing.iter().any(|m| m == prefix) {
                    missing.push(prefix.to_string());
                }
            }
        }

        missing.into_iter().map(TaxonomyError::UnknownCode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "g":       { "name": "Grassland", "definition": "Vegetation dominated by grasses." },
        "g1":      { "name": "Acid grassland", "definition": "Grassland on acidic soils." },
        "g1c":     { "name": "Bracken", "definition": "Stands dominated by bracken." },
        "sea":     { "name": "Sea" },
        "montane": { "name": "Montane", "definition": "", "root_level": true }
    }"#;

    fn irregular() -> Vec<String> {
        vec!["sea".to_string()]
    }

    #[test]
    fn test_parse_sample_document() {
        let store = TaxonomyStore::from_json_str(SAMPLE, &irregular()).unwrap();

        assert_eq!(store.len(), 5);
        assert_eq!(store.lookup("g1c").unwrap().name, "Bracken");
        assert!(store.contains("g"));
        assert!(!store.is_empty());
    }

    #[test]
    fn test_root_level_from_config_and_document() {
        let store = TaxonomyStore::from_json_str(SAMPLE, &irregular()).unwrap();

        // "sea" flagged by the configured list, "montane" by the document
        assert!(store.lookup("sea").unwrap().root_level);
        assert!(store.lookup("montane").unwrap().root_level);
        assert!(!store.lookup("g1").unwrap().root_level);
    }

    #[test]
    fn test_lookup_unknown_code() {
        let store = TaxonomyStore::from_json_str(SAMPLE, &irregular()).unwrap();

        let err = store.lookup("w1").unwrap_err();
        assert_eq!(err, TaxonomyError::UnknownCode("w1".to_string()));
        assert!(!err.is_load_error());
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = TaxonomyStore::from_json_str("{ not json", &[]).unwrap_err();
        assert!(matches!(err, TaxonomyError::SourceMalformed { .. }));
        assert!(err.is_load_error());
    }

    #[test]
    fn test_missing_name_rejected() {
        let err = TaxonomyStore::from_json_str(r#"{"g": {"definition": "x"}}"#, &[]).unwrap_err();
        assert!(matches!(err, TaxonomyError::SourceMalformed { .. }));
    }

    #[test]
    fn test_invalid_code_rejected() {
        let err = TaxonomyStore::from_json_str(r#"{"g 1": {"name": "x"}}"#, &[]).unwrap_err();
        match err {
            TaxonomyError::SourceMalformed { reason, .. } => assert!(reason.contains("g 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_document_rejected() {
        let err = TaxonomyStore::from_json_str("{}", &[]).unwrap_err();
        assert!(matches!(err, TaxonomyError::SourceMalformed { .. }));
    }

    #[test]
    fn test_integrity_clean_store() {
        let store = TaxonomyStore::from_json_str(SAMPLE, &irregular()).unwrap();
        assert!(store.check_integrity().is_empty());
    }

    #[test]
    fn test_integrity_reports_each_gap_once() {
        let store = TaxonomyStore::from_entries(vec![
            TaxonomyEntry::new("g", "Grassland", ""),
            TaxonomyEntry::new("g1a", "Orphan a", ""),
            TaxonomyEntry::new("g1b", "Orphan b", ""),
        ]);

        let gaps = store.check_integrity();
        assert_eq!(gaps, vec![TaxonomyError::UnknownCode("g1".to_string())]);
    }

    #[test]
    fn test_codes_are_sorted() {
        let store = TaxonomyStore::from_json_str(SAMPLE, &irregular()).unwrap();
        let codes: Vec<&str> = store.codes().collect();
        assert_eq!(codes, vec!["g", "g1", "g1c", "montane", "sea"]);
    }
}
