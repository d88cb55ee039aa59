use crate::error::{GedcomError, Result};
use crate::gedcom::level_tree::LevelTree;
use crate::gedcom::records::ExtractedRecords;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reads a GEDCOM file and caches its text and level tree
#[derive(Debug, Clone)]
pub struct GedcomParser {
    source_path: PathBuf,
    text_cache: Option<String>,
    tree_cache: Option<LevelTree>,
}

impl GedcomParser {
    pub fn new<P: AsRef<Path>>(source_path: P) -> Self {
        Self {
            source_path: source_path.as_ref().to_path_buf(),
            text_cache: None,
            tree_cache: None,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Load and cache the raw source text. Invalid UTF-8 sequences are
    /// replaced rather than rejected.
    pub fn load_text(&mut self) -> Result<&str> {
        let text = match self.text_cache.take() {
            Some(text) => text,
            None => {
                debug!("Loading GEDCOM source from: {:?}", self.source_path);

                let bytes = fs::read(&self.source_path).map_err(|source| {
                    GedcomError::SourceUnreadable {
                        path: self.source_path.clone(),
                        source,
                    }
                })?;

                info!("Loaded {} bytes from {:?}", bytes.len(), self.source_path);
                String::from_utf8_lossy(&bytes).into_owned()
            }
        };

        Ok(self.text_cache.insert(text).as_str())
    }

    /// Load and cache the level tree
    pub fn load_tree(&mut self) -> Result<&LevelTree> {
        let tree = match self.tree_cache.take() {
            Some(tree) => tree,
            None => LevelTree::parse(self.load_text()?),
        };

        Ok(&*self.tree_cache.insert(tree))
    }

    /// Classify the cached tree into typed records. The text is always
    /// decoded as UTF-8; a header declaring another charset is reported.
    pub fn extract_records(&mut self) -> Result<ExtractedRecords> {
        let tree = self.load_tree()?.clone();
        let records = ExtractedRecords::classify(tree);

        if let Some(header) = records.header.as_ref().filter(|header| !header.declares_utf8()) {
            warn!(
                "{:?} declares charset {:?}; decoding as UTF-8, so non-ASCII text may be garbled",
                self.source_path,
                header.charset.as_deref().unwrap_or_default()
            );
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_load_tree_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "0 HEAD\n1 CHAR UTF-8\n0 @I1@ INDI\n1 NAME Test /Person/\n").unwrap();

        let mut parser = GedcomParser::new(file.path());
        let tree = parser.load_tree().unwrap();
        assert_eq!(tree.records().len(), 2);

        let records = parser.extract_records().unwrap();
        assert_eq!(records.individuals[0].name.as_deref(), Some("Test /Person/"));
        assert_eq!(
            records.header.and_then(|header| header.charset).as_deref(),
            Some("UTF-8")
        );
    }

    #[test]
    fn test_missing_file_is_source_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let mut parser = GedcomParser::new(temp_dir.path().join("missing.ged"));

        match parser.load_tree() {
            Err(GedcomError::SourceUnreadable { path, .. }) => {
                assert!(path.ends_with("missing.ged"));
            }
            other => panic!("expected SourceUnreadable, got {:?}", other),
        }
    }

    #[test]
    fn test_non_utf8_charset_still_loads() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0 HEAD\n1 CHAR ANSEL\n0 @I1@ INDI\n1 NAME M\xe2uller\n").unwrap();

        let mut parser = GedcomParser::new(file.path());
        let records = parser.extract_records().unwrap();
        let header = records.header.unwrap();

        assert!(!header.declares_utf8());
        assert_eq!(records.individuals.len(), 1);
        assert_eq!(records.individuals[0].name.as_deref(), Some("M\u{fffd}uller"));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"0 @I1@ INDI\n1 NAME Jos\xe9\n").unwrap();

        let mut parser = GedcomParser::new(file.path());
        let records = parser.extract_records().unwrap();
        assert_eq!(records.individuals[0].name.as_deref(), Some("Jos\u{fffd}"));
    }
}
