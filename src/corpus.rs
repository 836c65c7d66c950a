//! Corpus loading.
//!
//! The documentation corpus is a JSON array of content sections, produced
//! by the docs build and read once at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::errors::AppError;

/// Content section on a documentation page. Each page is split into
/// sections so answers can link directly to anchors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSection {
    #[serde(rename = "objectID")]
    pub object_id: Uuid,
    #[serde(rename = "groupId")]
    pub group_id: String,
    #[serde(rename = "groupLabel")]
    pub group_label: String,
    pub version: String,
    pub title: String,
    pub section: String,
    pub url: String,
    pub link: String,
    pub content: String,
}

/// Reads content sections from a JSON corpus file.
pub struct CorpusLoader {
    path: PathBuf,
}

impl CorpusLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the corpus file.
    ///
    /// A missing file or a malformed top-level document is terminal for this
    /// run; there is no retry. Individual records that fail schema decode
    /// are skipped and logged so one bad entry cannot sink the rest of the
    /// corpus.
    pub fn load(&self) -> Result<Vec<ContentSection>, AppError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|err| {
            AppError::ResourceNotFound(format!("corpus file {}: {}", self.path.display(), err))
        })?;

        let records: Vec<serde_json::Value> =
            serde_json::from_str(&raw).map_err(|err| AppError::Parse(err.to_string()))?;

        let total = records.len();
        let mut sections = Vec::with_capacity(total);
        for (idx, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<ContentSection>(record) {
                Ok(section) => sections.push(section),
                Err(err) => {
                    tracing::warn!("Skipping corpus record {}: {}", idx, err);
                }
            }
        }

        if sections.len() < total {
            tracing::warn!("Skipped {} of {} corpus records", total - sections.len(), total);
        }

        Ok(sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_corpus(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(json.as_bytes()).expect("write corpus");
        file
    }

    const SECTION: &str = r#"{
        "objectID": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
        "groupId": "g1",
        "groupLabel": "Guides",
        "version": "1.0",
        "title": "Getting started",
        "section": "Install",
        "url": "https://docs/start",
        "link": "https://docs/start#install",
        "content": "Use X for Y"
    }"#;

    #[test]
    fn loads_sections_from_json_array() {
        let file = write_corpus(&format!("[{}]", SECTION));
        let sections = CorpusLoader::new(file.path()).load().expect("load");

        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].group_id, "g1");
        assert_eq!(sections[0].link, "https://docs/start#install");
        assert_eq!(sections[0].content, "Use X for Y");
    }

    #[test]
    fn skips_records_that_fail_schema_decode() {
        let file = write_corpus(&format!(r#"[{}, {{"objectID": "not-a-uuid"}}]"#, SECTION));
        let sections = CorpusLoader::new(file.path()).load().expect("load");

        assert_eq!(sections.len(), 1);
    }

    #[test]
    fn missing_file_is_resource_not_found() {
        let err = CorpusLoader::new("/nonexistent/docs_index.json")
            .load()
            .expect_err("should fail");
        assert!(matches!(err, AppError::ResourceNotFound(_)));
    }

    #[test]
    fn malformed_document_is_parse_error() {
        let file = write_corpus("{not json");
        let err = CorpusLoader::new(file.path()).load().expect_err("should fail");
        assert!(matches!(err, AppError::Parse(_)));
    }
}
