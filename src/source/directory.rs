use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{FetchError, HostSource};
use crate::error::{Result, ShowdownError};
use crate::record::{HostIdentifier, HostRecord};

/// Offline source: previously downloaded records stored as `<ip>.json`.
#[derive(Debug, Clone)]
pub struct RecordDirectory {
    root: PathBuf,
}

impl RecordDirectory {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ShowdownError::Source(format!(
                "record directory not found: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Identifiers of every record file in the directory, for runs that
    /// have no explicit target list.
    pub fn identifiers(&self) -> BTreeSet<HostIdentifier> {
        WalkDir::new(&self.root)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    return None;
                }
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(HostIdentifier::from)
            })
            .collect()
    }

    fn path_for(&self, id: &HostIdentifier) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

impl HostSource for RecordDirectory {
    fn fetch(&self, id: &HostIdentifier) -> std::result::Result<HostRecord, FetchError> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(FetchError::NotFound(id.clone()));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(HostRecord::from_json(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_records_by_identifier() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.2.3.4.json"), r#"{"ip_str": "1.2.3.4"}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = RecordDirectory::open(dir.path()).unwrap();
        let ids: Vec<_> = source.identifiers().into_iter().collect();
        assert_eq!(ids, vec![HostIdentifier::from("1.2.3.4")]);

        let record = source.fetch(&"1.2.3.4".into()).unwrap();
        assert_eq!(record.identifier().as_str(), "1.2.3.4");
    }

    #[test]
    fn missing_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = RecordDirectory::open(dir.path()).unwrap();
        assert!(matches!(
            source.fetch(&"9.9.9.9".into()),
            Err(FetchError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_record_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("5.5.5.5.json"), "{not json").unwrap();
        let source = RecordDirectory::open(dir.path()).unwrap();
        assert!(matches!(
            source.fetch(&"5.5.5.5".into()),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn open_rejects_missing_directory() {
        assert!(RecordDirectory::open("/definitely/not/here").is_err());
    }
}
