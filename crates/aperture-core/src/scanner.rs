//! Scanner (C3): enumerates source files under the originals root and
//! classifies each by camera category/subcategory and RAW-vs-encoded kind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ScannerError;
use crate::types::SourceKind;

const SUPPORTED_EXTENSIONS: &[&str] = &["dng", "raw", "jpg", "jpeg", "png"];
const RAW_EXTENSIONS: &[&str] = &["dng", "raw"];

/// One enumerated source file (§4.3).
#[derive(Debug, Clone)]
pub struct ScannedItem {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub category: String,
    pub subcategory: String,
    pub kind: SourceKind,
}

/// Enumerate `root`'s files, sorted lexicographically by relative path.
///
/// Fails with `ScannerError::DuplicateRelativePath` if two absolute paths
/// (e.g. differing only in case, on case-insensitive filesystems) would
/// resolve to the same relative path.
pub fn scan(root: &Path) -> Result<Vec<ScannedItem>, ScannerError> {
    let mut items = Vec::new();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = entry.map_err(|e| ScannerError::Io {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if !path.is_file() || !is_supported(path) {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let lookup_key = relative.to_lowercase();

        if let Some(first) = seen.get(&lookup_key) {
            return Err(ScannerError::DuplicateRelativePath {
                path: relative,
                first: first.clone(),
                second: path.to_path_buf(),
            });
        }
        seen.insert(lookup_key, path.to_path_buf());

        let segments: Vec<&str> = relative.split('/').collect();
        // A bare filename has one segment (no directory component); anything
        // with at least two segments has a real category directory.
        let category = if segments.len() >= 2 {
            segments[0].to_string()
        } else {
            "Uncategorized".to_string()
        };
        let subcategory = if segments.len() >= 3 {
            segments[1].to_string()
        } else {
            "General".to_string()
        };

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let kind = if RAW_EXTENSIONS.contains(&ext.as_str()) {
            SourceKind::Raw
        } else {
            SourceKind::Encoded
        };

        items.push(ScannedItem {
            relative_path: relative,
            absolute_path: path.to_path_buf(),
            category,
            subcategory,
            kind,
        });
    }

    items.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(items)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_scan_classifies_category_and_subcategory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("Test").join("Mini");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("a.jpg"), b"stub").unwrap();

        let items = scan(dir.path()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category, "Test");
        assert_eq!(items[0].subcategory, "Mini");
        assert_eq!(items[0].kind, SourceKind::Encoded);
    }

    #[test]
    fn test_scan_marks_raw_extensions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("shot.dng"), b"stub").unwrap();
        let items = scan(dir.path()).unwrap();
        assert_eq!(items[0].kind, SourceKind::Raw);
    }

    #[test]
    fn test_scan_ignores_unsupported_extensions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"stub").unwrap();
        let items = scan(dir.path()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_scan_defaults_for_root_level_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"stub").unwrap();
        let items = scan(dir.path()).unwrap();
        assert_eq!(items[0].category, "Uncategorized");
        assert_eq!(items[0].subcategory, "General");
    }

    #[test]
    fn test_scan_is_sorted_lexicographically() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.jpg"), b"stub").unwrap();
        fs::write(dir.path().join("a.jpg"), b"stub").unwrap();
        let items = scan(dir.path()).unwrap();
        assert_eq!(items[0].relative_path, "a.jpg");
        assert_eq!(items[1].relative_path, "b.jpg");
    }
}
