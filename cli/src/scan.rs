use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use walkdir::WalkDir;

const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tif", "tiff", "webp"];

/// A document found on disk and the name it is processed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    /// Unique across one run.
    pub name: String,
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// `path` relative to `root`, with `/` separators.
fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Expands directories into the supported documents they contain.
///
/// Explicit file arguments are kept even when their extension is unknown and
/// are named by their file name. Files found in a directory are named by their
/// path below that directory, so `a/order.pdf` and `b/order.pdf` stay apart.
/// Names that still collide fall back to the full path. A file given twice
/// is only processed once.
pub fn collect_documents(inputs: &[PathBuf]) -> Result<Vec<Document>> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    for input in inputs {
        if input.is_file() {
            if seen.insert(input.clone()) {
                found.push(Document {
                    path: input.clone(),
                    name: base_name(input),
                });
            }
            continue;
        }
        if !input.is_dir() {
            anyhow::bail!("Input does not exist: {}", input.display());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(input).follow_links(true) {
            let entry = entry?;
            if entry.file_type().is_file() && is_supported(entry.path()) {
                entries.push(entry.into_path());
            }
        }
        entries.sort();
        for path in entries {
            if seen.insert(path.clone()) {
                found.push(Document {
                    name: relative_name(input, &path),
                    path,
                });
            }
        }
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for doc in &found {
        *counts.entry(doc.name.clone()).or_default() += 1;
    }
    for doc in &mut found {
        if counts.get(&doc.name).copied().unwrap_or(0) > 1 {
            doc.name = doc.path.display().to_string();
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"scan").unwrap();
    }

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("scan.PDF")));
        assert!(is_supported(Path::new("a/b/order.jpeg")));
        assert!(!is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let result = collect_documents(&[PathBuf::from("/definitely/not/here")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_directory_names_are_relative_to_input() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("north/order.pdf"));
        touch(&dir.path().join("south/order.pdf"));
        touch(&dir.path().join("south/notes.txt"));

        let docs = collect_documents(&[dir.path().to_path_buf()]).unwrap();

        let names: Vec<_> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["north/order.pdf", "south/order.pdf"]);
    }

    #[test]
    fn test_colliding_names_fall_back_to_full_path() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a/order.pdf");
        let second = dir.path().join("b/order.pdf");
        touch(&first);
        touch(&second);

        let docs = collect_documents(&[first.clone(), second.clone()]).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name, first.display().to_string());
        assert_eq!(docs[1].name, second.display().to_string());
    }

    #[test]
    fn test_same_file_twice_is_kept_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("order.pdf");
        touch(&file);

        let docs = collect_documents(&[file.clone(), dir.path().to_path_buf()]).unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "order.pdf");
    }
}
