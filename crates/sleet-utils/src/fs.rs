use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{FileSystemError, FileSystemResult};

/// Collects every file below `root` whose name ends with `suffix`, ignoring case.
///
/// A `root` that is itself a file is returned alone when it matches. The result is sorted.
pub fn collect_files<P: AsRef<Path>>(root: P, suffix: &str) -> FileSystemResult<Vec<PathBuf>> {
    let root = root.as_ref();
    let suffix = suffix.to_ascii_lowercase();
    let matches = |path: &Path| {
        path.file_name()
            .is_some_and(|name| name.to_string_lossy().to_ascii_lowercase().ends_with(&suffix))
    };

    if root.is_file() {
        return Ok(matches(root).then(|| root.to_path_buf()).into_iter().collect());
    }

    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let read_err = |source| FileSystemError {
            path: dir.clone(),
            source,
        };
        for entry in fs::read_dir(&dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if path.is_dir() {
                pending.push(path);
            } else if matches(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_collect_files_recursive_and_case_insensitive() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("a.1.0.0.nupkg"), "").unwrap();
        fs::write(nested.join("B.2.0.0.NUPKG"), "").unwrap();
        fs::write(nested.join("readme.txt"), "").unwrap();

        let files = collect_files(dir.path(), ".nupkg").unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| !f.ends_with("readme.txt")));
    }

    #[test]
    fn test_collect_files_single_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.1.0.0.nupkg");
        fs::write(&file, "").unwrap();

        assert_eq!(collect_files(&file, ".nupkg").unwrap(), vec![file.clone()]);
        assert!(collect_files(&file, ".json").unwrap().is_empty());
    }

    #[test]
    fn test_collect_files_missing_root() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = collect_files(&missing, ".nupkg").unwrap_err();
        assert_eq!(err.path, missing);
    }
}
