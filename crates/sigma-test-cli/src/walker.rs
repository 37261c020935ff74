//! Discovery of candidate rule files under a root path.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, RunError};

const YAML_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Walks one root path, yielding YAML files in file-name order.
///
/// When not recursive, only the root's direct children are visited.
#[derive(Debug, Clone)]
pub struct PathWalker {
    root: PathBuf,
    recursive: bool,
}

impl PathWalker {
    pub fn new(root: impl Into<PathBuf>, recursive: bool) -> Self {
        PathWalker {
            root: root.into(),
            recursive,
        }
    }
}

impl IntoIterator for PathWalker {
    type Item = Result<PathBuf>;
    type IntoIter = Walk;

    fn into_iter(self) -> Walk {
        if !self.root.exists() {
            return Walk {
                missing: Some(RunError::NotFound(self.root)),
                inner: None,
                recursive: self.recursive,
            };
        }
        Walk {
            missing: None,
            inner: Some(WalkDir::new(&self.root).sort_by_file_name().into_iter()),
            recursive: self.recursive,
        }
    }
}

/// Iterator returned by [`PathWalker::into_iter`].
pub struct Walk {
    missing: Option<RunError>,
    inner: Option<walkdir::IntoIter>,
    recursive: bool,
}

impl Walk {
    /// Stop walking the directory that holds the path yielded last; its
    /// remaining files and subdirectories are skipped.
    pub fn prune(&mut self) {
        if let Some(inner) = self.inner.as_mut() {
            inner.skip_current_dir();
        }
    }
}

impl Iterator for Walk {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.missing.take() {
            return Some(Err(err));
        }
        loop {
            let entry = match self.inner.as_mut()?.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            if entry.file_type().is_dir() {
                if entry.depth() > 0 && !self.recursive {
                    self.prune();
                }
                continue;
            }
            if is_yaml(entry.path()) {
                return Some(Ok(entry.into_path()));
            }
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| YAML_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "title: x\n").unwrap();
    }

    fn names(root: &Path, recursive: bool) -> Vec<String> {
        PathWalker::new(root, recursive)
            .into_iter()
            .map(|p| {
                p.unwrap()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.yml"));
        touch(&dir.path().join("a.yaml"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("Makefile"));
        touch(&dir.path().join("nested/c.yaml"));
        touch(&dir.path().join("nested/deeper/d.yml"));
        dir
    }

    #[test]
    fn test_recursive_walk_is_sorted_and_filtered() {
        let dir = fixture();
        assert_eq!(
            names(dir.path(), true),
            vec!["a.yaml", "b.yml", "nested/c.yaml", "nested/deeper/d.yml"]
        );
    }

    #[test]
    fn test_non_recursive_walk_prunes_subdirectories() {
        let dir = fixture();
        assert_eq!(names(dir.path(), false), vec!["a.yaml", "b.yml"]);
    }

    #[test]
    fn test_caller_can_prune_during_recursive_walk() {
        let dir = fixture();
        let mut walk = PathWalker::new(dir.path(), true).into_iter();
        let mut seen = Vec::new();
        while let Some(path) = walk.next() {
            let path = path.unwrap();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            if name == "c.yaml" {
                walk.prune();
            }
            seen.push(name);
        }
        assert_eq!(seen, vec!["a.yaml", "b.yml", "c.yaml"]);
    }

    #[test]
    fn test_prune_before_first_item_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let mut walk = PathWalker::new(dir.path().join("missing"), true).into_iter();
        walk.prune();
        assert!(matches!(walk.next(), Some(Err(RunError::NotFound(_)))));
    }

    #[test]
    fn test_directory_named_like_yaml_is_not_yielded() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("rules.yaml")).unwrap();
        touch(&dir.path().join("rules.yaml/inner.yml"));
        assert_eq!(names(dir.path(), true), vec!["rules.yaml/inner.yml"]);
    }

    #[test]
    fn test_file_root_yields_itself() {
        let dir = fixture();
        let file = dir.path().join("a.yaml");
        let walked: Vec<PathBuf> = PathWalker::new(&file, false)
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(walked, vec![file]);
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let mut walk = PathWalker::new(&missing, true).into_iter();
        assert!(matches!(walk.next(), Some(Err(RunError::NotFound(p))) if p == missing));
        assert!(walk.next().is_none());
    }
}
