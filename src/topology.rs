//! Sync root topology validation
//!
//! Every peer owns exactly one directory. A root nested inside another
//! root would be observed by the outer peer, so such sets are rejected
//! before the engine starts.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve a directory to an absolute, lexically normalized path.
///
/// Relative paths are joined onto the current working directory. `.` is
/// dropped and `..` pops the previous component; symlinks are not followed.
pub fn resolve_root(dir: &Path) -> Result<PathBuf> {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };

    Ok(normalize(&absolute))
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Resolve all roots and check that none contains another.
///
/// Returns the resolved roots in input order. Containment is decided per
/// path component, so `/a/b` and `/a/bc` are independent roots.
pub fn validate_topology<P: AsRef<Path>>(dirs: &[P]) -> Result<Vec<PathBuf>> {
    if dirs.is_empty() {
        return Err(Error::NoDirectories);
    }

    let roots = dirs
        .iter()
        .map(|d| resolve_root(d.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    for (i, root) in roots.iter().enumerate() {
        for (j, other) in roots.iter().enumerate() {
            if i == j {
                continue;
            }
            if root == other {
                return Err(Error::DuplicateRoot(root.clone()));
            }
            if other.starts_with(root) {
                return Err(Error::Topology {
                    root: root.clone(),
                    other: other.clone(),
                });
            }
        }
    }

    tracing::debug!(roots = roots.len(), "Sync topology validated");
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_nested_roots() {
        let err = validate_topology(&["/data", "/data/sub"]).unwrap_err();
        match err {
            Error::Topology { root, other } => {
                assert_eq!(root, PathBuf::from("/data"));
                assert_eq!(other, PathBuf::from("/data/sub"));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Order of the inputs does not matter
        assert!(validate_topology(&["/data/sub/deeper", "/data"]).unwrap_err().is_configuration());
    }

    #[test]
    fn test_partial_segment_is_not_nesting() {
        let roots = validate_topology(&["/a/b", "/a/bc"]).unwrap();
        assert_eq!(roots, vec![PathBuf::from("/a/b"), PathBuf::from("/a/bc")]);
    }

    #[test]
    fn test_normalizes_before_comparing() {
        assert!(validate_topology(&["/data/x/..", "/data/sub"]).is_err());
        assert!(matches!(
            validate_topology(&["/data/./a", "/data/a/"]),
            Err(Error::DuplicateRoot(_))
        ));
    }

    #[test]
    fn test_relative_roots_are_resolved() {
        let roots = validate_topology(&["left", "right"]).unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(roots[0], cwd.join("left"));
        assert_eq!(roots[1], cwd.join("right"));
        assert!(roots.iter().all(|r| r.is_absolute()));
    }

    #[test]
    fn test_empty_set_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(validate_topology(&empty), Err(Error::NoDirectories)));
    }

    #[test]
    fn test_single_root_accepted() {
        assert_eq!(validate_topology(&["/only"]).unwrap().len(), 1);
    }
}
