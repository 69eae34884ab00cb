//! Content fingerprints and directory snapshots
//!
//! Both structures are owned by a single detector and never shared.

use std::collections::{BTreeSet, HashMap};
use std::ffi::{OsStr, OsString};
use std::fmt;

use sha2::{Digest, Sha256};

/// Hex SHA-256 digest of a file's contents
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint raw file contents
    pub fn of(contents: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(contents);
        Fingerprint(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell versions apart in logs
        write!(f, "{}", &self.0[..12])
    }
}

/// Last-seen fingerprint per relative filename
#[derive(Debug, Default)]
pub struct FingerprintTable {
    entries: HashMap<OsString, Fingerprint>,
}

impl FingerprintTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the fingerprint for `filename`.
    ///
    /// Returns true if the file is new or its contents changed.
    pub fn observe(&mut self, filename: &OsStr, fingerprint: Fingerprint) -> bool {
        match self.entries.get_mut(filename) {
            Some(existing) if *existing == fingerprint => false,
            Some(existing) => {
                *existing = fingerprint;
                true
            }
            None => {
                self.entries.insert(filename.to_os_string(), fingerprint);
                true
            }
        }
    }

    /// Forget a file that no longer exists
    pub fn remove(&mut self, filename: &OsStr) -> Option<Fingerprint> {
        self.entries.remove(filename)
    }

    pub fn get(&self, filename: &OsStr) -> Option<&Fingerprint> {
        self.entries.get(filename)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Filenames seen in a directory at one poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    files: BTreeSet<OsString>,
}

impl DirectorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: OsString) {
        self.files.insert(filename);
    }

    pub fn contains(&self, filename: &OsStr) -> bool {
        self.files.contains(filename)
    }

    /// Names present in `self` but absent from `current`
    pub fn missing_from<'a>(&'a self, current: &'a DirectorySnapshot) -> impl Iterator<Item = &'a OsStr> + 'a {
        self.files
            .difference(&current.files)
            .map(OsString::as_os_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OsStr> {
        self.files.iter().map(OsString::as_os_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<OsString> for DirectorySnapshot {
    fn from_iter<I: IntoIterator<Item = OsString>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_sha256() {
        let fp = Fingerprint::of(b"hello");
        assert_eq!(
            fp.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(fp, Fingerprint::of(b"hello"));
        assert_ne!(fp, Fingerprint::of(b"hello!"));
        assert_eq!(fp.to_string(), "2cf24dba5fb0");
    }

    #[test]
    fn test_table_detects_changes_only() {
        let mut table = FingerprintTable::new();
        let name = OsStr::new("notes.txt");

        assert!(table.observe(name, Fingerprint::of(b"v1")));
        assert!(!table.observe(name, Fingerprint::of(b"v1")));
        assert!(table.observe(name, Fingerprint::of(b"v2")));
        assert_eq!(table.get(name), Some(&Fingerprint::of(b"v2")));

        assert!(table.remove(name).is_some());
        assert!(table.is_empty());
        // Reappearing after removal counts as a change
        assert!(table.observe(name, Fingerprint::of(b"v2")));
    }

    #[test]
    fn test_snapshot_difference() {
        let previous: DirectorySnapshot = ["a", "b", "c"].into_iter().map(OsString::from).collect();
        let current: DirectorySnapshot = ["b", "d"].into_iter().map(OsString::from).collect();

        let missing: Vec<_> = previous.missing_from(&current).collect();
        assert_eq!(missing, vec![OsStr::new("a"), OsStr::new("c")]);
        assert!(current.missing_from(&current).next().is_none());
        assert!(current.contains(OsStr::new("d")));
    }
}
