//! Salted-hash credential store backed by a line-oriented text file.
//!
//! Each line is `name:salt:hash` where `name` is one or more word characters,
//! `salt` is a decimal integer and `hash` is the hex SHA-256 digest of
//! `salt ‖ password`. Malformed lines are rejected at load time rather than
//! skipped.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{ChatError, ChatResult};

/// True if `name` is one or more ASCII word characters (`[A-Za-z0-9_]+`)
pub fn is_valid_principal_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Hex SHA-256 of `salt ‖ password`
pub fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_salt() -> String {
    rand::thread_rng().gen_range(0..=i64::MAX as u64).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub name: String,
    pub salt: String,
    pub hash: String,
}

impl CredentialRecord {
    /// Create a record with a fresh salt for `password`
    pub fn new(name: &str, password: &str) -> Self {
        let salt = generate_salt();
        let hash = digest(&salt, password);
        Self {
            name: name.to_string(),
            salt,
            hash,
        }
    }

    pub fn matches(&self, password: &str) -> bool {
        digest(&self.salt, password) == self.hash
    }

    fn parse(line: &str) -> Option<Self> {
        let mut fields = line.splitn(3, ':');
        let name = fields.next()?;
        let salt = fields.next()?;
        let hash = fields.next()?;

        if !is_valid_principal_name(name)
            || salt.is_empty()
            || !salt.bytes().all(|b| b.is_ascii_digit())
            || hash.is_empty()
        {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            salt: salt.to_string(),
            hash: hash.to_string(),
        })
    }

    fn to_line(&self) -> String {
        format!("{}:{}:{}", self.name, self.salt, self.hash)
    }
}

/// Persistent principal → salted hash mapping.
///
/// All file writes go through one mutex, so appends and full rewrites never
/// interleave.
pub struct CredentialStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, CredentialRecord>>,
}

impl CredentialStore {
    /// Load the store at `path`, creating an empty file if none exists
    pub fn open<P: AsRef<Path>>(path: P) -> ChatResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            File::create(path).map_err(|e| storage_io("create", path, e))?;
            info!(path = %path.display(), "created empty credential store");
        }
        Self::load(path)
    }

    /// Parse an existing store. Any malformed non-blank line is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> ChatResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| storage_io("open", path, e))?;

        let mut records = BTreeMap::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| storage_io("read", path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record = CredentialRecord::parse(&line).ok_or_else(|| ChatError::StorageFormat {
                line: index + 1,
                content: line.clone(),
            })?;
            records.insert(record.name.clone(), record);
        }

        info!(path = %path.display(), users = records.len(), "loaded credential store");
        Ok(Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Check `password` against the stored salted hash. Unknown names yield `false`.
    pub fn authenticate(&self, name: &str, password: &str) -> bool {
        self.lock()
            .get(name)
            .map(|record| record.matches(password))
            .unwrap_or(false)
    }

    /// Append a new record to disk, then to memory
    pub fn register(&self, name: &str, password: &str) -> ChatResult<()> {
        if !is_valid_principal_name(name) {
            return Err(ChatError::Protocol(format!("invalid principal name {:?}", name)));
        }

        let record = CredentialRecord::new(name, password);
        let mut records = self.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| storage_io("open", &self.path, e))?;
        writeln!(file, "{}", record.to_line()).map_err(|e| storage_io("append", &self.path, e))?;
        file.flush().map_err(|e| storage_io("flush", &self.path, e))?;

        records.insert(record.name.clone(), record);
        info!(user = name, "registered new user");
        Ok(())
    }

    /// Replace `name`'s record with a freshly salted one and rewrite the whole file
    pub fn change_password(&self, name: &str, new_password: &str) -> ChatResult<()> {
        let mut records = self.lock();
        let mut updated = records.clone();
        updated.insert(name.to_string(), CredentialRecord::new(name, new_password));

        self.rewrite(&updated)?;
        *records = updated;
        info!(user = name, "password changed");
        Ok(())
    }

    /// Delete the backing file and forget every record
    pub fn wipe(&self) -> ChatResult<()> {
        let mut records = self.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "credential store already absent");
            }
            Err(e) => return Err(storage_io("delete", &self.path, e)),
        }
        records.clear();
        warn!(path = %self.path.display(), "credential store wiped");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn record(&self, name: &str) -> Option<CredentialRecord> {
        self.lock().get(name).cloned()
    }

    // Write to a sibling file, then rename over the original
    fn rewrite(&self, records: &BTreeMap<String, CredentialRecord>) -> ChatResult<()> {
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path).map_err(|e| storage_io("create", &tmp_path, e))?;
            for record in records.values() {
                writeln!(tmp, "{}", record.to_line()).map_err(|e| storage_io("write", &tmp_path, e))?;
            }
            tmp.sync_all().map_err(|e| storage_io("sync", &tmp_path, e))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| storage_io("replace", &self.path, e))?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, CredentialRecord>> {
        // A panic while holding the lock leaves the map itself consistent
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn storage_io(action: &str, path: &Path, err: std::io::Error) -> ChatError {
    ChatError::StorageIo(format!("{} {}: {}", action, path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, CredentialStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(tmp.path().join("auth.txt")).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_principal_name_grammar() {
        assert!(is_valid_principal_name("alice"));
        assert!(is_valid_principal_name("Bob_42"));
        assert!(!is_valid_principal_name(""));
        assert!(!is_valid_principal_name("bad name!"));
        assert!(!is_valid_principal_name("colon:name"));
    }

    #[test]
    fn test_register_then_authenticate() {
        let (_tmp, store) = temp_store();
        assert!(!store.is_registered("alice"));

        store.register("alice", "hunter2").unwrap();
        assert!(store.is_registered("alice"));
        assert!(store.authenticate("alice", "hunter2"));
        assert!(!store.authenticate("alice", "hunter3"));
        assert!(!store.authenticate("nobody", "hunter2"));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let (_tmp, store) = temp_store();
        store.register("alice", "same").unwrap();
        store.register("bob", "same").unwrap();

        let alice = store.record("alice").unwrap();
        let bob = store.record("bob").unwrap();
        assert_ne!(alice.salt, bob.salt);
        assert_ne!(alice.hash, bob.hash);
        assert_eq!(alice.hash, digest(&alice.salt, "same"));
    }

    #[test]
    fn test_records_persist_across_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("auth.txt");
        {
            let store = CredentialStore::open(&path).unwrap();
            store.register("alice", "pw1").unwrap();
            store.register("bob", "pw2").unwrap();
        }

        let store = CredentialStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.authenticate("alice", "pw1"));
        assert!(store.authenticate("bob", "pw2"));
    }

    #[test]
    fn test_change_password_rewrites_without_duplicates() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("auth.txt");
        let store = CredentialStore::open(&path).unwrap();
        store.register("alice", "old").unwrap();
        store.register("bob", "pw").unwrap();

        store.change_password("alice", "new").unwrap();
        assert!(store.authenticate("alice", "new"));
        assert!(!store.authenticate("alice", "old"));

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().filter(|l| l.starts_with("alice:")).count(), 1);
        assert_eq!(contents.lines().count(), 2);

        let reloaded = CredentialStore::load(&path).unwrap();
        assert!(reloaded.authenticate("alice", "new"));
        assert!(reloaded.authenticate("bob", "pw"));
    }

    #[test]
    fn test_malformed_line_is_hard_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("auth.txt");
        fs::write(&path, "alice:123:abcdef\n\nbroken line\n").unwrap();

        match CredentialStore::load(&path) {
            Err(ChatError::StorageFormat { line, content }) => {
                assert_eq!(line, 3);
                assert_eq!(content, "broken line");
            }
            other => panic!("expected StorageFormat, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_non_numeric_salt_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("auth.txt");
        fs::write(&path, "alice:salt:abcdef\n").unwrap();
        assert!(matches!(
            CredentialStore::load(&path),
            Err(ChatError::StorageFormat { line: 1, .. })
        ));
    }

    #[test]
    fn test_hash_may_contain_colons() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("auth.txt");
        fs::write(&path, "carol:42:ab:cd\n").unwrap();
        let store = CredentialStore::load(&path).unwrap();
        assert_eq!(store.record("carol").unwrap().hash, "ab:cd");
    }

    #[test]
    fn test_register_rejects_invalid_name() {
        let (_tmp, store) = temp_store();
        assert!(store.register("bad name!", "pw").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_wipe_removes_file() {
        let (_tmp, store) = temp_store();
        store.register("alice", "pw").unwrap();
        store.wipe().unwrap();

        assert!(!store.path().exists());
        assert!(!store.is_registered("alice"));
        // A second wipe is harmless
        store.wipe().unwrap();
    }
}
