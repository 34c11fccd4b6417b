//! Message persistence.
//!
//! The protocol core hands every accepted message over as one
//! `(sender, recipient, body, id)` call per recipient; failures are reported
//! synchronously so the commit can abort the transaction. The filesystem
//! store keeps one file per delivery under a per-recipient directory.

use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// Destination for accepted messages.
pub trait MailStore {
    /// Persist one message copy for one recipient.
    ///
    /// `id` distinguishes messages from the same sender; it is drawn from a
    /// small range, so colliding deliveries overwrite. Callers invoke this
    /// once per (message, recipient) pair.
    fn store(&mut self, sender: &str, recipient: &str, body: &[u8], id: u32) -> io::Result<()>;
}

/// Filesystem store: `<root>/<recipient>/<sender>_<id>`.
pub struct FsMailStore {
    root: PathBuf,
}

impl FsMailStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl MailStore for FsMailStore {
    fn store(&mut self, sender: &str, recipient: &str, body: &[u8], id: u32) -> io::Result<()> {
        let dir = self.root.join(recipient);
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{sender}_{id}"));
        fs::write(&path, body)?;

        debug!(path = %path.display(), bytes = body.len(), "Stored message");
        Ok(())
    }
}

/// In-memory store for tests: records deliveries, optionally failing from
/// the nth call onward.
#[cfg(test)]
pub struct MemoryStore {
    pub delivered: Vec<(String, String, Vec<u8>, u32)>,
    pub fail_from: Option<usize>,
    calls: usize,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self {
            delivered: Vec::new(),
            fail_from: None,
            calls: 0,
        }
    }

    pub fn failing_from(call: usize) -> Self {
        Self {
            fail_from: Some(call),
            ..Self::new()
        }
    }
}

#[cfg(test)]
impl MailStore for MemoryStore {
    fn store(&mut self, sender: &str, recipient: &str, body: &[u8], id: u32) -> io::Result<()> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_from.is_some_and(|n| call >= n) {
            return Err(io::Error::new(io::ErrorKind::Other, "store failed"));
        }
        self.delivered
            .push((sender.to_string(), recipient.to_string(), body.to_vec(), id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_store_writes_one_file_per_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsMailStore::new(dir.path().to_path_buf());

        store.store("a@x", "b@y", b"hello", 42).unwrap();

        let path = dir.path().join("b@y").join("a@x_42");
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_fs_store_same_id_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsMailStore::new(dir.path().to_path_buf());

        store.store("a@x", "b@y", b"first", 7).unwrap();
        store.store("a@x", "b@y", b"second", 7).unwrap();

        let path = dir.path().join("b@y").join("a@x_7");
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn test_fs_store_multiple_recipients_get_copies() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsMailStore::new(dir.path().to_path_buf());

        store.store("a@x", "b@y", b"body", 1).unwrap();
        store.store("a@x", "c@z", b"body", 1).unwrap();

        assert!(dir.path().join("b@y").join("a@x_1").exists());
        assert!(dir.path().join("c@z").join("a@x_1").exists());
    }

    #[test]
    fn test_memory_store_failure_injection() {
        let mut store = MemoryStore::failing_from(1);
        assert!(store.store("a@x", "b@y", b"ok", 1).is_ok());
        assert!(store.store("a@x", "c@z", b"ok", 1).is_err());
        assert_eq!(store.delivered.len(), 1);
    }
}
