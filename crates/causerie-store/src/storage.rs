//! Contact list persistence.
//!
//! The whole list is stored as one JSON array under a fixed storage key in
//! the platform data directory; there is no schema versioning.  Every write
//! replaces the full list atomically (temp file + rename), never partially.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::info;

use causerie_shared::constants::CONTACTS_STORAGE_KEY;

use crate::error::{Result, StoreError};
use crate::models::Contact;

pub struct ContactStorage {
    path: PathBuf,
}

impl ContactStorage {
    /// Storage at the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/causerie/contacts.json`
    /// - macOS:   `~/Library/Application Support/org.causerie.causerie/contacts.json`
    /// - Windows: `{FOLDERID_RoamingAppData}\causerie\causerie\data\contacts.json`
    pub fn new() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("org", "causerie", "causerie").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Ok(Self::open_at(&data_dir.join(CONTACTS_STORAGE_KEY)))
    }

    /// Storage at an explicit path.  Useful for tests and for embedding
    /// inside custom directory layouts.
    pub fn open_at(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted list.  A missing file is an empty list.
    pub fn load(&self) -> Result<Vec<Contact>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read(&self.path)?;
        let contacts: Vec<Contact> = serde_json::from_slice(&data)?;
        info!(count = contacts.len(), "contacts loaded");
        Ok(contacts)
    }

    /// Replace the persisted list with `contacts`, atomically.
    pub fn save(&self, contacts: &[Contact]) -> Result<()> {
        let data = serde_json::to_vec_pretty(contacts)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &data)?;
        std::fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn contact(name: &str) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            display_name: name.to_string(),
            address: format!("http://{name}.local:8765/gun"),
            last_used: None,
            favorite: false,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ContactStorage::open_at(&dir.path().join("contacts.json"));
        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ContactStorage::open_at(&dir.path().join("contacts.json"));

        let contacts = vec![contact("alice"), contact("bob")];
        storage.save(&contacts).unwrap();

        assert_eq!(storage.load().unwrap(), contacts);
    }

    #[test]
    fn test_save_replaces_whole_list() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ContactStorage::open_at(&dir.path().join("contacts.json"));

        storage.save(&[contact("alice"), contact("bob")]).unwrap();
        storage.save(&[contact("carol")]).unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].display_name, "carol");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.json");
        std::fs::write(&path, b"not json").unwrap();

        let storage = ContactStorage::open_at(&path);
        assert!(storage.load().is_err());
    }
}
