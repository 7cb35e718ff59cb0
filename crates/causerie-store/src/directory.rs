//! The contact directory: an in-memory list with immediate full-list
//! persistence after every mutation.
//!
//! Persistence failures are logged and otherwise ignored — the in-memory
//! list stays authoritative for the session (a broken disk must not take the
//! address book down with it).

use tracing::warn;
use uuid::Uuid;

use causerie_shared::now_ms;

use crate::models::Contact;
use crate::storage::ContactStorage;

/// Field-wise update for [`ContactDirectory::update`]; `None` leaves the
/// field untouched.
#[derive(Debug, Clone, Default)]
pub struct ContactPatch {
    pub display_name: Option<String>,
    pub address: Option<String>,
    pub favorite: Option<bool>,
}

pub struct ContactDirectory {
    contacts: Vec<Contact>,
    storage: ContactStorage,
}

impl ContactDirectory {
    /// Open the directory, loading whatever is persisted.  An unreadable
    /// file degrades to an empty list.
    pub fn open(storage: ContactStorage) -> Self {
        let contacts = match storage.load() {
            Ok(contacts) => contacts,
            Err(e) => {
                warn!(error = %e, "failed to load contacts, starting empty");
                Vec::new()
            }
        };
        Self { contacts, storage }
    }

    fn persist(&self) {
        if let Err(e) = self.storage.save(&self.contacts) {
            warn!(error = %e, "failed to persist contacts");
        }
    }

    /// Add a new contact and persist.  The new contact starts as
    /// just-used so it sorts to the top of its group.
    pub fn add(&mut self, name: &str, address: &str, favorite: bool) -> Contact {
        let contact = Contact {
            id: Uuid::new_v4(),
            display_name: name.trim().to_string(),
            address: address.trim().to_string(),
            last_used: Some(now_ms()),
            favorite,
        };
        self.contacts.push(contact.clone());
        self.persist();
        contact
    }

    /// Apply a patch to an existing contact.  Returns `false` when the id is
    /// unknown.
    pub fn update(&mut self, id: Uuid, patch: ContactPatch) -> bool {
        let Some(contact) = self.contacts.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        if let Some(display_name) = patch.display_name {
            contact.display_name = display_name;
        }
        if let Some(address) = patch.address {
            contact.address = address;
        }
        if let Some(favorite) = patch.favorite {
            contact.favorite = favorite;
        }
        self.persist();
        true
    }

    /// Remove a contact.  Returns `false` when the id is unknown.
    pub fn delete(&mut self, id: Uuid) -> bool {
        let before = self.contacts.len();
        self.contacts.retain(|c| c.id != id);
        if self.contacts.len() == before {
            return false;
        }
        self.persist();
        true
    }

    /// Stamp a contact as just used.
    pub fn mark_used(&mut self, id: Uuid) {
        if let Some(contact) = self.contacts.iter_mut().find(|c| c.id == id) {
            contact.last_used = Some(now_ms());
            self.persist();
        }
    }

    /// Flip the favorite flag; returns the new value, or `None` for an
    /// unknown id.
    pub fn toggle_favorite(&mut self, id: Uuid) -> Option<bool> {
        let contact = self.contacts.iter_mut().find(|c| c.id == id)?;
        contact.favorite = !contact.favorite;
        let favorite = contact.favorite;
        self.persist();
        Some(favorite)
    }

    pub fn find_by_address(&self, address: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.address == address)
    }

    /// All contacts, favorites first, then most recently used first;
    /// never-used contacts sort last.
    pub fn sorted(&self) -> Vec<Contact> {
        let mut sorted = self.contacts.clone();
        sorted.sort_by(|a, b| {
            b.favorite
                .cmp(&a.favorite)
                .then_with(|| b.last_used.unwrap_or(0).cmp(&a.last_used.unwrap_or(0)))
        });
        sorted
    }

    /// Favorites only.
    pub fn favorites(&self) -> Vec<Contact> {
        self.contacts.iter().filter(|c| c.favorite).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_dir(dir: &tempfile::TempDir) -> ContactDirectory {
        ContactDirectory::open(ContactStorage::open_at(&dir.path().join("contacts.json")))
    }

    #[test]
    fn test_add_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut contacts = open_dir(&dir);
        contacts.add("alice", "http://a.local/gun", false);

        let reopened = open_dir(&dir);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.sorted()[0].display_name, "alice");
    }

    #[test]
    fn test_update_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut contacts = open_dir(&dir);
        let added = contacts.add("alice", "http://a.local/gun", false);

        assert!(contacts.update(
            added.id,
            ContactPatch {
                display_name: Some("Alice".into()),
                ..Default::default()
            }
        ));
        assert_eq!(contacts.sorted()[0].display_name, "Alice");

        assert!(contacts.delete(added.id));
        assert!(contacts.is_empty());
        assert!(!contacts.delete(added.id));
    }

    #[test]
    fn test_sort_favorites_then_recency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.json");
        let storage = ContactStorage::open_at(&path);

        let make = |name: &str, last_used: Option<i64>, favorite: bool| Contact {
            id: Uuid::new_v4(),
            display_name: name.to_string(),
            address: format!("http://{name}/gun"),
            last_used,
            favorite,
        };
        storage
            .save(&[
                make("never", None, false),
                make("recent", Some(200), false),
                make("fav-old", Some(100), true),
                make("stale", Some(100), false),
            ])
            .unwrap();

        let contacts = ContactDirectory::open(ContactStorage::open_at(&path));
        let order: Vec<String> = contacts.sorted().into_iter().map(|c| c.display_name).collect();
        assert_eq!(order, vec!["fav-old", "recent", "stale", "never"]);
    }

    #[test]
    fn test_toggle_favorite_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let mut contacts = open_dir(&dir);
        let added = contacts.add("alice", "http://a.local/gun", false);

        assert_eq!(contacts.toggle_favorite(added.id), Some(true));
        assert_eq!(contacts.toggle_favorite(added.id), Some(false));
        assert_eq!(contacts.toggle_favorite(Uuid::new_v4()), None);

        assert!(contacts.find_by_address("http://a.local/gun").is_some());
        assert!(contacts.find_by_address("http://b.local/gun").is_none());
    }

    #[test]
    fn test_unreadable_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.json");
        std::fs::write(&path, b"garbage").unwrap();

        let contacts = ContactDirectory::open(ContactStorage::open_at(&path));
        assert!(contacts.is_empty());
    }
}
