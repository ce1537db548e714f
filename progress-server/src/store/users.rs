//! User accounts in a sled tree

use progress_engine::Username;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{decode, encode};
use crate::error::{Result, ServerError};

/// Stored account. Field names follow the game client's account payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserRecord {
    pub username: Username,
    /// Argon2 PHC string
    pub password_hash: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
}

pub struct UserStore {
    tree: sled::Tree,
}

impl UserStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        let tree = db.open_tree("users")?;
        Ok(Self { tree })
    }

    pub fn get(&self, username: &Username) -> Result<Option<UserRecord>> {
        match self.tree.get(username.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert a new account. Fails with `Duplicate` if the username is taken.
    pub fn insert(&self, record: &UserRecord) -> Result<()> {
        let bytes = encode(record)?;
        let swapped = self.tree.compare_and_swap(
            record.username.as_str().as_bytes(),
            None as Option<&[u8]>,
            Some(bytes),
        )?;

        match swapped {
            Ok(()) => {
                debug!(username = %record.username, role = %record.role, "User stored");
                Ok(())
            }
            Err(_) => Err(ServerError::Duplicate(format!(
                "Username '{}' already exists",
                record.username
            ))),
        }
    }

    pub fn exists(&self, username: &Username) -> Result<bool> {
        Ok(self.tree.contains_key(username.as_str().as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> UserRecord {
        UserRecord {
            username: Username::parse(name).unwrap(),
            password_hash: "$argon2id$stub".into(),
            role: "Student".into(),
            section: Some("Rizal".into()),
            first_name: None,
            last_name: None,
            character: None,
        }
    }

    #[test]
    fn test_insert_get_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path().join("db")).unwrap();
        let store = UserStore::open(&db).unwrap();

        store.insert(&record("Mia")).unwrap();
        let found = store.get(&Username::parse("MIA").unwrap()).unwrap().unwrap();
        assert_eq!(found.section.as_deref(), Some("Rizal"));

        assert!(matches!(
            store.insert(&record("mia")),
            Err(ServerError::Duplicate(_))
        ));
        assert!(!store.exists(&Username::parse("leo").unwrap()).unwrap());
    }
}
