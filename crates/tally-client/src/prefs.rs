use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use tally_types::Person;

use crate::error::Result;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredPreference {
    current_user: Option<Person>,
}

/// Which person this device acts as. Stored locally, never sent anywhere.
#[derive(Debug, Clone)]
pub struct DevicePreference {
    path: PathBuf,
}

impl DevicePreference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// None when nothing was chosen yet. An unreadable file counts as unset.
    pub fn load(&self) -> Result<Option<Person>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<StoredPreference>(&raw) {
            Ok(stored) => Ok(stored.current_user),
            Err(e) => {
                warn!("Ignoring corrupt preference file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    /// Overwrites any previous choice.
    pub fn store(&self, person: Person) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredPreference {
            current_user: Some(person),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_unset() {
        let dir = tempfile::tempdir().unwrap();
        let pref = DevicePreference::new(dir.path().join("prefs.json"));
        assert_eq!(pref.load().unwrap(), None);
        pref.clear().unwrap();
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let pref = DevicePreference::new(dir.path().join("nested/dir/prefs.json"));

        pref.store(Person::Carlota).unwrap();
        assert_eq!(pref.load().unwrap(), Some(Person::Carlota));

        pref.store(Person::Filipe).unwrap();
        assert_eq!(pref.load().unwrap(), Some(Person::Filipe));

        pref.clear().unwrap();
        assert_eq!(pref.load().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(DevicePreference::new(&path).load().unwrap(), None);

        fs::write(&path, r#"{"current_user": "Nobody"}"#).unwrap();
        assert_eq!(DevicePreference::new(&path).load().unwrap(), None);
    }
}
