//! Save slots and the storage backends that hold them.
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

use crate::GameStorage;
use crate::auction::AuctionState;
use crate::settings::Settings;
use crate::state::GameState;

/// A named snapshot of a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSlot {
    pub name: String,
    #[serde(default)]
    pub state: GameState,
    /// Auction that was open when the slot was written.
    #[serde(default)]
    pub auction: Option<AuctionState>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub updated_at: i64,
}

impl SaveSlot {
    /// Stamp `state` with the current time.
    #[must_use]
    pub fn now(name: impl Into<String>, state: GameState) -> Self {
        Self {
            name: name.into(),
            state,
            auction: None,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    #[must_use]
    pub fn with_auction(mut self, auction: Option<AuctionState>) -> Self {
        self.auction = auction;
        self
    }

    #[must_use]
    pub fn summary(&self) -> SaveSummary {
        SaveSummary {
            name: self.name.clone(),
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSummary {
    pub name: String,
    pub updated_at: i64,
}

/// Newest first.
fn sort_newest_first(slots: &mut [SaveSlot]) {
    slots.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// In-process storage, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    saves: Rc<RefCell<BTreeMap<String, SaveSlot>>>,
    settings: Rc<RefCell<Option<Settings>>>,
}

impl GameStorage for MemoryStorage {
    type Error = Infallible;

    fn list_saves(&self) -> Result<Vec<SaveSummary>, Self::Error> {
        let mut slots: Vec<SaveSlot> = self.saves.borrow().values().cloned().collect();
        sort_newest_first(&mut slots);
        Ok(slots.iter().map(SaveSlot::summary).collect())
    }

    fn save_game(&self, slot: &SaveSlot) -> Result<(), Self::Error> {
        self.saves
            .borrow_mut()
            .insert(slot.name.clone(), slot.clone());
        Ok(())
    }

    fn load_game(&self, save_name: &str) -> Result<Option<SaveSlot>, Self::Error> {
        Ok(self.saves.borrow().get(save_name).cloned())
    }

    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error> {
        self.saves.borrow_mut().remove(save_name);
        Ok(())
    }

    fn load_settings(&self) -> Result<Option<Settings>, Self::Error> {
        Ok(self.settings.borrow().clone())
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), Self::Error> {
        *self.settings.borrow_mut() = Some(settings.clone());
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("stored data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

const SAVES_FILE: &str = "saves.json";
const SETTINGS_FILE: &str = "settings.json";

/// Saves kept as one JSON array in a directory, with settings in a sibling file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_optional(&self, file: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.dir.join(file)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Every readable slot. Entries that no longer parse are skipped rather than
    /// failing the whole file.
    fn read_slots(&self) -> Result<Vec<SaveSlot>, StorageError> {
        let Some(text) = self.read_optional(SAVES_FILE)? else {
            return Ok(Vec::new());
        };
        let raw: Vec<serde_json::Value> = serde_json::from_str(&text)?;
        let mut slots = Vec::with_capacity(raw.len());
        for entry in raw {
            match serde_json::from_value::<SaveSlot>(entry) {
                Ok(slot) => slots.push(slot),
                Err(err) => log::warn!("skipping unreadable save entry: {err}"),
            }
        }
        Ok(slots)
    }

    fn write_slots(&self, slots: &mut [SaveSlot]) -> Result<(), StorageError> {
        sort_newest_first(slots);
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string(slots)?;
        fs::write(self.dir.join(SAVES_FILE), json)?;
        Ok(())
    }
}

impl GameStorage for JsonFileStorage {
    type Error = StorageError;

    fn list_saves(&self) -> Result<Vec<SaveSummary>, Self::Error> {
        let mut slots = self.read_slots()?;
        sort_newest_first(&mut slots);
        Ok(slots.iter().map(SaveSlot::summary).collect())
    }

    fn save_game(&self, slot: &SaveSlot) -> Result<(), Self::Error> {
        let mut slots = self.read_slots()?;
        slots.retain(|s| s.name != slot.name);
        slots.push(slot.clone());
        self.write_slots(&mut slots)
    }

    fn load_game(&self, save_name: &str) -> Result<Option<SaveSlot>, Self::Error> {
        Ok(self
            .read_slots()?
            .into_iter()
            .find(|slot| slot.name == save_name))
    }

    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error> {
        let mut slots = self.read_slots()?;
        let before = slots.len();
        slots.retain(|s| s.name != save_name);
        if slots.len() != before {
            self.write_slots(&mut slots)?;
        }
        Ok(())
    }

    fn load_settings(&self) -> Result<Option<Settings>, Self::Error> {
        match self.read_optional(SETTINGS_FILE)? {
            Some(text) => Ok(Some(Settings::from_json(&text)?)),
            None => Ok(None),
        }
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), Self::Error> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(SETTINGS_FILE), settings.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardCatalog;
    use crate::state::init_players;

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "gridstock-storage-{label}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn slot(name: &str, updated_at: i64) -> SaveSlot {
        SaveSlot {
            name: name.into(),
            state: GameState::new(BoardCatalog::sp500(), init_players(2, &[]), 1),
            auction: None,
            updated_at,
        }
    }

    #[test]
    fn memory_storage_lists_newest_first_and_overwrites() {
        let storage = MemoryStorage::default();
        storage.save_game(&slot("a", 10)).unwrap();
        storage.save_game(&slot("b", 30)).unwrap();
        storage.save_game(&slot("a", 50)).unwrap();
        let names: Vec<String> = storage
            .list_saves()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["a", "b"]);
        storage.delete_save("a").unwrap();
        assert!(storage.load_game("a").unwrap().is_none());
    }

    #[test]
    fn file_storage_round_trips_and_skips_corrupt_entries() {
        let dir = temp_dir("roundtrip");
        let storage = JsonFileStorage::new(&dir);
        assert!(storage.list_saves().unwrap().is_empty());
        storage.save_game(&slot("Manual", 5)).unwrap();
        storage.save_game(&slot("Autosave", 9)).unwrap();

        let text = fs::read_to_string(dir.join(SAVES_FILE)).unwrap();
        let mut raw: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(raw[0]["name"], "Autosave");
        assert!(raw[0]["state"]["bankAuctionQueue"].is_array());
        raw.push(serde_json::json!({ "state": 42 }));
        fs::write(dir.join(SAVES_FILE), serde_json::to_string(&raw).unwrap()).unwrap();

        let summaries = storage.list_saves().unwrap();
        assert_eq!(summaries.len(), 2);
        let loaded = storage.load_game("Manual").unwrap().expect("manual slot");
        assert_eq!(loaded.updated_at, 5);
        assert_eq!(loaded.state.players.len(), 2);
        storage.delete_save("Manual").unwrap();
        assert!(storage.load_game("Manual").unwrap().is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_storage_keeps_settings_separately() {
        let dir = temp_dir("settings");
        let storage = JsonFileStorage::new(&dir);
        assert!(storage.load_settings().unwrap().is_none());
        let settings = Settings {
            player_count: 5,
            ..Settings::default()
        };
        storage.save_settings(&settings).unwrap();
        assert_eq!(storage.load_settings().unwrap(), Some(settings));
        assert!(storage.list_saves().unwrap().is_empty());
        let _ = fs::remove_dir_all(&dir);
    }
}
