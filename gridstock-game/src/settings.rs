//! New-game settings, persisted separately from any game.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::constants::{
    DEFAULT_AI_SLOTS, DEFAULT_AUTO_END_TURN_MS, DEFAULT_PLAYER_COUNT, MAX_PLAYERS, MIN_PLAYERS,
};
use crate::state::{PlayerState, init_players};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub player_count: usize,
    /// Seats played by the computer.
    pub ai_slots: BTreeSet<usize>,
    /// Idle time before a human player's finished turn is ended for them.
    pub auto_end_turn_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player_count: DEFAULT_PLAYER_COUNT,
            ai_slots: DEFAULT_AI_SLOTS.into_iter().collect(),
            auto_end_turn_ms: DEFAULT_AUTO_END_TURN_MS,
        }
    }
}

impl Settings {
    /// Clamp the player count into range and drop computer seats that no longer exist.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.player_count = self.player_count.clamp(MIN_PLAYERS, MAX_PLAYERS);
        let count = self.player_count;
        self.ai_slots.retain(|&slot| slot < count);
        self
    }

    /// Parse stored settings, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a settings object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::normalized)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Starting roster for a new game under these settings.
    #[must_use]
    pub fn roster(&self) -> Vec<PlayerState> {
        let normalized = self.clone().normalized();
        let slots: Vec<usize> = normalized.ai_slots.into_iter().collect();
        init_players(normalized.player_count, &slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_table_setup() {
        let settings = Settings::default();
        assert_eq!(settings.player_count, 4);
        assert_eq!(settings.ai_slots, BTreeSet::from([2, 3]));
        assert_eq!(settings.auto_end_turn_ms, 20_000);
    }

    #[test]
    fn normalization_clamps_and_filters() {
        let settings = Settings {
            player_count: 9,
            ai_slots: BTreeSet::from([1, 5, 7]),
            auto_end_turn_ms: 1_000,
        }
        .normalized();
        assert_eq!(settings.player_count, 6);
        assert_eq!(settings.ai_slots, BTreeSet::from([1, 5]));

        let tiny = Settings {
            player_count: 1,
            ..Settings::default()
        }
        .normalized();
        assert_eq!(tiny.player_count, 2);
        assert!(tiny.ai_slots.is_empty());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings = Settings::from_json(r#"{"playerCount":3}"#).unwrap();
        assert_eq!(settings.player_count, 3);
        assert_eq!(settings.ai_slots, BTreeSet::from([2]));
        assert_eq!(settings.auto_end_turn_ms, DEFAULT_AUTO_END_TURN_MS);
        let json = settings.to_json().unwrap();
        assert!(json.contains("\"aiSlots\""));
    }

    #[test]
    fn roster_marks_computer_seats() {
        let roster = Settings::default().roster();
        assert_eq!(roster.len(), 4);
        let ai: Vec<bool> = roster.iter().map(|p| p.is_ai).collect();
        assert_eq!(ai, [false, false, true, true]);
    }
}
