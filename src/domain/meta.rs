// ============================================================
// Layer 3 — Episode Metadata
// ============================================================
// Demonstration files encode what they contain in their name:
//
//   demo_forward_0421.json
//        │        └─ trailing digit = environment class
//        └─ skill direction ("forward" / "backward")
//
// Environment digits:
//   1 = box, 2 = door, 3 = toilet seat, 5 = grill, 4 = reserved
//
// The name is parsed once, when a file enters a split, into an
// EpisodeMeta record. Everything downstream (indicator vectors,
// split summaries) reads the record, never the filename.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Number of classes in the skill indicator (forward, backward)
pub const SKILL_CLASSES: usize = 2;

/// Number of classes in the environment indicator (box, toilet seat, grill)
pub const ENV_CLASSES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    Box,
    Door,
    ToiletSeat,
    Grill,
}

impl Environment {
    /// Map the trailing filename digit to an environment.
    /// Digit 4 is reserved and maps to nothing.
    pub fn from_digit(d: char) -> Option<Self> {
        match d {
            '1' => Some(Self::Box),
            '2' => Some(Self::Door),
            '3' => Some(Self::ToiletSeat),
            '5' => Some(Self::Grill),
            _   => None,
        }
    }

    pub fn digit(self) -> char {
        match self {
            Self::Box        => '1',
            Self::Door       => '2',
            Self::ToiletSeat => '3',
            Self::Grill      => '5',
        }
    }

    /// Position in the environment one-hot vector.
    /// Door episodes have no slot and get an all-zero indicator.
    pub fn indicator_slot(self) -> Option<usize> {
        match self {
            Self::Box        => Some(0),
            Self::ToiletSeat => Some(1),
            Self::Grill      => Some(2),
            Self::Door       => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Box        => "box",
            Self::Door       => "door",
            Self::ToiletSeat => "toilet_seat",
            Self::Grill      => "grill",
        }
    }

    /// Human-readable skill for a direction in this environment
    pub fn skill_name(self, dir: SkillDirection) -> &'static str {
        match dir {
            SkillDirection::Forward  => "open",
            SkillDirection::Backward => "close",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillDirection {
    Forward,
    Backward,
}

impl SkillDirection {
    pub fn indicator_slot(self) -> usize {
        match self {
            Self::Forward  => 0,
            Self::Backward => 1,
        }
    }
}

/// Metadata derived from an episode's filename.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMeta {
    pub environment: Option<Environment>,
    pub skill:       Option<SkillDirection>,
}

impl EpisodeMeta {
    /// Parse the metadata out of an episode path.
    ///
    /// "backward" is checked before "forward" so a name containing
    /// both resolves the same way every time.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        let skill = if name.contains("backward") {
            Some(SkillDirection::Backward)
        } else if name.contains("forward") {
            Some(SkillDirection::Forward)
        } else {
            None
        };

        let environment = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.chars().last())
            .and_then(Environment::from_digit);

        Self { environment, skill }
    }

    /// Two-class skill one-hot: [1,0] forward, [0,1] backward.
    ///
    /// Zero when indicators are disabled, when the direction is
    /// unknown, or when the environment has no indicator slot.
    pub fn skill_indicator(&self, enabled: bool) -> [f32; SKILL_CLASSES] {
        let mut ind = [0.0; SKILL_CLASSES];
        if !enabled || self.env_slot().is_none() {
            return ind;
        }
        if let Some(dir) = self.skill {
            ind[dir.indicator_slot()] = 1.0;
        }
        ind
    }

    /// Three-class environment one-hot over (box, toilet seat, grill).
    pub fn env_indicator(&self) -> [f32; ENV_CLASSES] {
        let mut ind = [0.0; ENV_CLASSES];
        if let Some(slot) = self.env_slot() {
            ind[slot] = 1.0;
        }
        ind
    }

    fn env_slot(&self) -> Option<usize> {
        self.environment.and_then(Environment::indicator_slot)
    }

    /// Short label such as "box/open", used in split summaries
    pub fn label(&self) -> String {
        match (self.environment, self.skill) {
            (Some(env), Some(dir)) => format!("{}/{}", env, env.skill_name(dir)),
            (Some(env), None)      => format!("{env}/?"),
            (None, _)              => "unknown".to_string(),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn meta(name: &str) -> EpisodeMeta {
        EpisodeMeta::from_path(&PathBuf::from("/data/demos").join(name))
    }

    #[test]
    fn test_parse_forward_box() {
        let m = meta("demo_forward_0041.json");
        assert_eq!(m.environment, Some(Environment::Box));
        assert_eq!(m.skill, Some(SkillDirection::Forward));
        assert_eq!(m.skill_indicator(true), [1.0, 0.0]);
        assert_eq!(m.env_indicator(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_parse_backward_grill() {
        let m = meta("demo_backward_125.json");
        assert_eq!(m.environment, Some(Environment::Grill));
        assert_eq!(m.skill_indicator(true), [0.0, 1.0]);
        assert_eq!(m.env_indicator(), [0.0, 0.0, 1.0]);
        assert_eq!(m.label(), "grill/close");
    }

    #[test]
    fn test_skill_indicator_disabled_is_zero() {
        let m = meta("demo_forward_3.json");
        assert_eq!(m.skill_indicator(false), [0.0, 0.0]);
        assert_eq!(m.env_indicator(), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_door_and_reserved_give_zero_indicators() {
        // Door has no indicator slot: both vectors collapse to zero
        let door = meta("demo_forward_12.json");
        assert_eq!(door.environment, Some(Environment::Door));
        assert_eq!(door.env_indicator(), [0.0; 3]);
        assert_eq!(door.skill_indicator(true), [0.0; 2]);

        let reserved = meta("demo_forward_14.json");
        assert_eq!(reserved.environment, None);
        assert_eq!(reserved.skill_indicator(true), [0.0; 2]);
    }

    #[test]
    fn test_digit_round_trip() {
        for env in [Environment::Box, Environment::Door, Environment::ToiletSeat, Environment::Grill] {
            assert_eq!(Environment::from_digit(env.digit()), Some(env));
        }
    }
}
