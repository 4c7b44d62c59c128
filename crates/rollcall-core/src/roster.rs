//! Student roster and identity sources.
//!
//! The default roster is embedded at compile time from
//! `contrib/roster/default.toml`. A different roster can be loaded from any
//! TOML file with the same `[[student]]` layout.

use crate::types::Identity;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use thiserror::Error;

const DEFAULT_ROSTER: &str = include_str!("../../../contrib/roster/default.toml");

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("failed to read roster {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("bad roster TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate student id: {0}")]
    DuplicateId(String),
    #[error("student entry has an empty id or name")]
    EmptyField,
}

/// On-disk roster layout.
#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(default)]
    student: Vec<Identity>,
}

/// Ordered list of identities with unique ids.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    students: Vec<Identity>,
}

impl Roster {
    /// Build a roster, rejecting duplicate ids and blank fields.
    pub fn new(students: Vec<Identity>) -> Result<Self, RosterError> {
        let mut roster = Self::default();
        for s in students {
            roster.insert(s)?;
        }
        Ok(roster)
    }

    /// The roster embedded in the binary.
    pub fn embedded() -> Result<Self, RosterError> {
        Self::from_toml(DEFAULT_ROSTER)
    }

    pub fn from_toml(src: &str) -> Result<Self, RosterError> {
        let file: RosterFile = toml::from_str(src)?;
        Self::new(file.student)
    }

    pub fn load(path: &Path) -> Result<Self, RosterError> {
        let src = std::fs::read_to_string(path).map_err(|source| RosterError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let roster = Self::from_toml(&src)?;
        tracing::info!(path = %path.display(), students = roster.len(), "roster loaded");
        Ok(roster)
    }

    /// Append a student. Ids are unique across the roster.
    pub fn insert(&mut self, identity: Identity) -> Result<(), RosterError> {
        if identity.id.trim().is_empty() || identity.name.trim().is_empty() {
            return Err(RosterError::EmptyField);
        }
        if self.get(&identity.id).is_some() {
            return Err(RosterError::DuplicateId(identity.id));
        }
        self.students.push(identity);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Identity> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn students(&self) -> &[Identity] {
        &self.students
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}

/// Strategy for picking the identity a simulated detection "recognizes".
pub trait IdentitySource {
    /// Draw the next identity, or `None` if nothing can be drawn.
    fn next(&mut self, roster: &Roster) -> Option<Identity>;
}

/// Uniform random draw over the roster.
pub struct RandomDraw {
    rng: StdRng,
}

impl RandomDraw {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomDraw {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySource for RandomDraw {
    fn next(&mut self, roster: &Roster) -> Option<Identity> {
        if roster.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..roster.len());
        roster.students().get(idx).cloned()
    }
}

/// Deterministic draw: cycles through a fixed sequence of ids.
///
/// Ids missing from the roster are skipped; if none of them resolve the
/// draw yields `None`.
pub struct ScriptedDraw {
    ids: VecDeque<String>,
}

impl ScriptedDraw {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl IdentitySource for ScriptedDraw {
    fn next(&mut self, roster: &Roster) -> Option<Identity> {
        for _ in 0..self.ids.len() {
            let id = self.ids.pop_front()?;
            let found = roster.get(&id).cloned();
            self.ids.push_back(id);
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_embedded_roster() {
        let roster = Roster::embedded().unwrap();
        assert_eq!(roster.len(), 4);
        assert_eq!(roster.get("ST001").unwrap().name, "John Doe");
        assert_eq!(roster.students()[3].id, "ST004");
    }

    #[test]
    fn test_from_toml_rejects_duplicate_ids() {
        let src = r#"
            [[student]]
            id = "A"
            name = "One"

            [[student]]
            id = "A"
            name = "Two"
        "#;
        let err = Roster::from_toml(src).unwrap_err();
        assert!(matches!(err, RosterError::DuplicateId(id) if id == "A"));
    }

    #[test]
    fn test_from_toml_empty_file() {
        let roster = Roster::from_toml("").unwrap();
        assert!(roster.is_empty());
    }

    #[test]
    fn test_insert_rejects_blank_fields() {
        let mut roster = Roster::default();
        assert!(matches!(
            roster.insert(Identity::new("  ", "Name")),
            Err(RosterError::EmptyField)
        ));
        assert!(matches!(
            roster.insert(Identity::new("ST9", "")),
            Err(RosterError::EmptyField)
        ));
        assert!(roster.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Roster::load(Path::new("/nonexistent/rollcall/roster.toml")).unwrap_err();
        assert!(matches!(err, RosterError::Read { .. }));
    }

    #[test]
    fn test_random_draw_empty_roster() {
        let mut draw = RandomDraw::seeded(7);
        assert!(draw.next(&Roster::default()).is_none());
    }

    #[test]
    fn test_random_draw_covers_roster() {
        let roster = Roster::embedded().unwrap();
        let mut draw = RandomDraw::seeded(42);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..400 {
            let id = draw.next(&roster).unwrap().id;
            *counts.entry(id).or_default() += 1;
        }
        assert_eq!(counts.len(), 4);
        // loose uniformity bound: every student drawn at least 50 of 400 times
        assert!(counts.values().all(|&c| c >= 50), "counts: {counts:?}");
    }

    #[test]
    fn test_random_draw_seeded_is_reproducible() {
        let roster = Roster::embedded().unwrap();
        let mut a = RandomDraw::seeded(3);
        let mut b = RandomDraw::seeded(3);
        for _ in 0..10 {
            assert_eq!(a.next(&roster), b.next(&roster));
        }
    }

    #[test]
    fn test_scripted_draw_cycles() {
        let roster = Roster::embedded().unwrap();
        let mut draw = ScriptedDraw::new(["ST002", "ST001"]);
        let ids: Vec<String> = (0..4).map(|_| draw.next(&roster).unwrap().id).collect();
        assert_eq!(ids, vec!["ST002", "ST001", "ST002", "ST001"]);
    }

    #[test]
    fn test_scripted_draw_skips_unknown_ids() {
        let roster = Roster::embedded().unwrap();
        let mut draw = ScriptedDraw::new(["NOPE", "ST003"]);
        assert_eq!(draw.next(&roster).unwrap().id, "ST003");
        assert_eq!(draw.next(&roster).unwrap().id, "ST003");
    }

    #[test]
    fn test_scripted_draw_none_resolvable() {
        let roster = Roster::embedded().unwrap();
        let mut draw = ScriptedDraw::new(["X1", "X2"]);
        assert!(draw.next(&roster).is_none());
        let mut empty = ScriptedDraw::new(Vec::<String>::new());
        assert!(empty.next(&roster).is_none());
    }
}
