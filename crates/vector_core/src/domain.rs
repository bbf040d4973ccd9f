//! crates/vector_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application: the workout
//! configuration vocabulary (equipment, muscle groups, time windows), the
//! generated plan, and the signed-in user.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

/// Errors raised when a wire value does not name a known domain value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("Unknown equipment: '{0}'")]
    UnknownEquipment(String),
    #[error("Unknown muscle group: '{0}'")]
    UnknownMuscleGroup(String),
    #[error("Unsupported workout duration: {0} minutes")]
    UnsupportedDuration(u32),
}

//=========================================================================================
// Configuration Vocabulary
//=========================================================================================

/// The single equipment category a workout is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Equipment {
    #[serde(rename = "Full Gym")]
    FullGym,
    Dumbbells,
    Bodyweight,
}

impl Equipment {
    pub const ALL: [Equipment; 3] = [Equipment::FullGym, Equipment::Dumbbells, Equipment::Bodyweight];

    pub fn as_str(self) -> &'static str {
        match self {
            Equipment::FullGym => "Full Gym",
            Equipment::Dumbbells => "Dumbbells",
            Equipment::Bodyweight => "Bodyweight",
        }
    }
}

impl fmt::Display for Equipment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Equipment {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Equipment::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::UnknownEquipment(s.to_string()))
    }
}

/// A targetable muscle group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MuscleGroup {
    Chest,
    Back,
    Shoulders,
    Arms,
    Legs,
    Core,
}

impl MuscleGroup {
    pub const ALL: [MuscleGroup; 6] = [
        MuscleGroup::Chest,
        MuscleGroup::Back,
        MuscleGroup::Shoulders,
        MuscleGroup::Arms,
        MuscleGroup::Legs,
        MuscleGroup::Core,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MuscleGroup::Chest => "Chest",
            MuscleGroup::Back => "Back",
            MuscleGroup::Shoulders => "Shoulders",
            MuscleGroup::Arms => "Arms",
            MuscleGroup::Legs => "Legs",
            MuscleGroup::Core => "Core",
        }
    }

    /// The anatomical sub-regions each of which must receive its own exercise.
    pub fn sub_regions(self) -> &'static [&'static str] {
        match self {
            MuscleGroup::Chest => &[
                "Upper chest (clavicular head)",
                "Middle chest (sternal head)",
                "Lower chest (costal fibers)",
            ],
            MuscleGroup::Back => &[
                "Lats",
                "Upper back (traps and rhomboids)",
                "Lower back (erector spinae)",
            ],
            MuscleGroup::Shoulders => &[
                "Anterior deltoid",
                "Lateral deltoid",
                "Posterior deltoid",
            ],
            MuscleGroup::Arms => &["Biceps", "Triceps", "Forearms"],
            MuscleGroup::Legs => &["Quadriceps", "Hamstrings", "Glutes", "Calves"],
            MuscleGroup::Core => &["Upper abs", "Lower abs", "Obliques"],
        }
    }
}

impl fmt::Display for MuscleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MuscleGroup {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MuscleGroup::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::UnknownMuscleGroup(s.to_string()))
    }
}

/// The allowed session lengths. Serialised as the number of minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum TimeOption {
    Fifteen,
    Thirty,
    FortyFive,
    Sixty,
}

impl TimeOption {
    pub const ALL: [TimeOption; 4] = [
        TimeOption::Fifteen,
        TimeOption::Thirty,
        TimeOption::FortyFive,
        TimeOption::Sixty,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            TimeOption::Fifteen => 15,
            TimeOption::Thirty => 30,
            TimeOption::FortyFive => 45,
            TimeOption::Sixty => 60,
        }
    }

    pub fn seconds(self) -> u32 {
        self.minutes() * 60
    }
}

impl TryFrom<u32> for TimeOption {
    type Error = DomainError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        TimeOption::ALL
            .into_iter()
            .find(|t| t.minutes() == minutes)
            .ok_or(DomainError::UnsupportedDuration(minutes))
    }
}

impl From<TimeOption> for u32 {
    fn from(time: TimeOption) -> Self {
        time.minutes()
    }
}

impl fmt::Display for TimeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.minutes())
    }
}

/// An insertion-ordered set of muscle groups.
///
/// Order is kept for display only; two selections holding the same groups are equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<MuscleGroup>", into = "Vec<MuscleGroup>")]
pub struct MuscleSelection(Vec<MuscleGroup>);

impl MuscleSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the group if absent. Returns whether it was added.
    pub fn insert(&mut self, muscle: MuscleGroup) -> bool {
        if self.contains(muscle) {
            return false;
        }
        self.0.push(muscle);
        true
    }

    /// Adds the group if absent, removes it otherwise. Returns whether it is now selected.
    pub fn toggle(&mut self, muscle: MuscleGroup) -> bool {
        if let Some(pos) = self.0.iter().position(|m| *m == muscle) {
            self.0.remove(pos);
            false
        } else {
            self.0.push(muscle);
            true
        }
    }

    pub fn contains(&self, muscle: MuscleGroup) -> bool {
        self.0.contains(&muscle)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = MuscleGroup> + '_ {
        self.0.iter().copied()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl PartialEq for MuscleSelection {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|m| other.contains(m))
    }
}

impl Eq for MuscleSelection {}

impl From<Vec<MuscleGroup>> for MuscleSelection {
    fn from(muscles: Vec<MuscleGroup>) -> Self {
        muscles.into_iter().collect()
    }
}

impl From<MuscleSelection> for Vec<MuscleGroup> {
    fn from(selection: MuscleSelection) -> Self {
        selection.0
    }
}

impl FromIterator<MuscleGroup> for MuscleSelection {
    fn from_iter<I: IntoIterator<Item = MuscleGroup>>(iter: I) -> Self {
        let mut selection = MuscleSelection::new();
        for muscle in iter {
            selection.insert(muscle);
        }
        selection
    }
}

impl fmt::Display for MuscleSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(MuscleGroup::as_str).collect();
        f.write_str(&names.join(", "))
    }
}

//=========================================================================================
// Generated Plan
//=========================================================================================

/// One prescribed movement. Never mutated after generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: String,
    pub sets: u32,
    pub reps_or_duration: String,
    pub rest_seconds: u32,
    pub form_guidance: String,
    pub equipment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_tag: Option<String>,
}

/// How `repsOrDuration` reads once interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prescription {
    Reps(u32),
    RepRange(u32, u32),
    Timed(u32),
    Unstructured,
}

struct PrescriptionPatterns {
    reps: Regex,
    range: Regex,
    timed: Regex,
}

fn prescription_patterns() -> &'static PrescriptionPatterns {
    static PATTERNS: OnceLock<PrescriptionPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| PrescriptionPatterns {
        reps: Regex::new(r"(?i)^(\d+)\s*(?:reps?)?$").expect("reps pattern is valid"),
        range: Regex::new(r"(?i)^(\d+)\s*(?:-|–|to)\s*(\d+)\s*(?:reps?)?$")
            .expect("range pattern is valid"),
        timed: Regex::new(r"(?i)^(\d+)\s*(s|secs?|seconds?|m|mins?|minutes?)$")
            .expect("timed pattern is valid"),
    })
}

impl Exercise {
    pub fn prescription(&self) -> Prescription {
        let text = self.reps_or_duration.trim();
        let patterns = prescription_patterns();

        if let Some(caps) = patterns.timed.captures(text) {
            let Ok(amount) = caps[1].parse::<u32>() else {
                return Prescription::Unstructured;
            };
            let unit = caps[2].to_ascii_lowercase();
            return if unit.starts_with('m') {
                Prescription::Timed(amount.saturating_mul(60))
            } else {
                Prescription::Timed(amount)
            };
        }
        if let Some(caps) = patterns.range.captures(text) {
            return match (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
                (Ok(lo), Ok(hi)) => Prescription::RepRange(lo.min(hi), lo.max(hi)),
                _ => Prescription::Unstructured,
            };
        }
        if let Some(caps) = patterns.reps.captures(text) {
            return caps[1]
                .parse::<u32>()
                .map(Prescription::Reps)
                .unwrap_or(Prescription::Unstructured);
        }
        Prescription::Unstructured
    }

    /// Seconds this exercise occupies under the time-budget model.
    pub fn estimated_seconds(&self, work_seconds_per_set: u32) -> u64 {
        let work = match self.prescription() {
            Prescription::Timed(seconds) => seconds,
            _ => work_seconds_per_set,
        };
        u64::from(self.sets) * (u64::from(work) + u64::from(self.rest_seconds))
    }
}

/// A generated workout. Immutable once built; partial variants are derived copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlan {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub muscle_groups: MuscleSelection,
    pub equipment: Equipment,
    pub duration_minutes: TimeOption,
    pub exercises: Vec<Exercise>,
    pub estimated_calories: u32,
}

impl WorkoutPlan {
    /// Total session length under `Σ sets × (work + rest)`.
    pub fn estimated_seconds(&self, work_seconds_per_set: u32) -> u64 {
        self.exercises
            .iter()
            .map(|e| e.estimated_seconds(work_seconds_per_set))
            .sum()
    }

    pub fn fits_window(&self, work_seconds_per_set: u32) -> bool {
        self.estimated_seconds(work_seconds_per_set) <= u64::from(self.duration_minutes.seconds())
    }

    /// Derives the variant holding only the given exercise indices, in plan order.
    pub fn with_exercises(&self, indices: &BTreeSet<usize>) -> WorkoutPlan {
        let exercises = self
            .exercises
            .iter()
            .enumerate()
            .filter(|(i, _)| indices.contains(i))
            .map(|(_, e)| e.clone())
            .collect();
        WorkoutPlan {
            exercises,
            ..self.clone()
        }
    }
}

//=========================================================================================
// Identity
//=========================================================================================

/// The opaque signed-in user handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedInUser {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: SignedInUser,
    pub email: String,
    pub hashed_password: String,
}
