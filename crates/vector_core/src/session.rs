//! crates/vector_core/src/session.rs
//!
//! The live workout session. One `SessionStateMachine` exists per active
//! session and is owned by a single driver, which feeds it one tick per second
//! from two independent clocks: the mission clock (elapsed time, honours pause)
//! and the rest clock (rest countdown, ignores pause).

use crate::domain::WorkoutPlan;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Finished,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

/// Precondition violations. The calling layer is expected to gate these out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Exercise index {index} is out of range for a plan of {len} exercises")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Session is no longer active ({0:?})")]
    NotActive(SessionStatus),

    #[error("Cannot finish a session with no completed exercises; abort it instead")]
    NothingCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestState {
    NotResting,
    /// `remaining` is always positive.
    Resting { remaining: u32 },
}

/// What a tick changed, for the driver to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    pub elapsed_advanced: bool,
    pub rest_ended: bool,
}

/// A serialisable view of the live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub elapsed_seconds: u64,
    pub paused: bool,
    pub resting: bool,
    pub rest_remaining_seconds: u32,
    pub completed_indices: Vec<usize>,
    pub total_exercises: usize,
}

#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    plan: Arc<WorkoutPlan>,
    completed: BTreeSet<usize>,
    elapsed_seconds: u64,
    paused: bool,
    rest: RestState,
    status: SessionStatus,
}

impl SessionStateMachine {
    pub fn new(plan: Arc<WorkoutPlan>) -> Self {
        Self {
            plan,
            completed: BTreeSet::new(),
            elapsed_seconds: 0,
            paused: false,
            rest: RestState::NotResting,
            status: SessionStatus::Active,
        }
    }

    //=====================================================================================
    // Queries
    //=====================================================================================

    pub fn plan(&self) -> &WorkoutPlan {
        &self.plan
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_resting(&self) -> bool {
        matches!(self.rest, RestState::Resting { .. })
    }

    pub fn rest_remaining_seconds(&self) -> u32 {
        match self.rest {
            RestState::Resting { remaining } => remaining,
            RestState::NotResting => 0,
        }
    }

    pub fn completed_indices(&self) -> &BTreeSet<usize> {
        &self.completed
    }

    pub fn is_fully_complete(&self) -> bool {
        self.completed.len() == self.plan.exercises.len()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            elapsed_seconds: self.elapsed_seconds,
            paused: self.paused,
            resting: self.is_resting(),
            rest_remaining_seconds: self.rest_remaining_seconds(),
            completed_indices: self.completed.iter().copied().collect(),
            total_exercises: self.plan.exercises.len(),
        }
    }

    //=====================================================================================
    // Transitions
    //=====================================================================================

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.status.is_terminal() {
            return Err(SessionError::NotActive(self.status));
        }
        Ok(())
    }

    /// Flips whether `index` is complete. Returns whether it is complete afterwards.
    pub fn toggle_exercise_complete(&mut self, index: usize) -> Result<bool, SessionError> {
        self.ensure_active()?;
        let len = self.plan.exercises.len();
        if index >= len {
            return Err(SessionError::IndexOutOfRange { index, len });
        }
        if self.completed.remove(&index) {
            Ok(false)
        } else {
            self.completed.insert(index);
            Ok(true)
        }
    }

    /// Starts (or restarts) the rest countdown. Zero seconds leaves the session not resting.
    pub fn start_rest(&mut self, seconds: u32) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.rest = if seconds == 0 {
            RestState::NotResting
        } else {
            RestState::Resting { remaining: seconds }
        };
        Ok(())
    }

    pub fn skip_rest(&mut self) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.rest = RestState::NotResting;
        Ok(())
    }

    /// Flips the mission-clock pause. Returns whether the session is now paused.
    pub fn toggle_pause(&mut self) -> Result<bool, SessionError> {
        self.ensure_active()?;
        self.paused = !self.paused;
        Ok(self.paused)
    }

    /// One second on the mission clock. Returns whether elapsed time advanced.
    pub fn tick_mission(&mut self) -> bool {
        if self.status.is_terminal() || self.paused {
            return false;
        }
        self.elapsed_seconds += 1;
        true
    }

    /// One second on the rest clock. Returns whether the rest just ended.
    pub fn tick_rest(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match self.rest {
            RestState::Resting { remaining } if remaining > 1 => {
                self.rest = RestState::Resting {
                    remaining: remaining - 1,
                };
                false
            }
            RestState::Resting { .. } => {
                self.rest = RestState::NotResting;
                true
            }
            RestState::NotResting => false,
        }
    }

    /// One wall-clock second on both clocks.
    pub fn tick(&mut self) -> TickOutcome {
        TickOutcome {
            elapsed_advanced: self.tick_mission(),
            rest_ended: self.tick_rest(),
        }
    }

    /// Ends the session and returns the plan to persist: the full plan when every
    /// exercise is complete, otherwise the completed subsequence in plan order.
    pub fn finish(&mut self) -> Result<WorkoutPlan, SessionError> {
        self.ensure_active()?;
        if self.completed.is_empty() {
            return Err(SessionError::NothingCompleted);
        }
        let plan = if self.is_fully_complete() {
            self.plan.as_ref().clone()
        } else {
            self.plan.with_exercises(&self.completed)
        };
        self.rest = RestState::NotResting;
        self.status = SessionStatus::Finished;
        Ok(plan)
    }

    pub fn abort(&mut self) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.rest = RestState::NotResting;
        self.status = SessionStatus::Aborted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Equipment, Exercise, MuscleGroup, TimeOption};
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn plan_of(names: &[&str]) -> Arc<WorkoutPlan> {
        Arc::new(WorkoutPlan {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            muscle_groups: vec![MuscleGroup::Legs].into(),
            equipment: Equipment::Bodyweight,
            duration_minutes: TimeOption::Thirty,
            exercises: names
                .iter()
                .map(|name| Exercise {
                    name: name.to_string(),
                    sets: 3,
                    reps_or_duration: "12".to_string(),
                    rest_seconds: 60,
                    form_guidance: "Drive through the glutes".to_string(),
                    equipment: "Bodyweight".to_string(),
                    visual_tag: None,
                })
                .collect(),
            estimated_calories: 180,
        })
    }

    fn session() -> SessionStateMachine {
        SessionStateMachine::new(plan_of(&["A", "B", "C"]))
    }

    #[test]
    fn test_toggle_rejects_out_of_range() {
        let mut s = session();
        assert_eq!(
            s.toggle_exercise_complete(3),
            Err(SessionError::IndexOutOfRange { index: 3, len: 3 })
        );
        assert!(s.completed_indices().is_empty());
    }

    #[test]
    fn test_rest_counts_down_without_underflow() {
        let mut s = session();
        s.start_rest(90).unwrap();
        for _ in 0..89 {
            assert!(!s.tick().rest_ended);
        }
        assert!(s.is_resting());
        assert!(s.tick().rest_ended);
        assert!(!s.is_resting());
        assert_eq!(s.rest_remaining_seconds(), 0);

        let outcome = s.tick();
        assert!(!outcome.rest_ended);
        assert!(!s.is_resting());
        assert_eq!(s.rest_remaining_seconds(), 0);
    }

    #[test]
    fn test_start_rest_is_reentrant() {
        let mut s = session();
        s.start_rest(60).unwrap();
        s.tick();
        s.tick();
        s.start_rest(30).unwrap();
        assert_eq!(s.rest_remaining_seconds(), 30);

        s.start_rest(0).unwrap();
        assert!(!s.is_resting());
    }

    #[test]
    fn test_skip_rest() {
        let mut s = session();
        s.start_rest(45).unwrap();
        s.skip_rest().unwrap();
        assert!(!s.is_resting());
        assert_eq!(s.rest_remaining_seconds(), 0);
    }

    #[test]
    fn test_pause_stops_mission_clock_but_not_rest() {
        let mut s = session();
        s.tick();
        assert!(s.toggle_pause().unwrap());
        s.start_rest(5).unwrap();
        for _ in 0..3 {
            s.tick();
        }
        assert_eq!(s.elapsed_seconds(), 1);
        assert_eq!(s.rest_remaining_seconds(), 2);

        assert!(!s.toggle_pause().unwrap());
        s.tick_mission();
        assert_eq!(s.elapsed_seconds(), 2);
    }

    #[test]
    fn test_finish_partial_keeps_plan_order() {
        let mut s = session();
        s.toggle_exercise_complete(2).unwrap();
        s.toggle_exercise_complete(0).unwrap();
        let plan = s.finish().unwrap();
        let names: Vec<&str> = plan.exercises.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(plan.id, s.plan().id);
        assert_eq!(s.status(), SessionStatus::Finished);
    }

    #[test]
    fn test_finish_full_returns_original_plan() {
        let mut s = session();
        for i in 0..3 {
            s.toggle_exercise_complete(i).unwrap();
        }
        assert!(s.is_fully_complete());
        let plan = s.finish().unwrap();
        assert_eq!(&plan, s.plan());
    }

    #[test]
    fn test_finish_without_progress_is_rejected() {
        let mut s = session();
        assert_eq!(s.finish(), Err(SessionError::NothingCompleted));
        assert_eq!(s.status(), SessionStatus::Active);
        s.abort().unwrap();
        assert_eq!(s.status(), SessionStatus::Aborted);
    }

    #[test]
    fn test_abort_from_any_active_state() {
        let mut resting = session();
        resting.start_rest(30).unwrap();
        resting.toggle_pause().unwrap();
        resting.toggle_exercise_complete(1).unwrap();
        assert!(resting.abort().is_ok());
        assert!(!resting.is_resting());

        assert_eq!(
            resting.abort(),
            Err(SessionError::NotActive(SessionStatus::Aborted))
        );
    }

    #[test]
    fn test_terminal_session_rejects_mutation_and_ignores_ticks() {
        let mut s = session();
        s.toggle_exercise_complete(0).unwrap();
        s.finish().unwrap();
        let before = s.elapsed_seconds();
        assert_eq!(s.tick(), TickOutcome::default());
        assert_eq!(s.elapsed_seconds(), before);
        assert!(s.toggle_exercise_complete(1).is_err());
        assert!(s.start_rest(10).is_err());
        assert!(s.toggle_pause().is_err());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut s = session();
        s.toggle_exercise_complete(1).unwrap();
        s.start_rest(20).unwrap();
        s.tick();
        let snapshot = s.snapshot();
        assert_eq!(snapshot.completed_indices, vec![1]);
        assert_eq!(snapshot.elapsed_seconds, 1);
        assert!(snapshot.resting);
        assert_eq!(snapshot.rest_remaining_seconds, 19);
        assert_eq!(snapshot.total_exercises, 3);
    }

    proptest! {
        #[test]
        fn prop_toggle_twice_is_identity(
            prefix in proptest::collection::vec(0usize..3, 0..6),
            index in 0usize..3,
        ) {
            let mut s = session();
            for i in prefix {
                s.toggle_exercise_complete(i).unwrap();
            }
            let before = s.completed_indices().clone();
            s.toggle_exercise_complete(index).unwrap();
            s.toggle_exercise_complete(index).unwrap();
            prop_assert_eq!(s.completed_indices(), &before);
        }

        #[test]
        fn prop_ticks_while_paused_do_not_advance(warmup in 0u64..20, n in 0u64..200) {
            let mut s = session();
            for _ in 0..warmup {
                s.tick();
            }
            s.toggle_pause().unwrap();
            for _ in 0..n {
                s.tick();
            }
            prop_assert_eq!(s.elapsed_seconds(), warmup);
        }

        #[test]
        fn prop_ticks_while_running_advance_by_n(n in 0u64..200) {
            let mut s = session();
            for _ in 0..n {
                s.tick();
            }
            prop_assert_eq!(s.elapsed_seconds(), n);
        }
    }
}
