//! crates/vector_core/src/flow.rs
//!
//! The view-flow router: a pure state machine mapping (current view, event)
//! to the next view, and owning the workout draft collected along the way.
//! It knows nothing about rendering.

use crate::domain::{Equipment, MuscleGroup, MuscleSelection, TimeOption};
use crate::generation::GENERIC_FAILURE_MESSAGE;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum View {
    Landing,
    Login,
    Dashboard,
    SetupEquipment,
    SetupMuscles,
    SetupTime,
    Generating,
    Session,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    SignInRequested,
    SignedIn,
    SignedOut,
    StartSetup,
    SelectEquipment(Equipment),
    ToggleMuscle(MuscleGroup),
    ConfirmMuscles,
    SelectDuration(TimeOption),
    Generate,
    GenerationSucceeded,
    GenerationFailed,
    SessionEnded,
    OpenHistory,
    Back,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("{event:?} is not allowed on the {view:?} view")]
    InvalidTransition { view: View, event: FlowEvent },

    #[error("Workout configuration is incomplete")]
    IncompleteDraft,
}

/// Configuration collected across the setup views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkoutDraft {
    pub equipment: Option<Equipment>,
    pub muscles: MuscleSelection,
    pub duration: Option<TimeOption>,
}

impl WorkoutDraft {
    /// The generation parameters, once every choice has been made.
    pub fn parameters(&self) -> Option<(Equipment, MuscleSelection, TimeOption)> {
        match (self.equipment, self.duration) {
            (Some(equipment), Some(duration)) if !self.muscles.is_empty() => {
                Some((equipment, self.muscles.clone(), duration))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlowRouter {
    view: View,
    draft: WorkoutDraft,
    last_error: Option<&'static str>,
}

impl Default for FlowRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowRouter {
    pub fn new() -> Self {
        Self {
            view: View::Landing,
            draft: WorkoutDraft::default(),
            last_error: None,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn draft(&self) -> &WorkoutDraft {
        &self.draft
    }

    /// The message to show on the dashboard after a failed generation.
    pub fn last_error(&self) -> Option<&'static str> {
        self.last_error
    }

    /// Applies `event` and returns the new view. The state is untouched on error.
    pub fn handle(&mut self, event: FlowEvent) -> Result<View, FlowError> {
        use FlowEvent as E;
        use View as V;

        let next = match (self.view, event) {
            (_, E::SignedOut) => {
                self.reset();
                V::Landing
            }
            (V::Landing, E::SignInRequested) => V::Login,
            (V::Landing | V::Login, E::SignedIn) => V::Dashboard,
            (V::Login, E::Back) => V::Landing,

            (V::Dashboard, E::StartSetup) => {
                self.reset();
                V::SetupEquipment
            }
            (V::Dashboard, E::OpenHistory) => V::History,
            (V::History, E::Back) => V::Dashboard,

            (V::SetupEquipment, E::SelectEquipment(equipment)) => {
                self.draft.equipment = Some(equipment);
                V::SetupMuscles
            }
            (V::SetupEquipment, E::Back) => V::Dashboard,

            (V::SetupMuscles, E::ToggleMuscle(muscle)) => {
                self.draft.muscles.toggle(muscle);
                V::SetupMuscles
            }
            (V::SetupMuscles, E::ConfirmMuscles) => {
                if self.draft.muscles.is_empty() {
                    return Err(FlowError::IncompleteDraft);
                }
                V::SetupTime
            }
            (V::SetupMuscles, E::Back) => V::SetupEquipment,

            (V::SetupTime, E::SelectDuration(duration)) => {
                self.draft.duration = Some(duration);
                V::SetupTime
            }
            (V::SetupTime, E::Generate) => {
                if self.draft.parameters().is_none() {
                    return Err(FlowError::IncompleteDraft);
                }
                self.last_error = None;
                V::Generating
            }
            (V::SetupTime, E::Back) => V::SetupMuscles,

            (V::Generating, E::GenerationSucceeded) => V::Session,
            (V::Generating, E::GenerationFailed) => {
                self.last_error = Some(GENERIC_FAILURE_MESSAGE);
                V::Dashboard
            }

            (V::Session, E::SessionEnded) => {
                self.reset();
                V::Dashboard
            }

            (view, event) => return Err(FlowError::InvalidTransition { view, event }),
        };

        self.view = next;
        Ok(next)
    }

    fn reset(&mut self) {
        self.draft = WorkoutDraft::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in() -> FlowRouter {
        let mut router = FlowRouter::new();
        router.handle(FlowEvent::SignInRequested).unwrap();
        router.handle(FlowEvent::SignedIn).unwrap();
        router
    }

    fn configured() -> FlowRouter {
        let mut router = signed_in();
        router.handle(FlowEvent::StartSetup).unwrap();
        router
            .handle(FlowEvent::SelectEquipment(Equipment::Dumbbells))
            .unwrap();
        router
            .handle(FlowEvent::ToggleMuscle(MuscleGroup::Chest))
            .unwrap();
        router.handle(FlowEvent::ConfirmMuscles).unwrap();
        router
            .handle(FlowEvent::SelectDuration(TimeOption::Thirty))
            .unwrap();
        router
    }

    #[test]
    fn test_happy_path_reaches_session() {
        let mut router = configured();
        assert_eq!(router.handle(FlowEvent::Generate), Ok(View::Generating));
        let (equipment, muscles, time) = router.draft().parameters().unwrap();
        assert_eq!(equipment, Equipment::Dumbbells);
        assert!(muscles.contains(MuscleGroup::Chest));
        assert_eq!(time, TimeOption::Thirty);

        assert_eq!(router.handle(FlowEvent::GenerationSucceeded), Ok(View::Session));
        assert_eq!(router.handle(FlowEvent::SessionEnded), Ok(View::Dashboard));
        assert_eq!(router.draft(), &WorkoutDraft::default());
    }

    #[test]
    fn test_confirm_requires_a_muscle() {
        let mut router = signed_in();
        router.handle(FlowEvent::StartSetup).unwrap();
        router
            .handle(FlowEvent::SelectEquipment(Equipment::Bodyweight))
            .unwrap();
        router
            .handle(FlowEvent::ToggleMuscle(MuscleGroup::Core))
            .unwrap();
        router
            .handle(FlowEvent::ToggleMuscle(MuscleGroup::Core))
            .unwrap();
        assert_eq!(
            router.handle(FlowEvent::ConfirmMuscles),
            Err(FlowError::IncompleteDraft)
        );
        assert_eq!(router.view(), View::SetupMuscles);
    }

    #[test]
    fn test_generate_requires_duration() {
        let mut router = signed_in();
        router.handle(FlowEvent::StartSetup).unwrap();
        router
            .handle(FlowEvent::SelectEquipment(Equipment::FullGym))
            .unwrap();
        router
            .handle(FlowEvent::ToggleMuscle(MuscleGroup::Back))
            .unwrap();
        router.handle(FlowEvent::ConfirmMuscles).unwrap();
        assert_eq!(
            router.handle(FlowEvent::Generate),
            Err(FlowError::IncompleteDraft)
        );
    }

    #[test]
    fn test_generation_failure_returns_to_dashboard_with_message() {
        let mut router = configured();
        router.handle(FlowEvent::Generate).unwrap();
        assert_eq!(router.handle(FlowEvent::GenerationFailed), Ok(View::Dashboard));
        assert_eq!(router.last_error(), Some(GENERIC_FAILURE_MESSAGE));
    }

    #[test]
    fn test_back_walks_the_setup_in_reverse() {
        let mut router = configured();
        assert_eq!(router.handle(FlowEvent::Back), Ok(View::SetupMuscles));
        assert_eq!(router.handle(FlowEvent::Back), Ok(View::SetupEquipment));
        assert_eq!(router.handle(FlowEvent::Back), Ok(View::Dashboard));
    }

    #[test]
    fn test_sign_out_from_anywhere_resets() {
        let mut router = configured();
        assert_eq!(router.handle(FlowEvent::SignedOut), Ok(View::Landing));
        assert_eq!(router.draft(), &WorkoutDraft::default());
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut router = FlowRouter::new();
        assert_eq!(
            router.handle(FlowEvent::Generate),
            Err(FlowError::InvalidTransition {
                view: View::Landing,
                event: FlowEvent::Generate,
            })
        );
        assert_eq!(router.view(), View::Landing);
    }
}
