//! services/api/src/web/live_session.rs
//!
//! The state held by one WebSocket connection for one workout session. The
//! connection task is the only owner; client messages and clock ticks are both
//! applied here, one at a time.

use crate::history::HistoryLedger;
use crate::web::clocks::{spawn_clock, Clock};
use crate::web::protocol::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;
use vector_core::domain::WorkoutPlan;
use vector_core::session::SessionStateMachine;

pub struct LiveSession {
    machine: SessionStateMachine,
    user_id: Uuid,
    history: Arc<HistoryLedger>,
    ticks: mpsc::Sender<Clock>,
    /// Parent of every clock token; cancelling it stops all clocks.
    session_token: CancellationToken,
    rest_token: Option<CancellationToken>,
    rest_epoch: u64,
}

impl LiveSession {
    /// Creates the session and starts its mission clock.
    pub fn start(
        plan: Arc<WorkoutPlan>,
        user_id: Uuid,
        history: Arc<HistoryLedger>,
        ticks: mpsc::Sender<Clock>,
    ) -> Self {
        let session_token = CancellationToken::new();
        spawn_clock(Clock::Mission, ticks.clone(), session_token.child_token());
        Self {
            machine: SessionStateMachine::new(plan),
            user_id,
            history,
            ticks,
            session_token,
            rest_token: None,
            rest_epoch: 0,
        }
    }

    pub fn machine(&self) -> &SessionStateMachine {
        &self.machine
    }

    pub fn is_over(&self) -> bool {
        self.machine.status().is_terminal()
    }

    fn state(&self) -> ServerMessage {
        ServerMessage::State {
            snapshot: self.machine.snapshot(),
        }
    }

    /// Applies one client message and returns the messages to send back.
    pub async fn handle_client(&mut self, message: ClientMessage) -> Vec<ServerMessage> {
        let result = match message {
            ClientMessage::Init { .. } => {
                return vec![ServerMessage::error("Session is already initialized.")]
            }
            ClientMessage::ToggleExercise { index } => self
                .machine
                .toggle_exercise_complete(index)
                .map(|_| vec![self.state()]),
            ClientMessage::StartRest { seconds } => self.machine.start_rest(seconds).map(|_| {
                self.restart_rest_clock();
                vec![self.state()]
            }),
            ClientMessage::SkipRest => self.machine.skip_rest().map(|_| {
                self.stop_rest_clock();
                vec![self.state()]
            }),
            ClientMessage::TogglePause => self.machine.toggle_pause().map(|_| vec![self.state()]),
            ClientMessage::Finish => return self.finish().await,
            ClientMessage::Abort => self.machine.abort().map(|_| {
                self.stop_clocks();
                info!(user_id = %self.user_id, plan_id = %self.machine.plan().id, "Session aborted.");
                vec![ServerMessage::Aborted]
            }),
        };

        result.unwrap_or_else(|e| {
            warn!(user_id = %self.user_id, "Rejected session command: {}", e);
            vec![ServerMessage::error(e.to_string())]
        })
    }

    /// Applies one clock tick and returns the messages to send back.
    pub fn handle_tick(&mut self, clock: Clock) -> Vec<ServerMessage> {
        match clock {
            Clock::Mission => {
                if self.machine.tick_mission() {
                    vec![self.state()]
                } else {
                    Vec::new()
                }
            }
            Clock::Rest { epoch } if epoch == self.rest_epoch => {
                if self.machine.tick_rest() {
                    self.stop_rest_clock();
                    vec![ServerMessage::RestEnded, self.state()]
                } else if self.machine.is_resting() {
                    vec![self.state()]
                } else {
                    Vec::new()
                }
            }
            Clock::Rest { .. } => Vec::new(),
        }
    }

    /// Ends a session the client walked away from.
    pub fn disconnect(&mut self) {
        if self.machine.abort().is_ok() {
            info!(user_id = %self.user_id, "Client left mid-session; session aborted.");
        }
        self.stop_clocks();
    }

    async fn finish(&mut self) -> Vec<ServerMessage> {
        let plan = match self.machine.finish() {
            Ok(plan) => plan,
            Err(e) => {
                warn!(user_id = %self.user_id, "Rejected finish: {}", e);
                return vec![ServerMessage::error(e.to_string())];
            }
        };
        self.stop_clocks();
        info!(
            user_id = %self.user_id,
            plan_id = %plan.id,
            exercises = plan.exercises.len(),
            elapsed_seconds = self.machine.elapsed_seconds(),
            "Session finished."
        );

        if let Err(e) = self.history.record(Some(self.user_id), plan.clone()).await {
            warn!(user_id = %self.user_id, "Finished workout was not recorded: {}", e);
        }
        vec![ServerMessage::Finished { plan }]
    }

    fn restart_rest_clock(&mut self) {
        self.stop_rest_clock();
        if !self.machine.is_resting() {
            return;
        }
        self.rest_epoch += 1;
        let token = self.session_token.child_token();
        spawn_clock(
            Clock::Rest {
                epoch: self.rest_epoch,
            },
            self.ticks.clone(),
            token.clone(),
        );
        self.rest_token = Some(token);
    }

    fn stop_rest_clock(&mut self) {
        if let Some(token) = self.rest_token.take() {
            token.cancel();
        }
    }

    fn stop_clocks(&mut self) {
        self.rest_token = None;
        self.session_token.cancel();
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.session_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use vector_core::domain::{Equipment, Exercise, MuscleGroup, TimeOption};
    use vector_core::ports::{HistoryGateway, PortResult};
    use vector_core::session::SessionStatus;

    #[derive(Default)]
    struct RecordingGateway {
        inserted: Mutex<Vec<WorkoutPlan>>,
    }

    #[async_trait]
    impl HistoryGateway for RecordingGateway {
        async fn insert(&self, _user_id: Uuid, plan: &WorkoutPlan) -> PortResult<()> {
            self.inserted.lock().unwrap().push(plan.clone());
            Ok(())
        }

        async fn query_by_user(&self, _user_id: Uuid) -> PortResult<Vec<WorkoutPlan>> {
            Ok(self.inserted.lock().unwrap().clone())
        }
    }

    fn plan() -> Arc<WorkoutPlan> {
        let exercise = |name: &str| Exercise {
            name: name.to_string(),
            sets: 3,
            reps_or_duration: "10".to_string(),
            rest_seconds: 60,
            form_guidance: "Control the descent.".to_string(),
            equipment: "Dumbbells".to_string(),
            visual_tag: None,
        };
        Arc::new(WorkoutPlan {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            muscle_groups: vec![MuscleGroup::Chest].into(),
            equipment: Equipment::Dumbbells,
            duration_minutes: TimeOption::Thirty,
            exercises: vec![exercise("Floor Press"), exercise("Fly"), exercise("Pullover")],
            estimated_calories: 180,
        })
    }

    fn session() -> (LiveSession, Arc<HistoryLedger>, mpsc::Receiver<Clock>) {
        let ledger = Arc::new(HistoryLedger::new(Arc::new(RecordingGateway::default())));
        let (tx, rx) = mpsc::channel(16);
        let live = LiveSession::start(plan(), Uuid::new_v4(), ledger.clone(), tx);
        (live, ledger, rx)
    }

    #[tokio::test]
    async fn test_toggle_reports_state() {
        let (mut live, _, _rx) = session();
        let replies = live.handle_client(ClientMessage::ToggleExercise { index: 1 }).await;
        match replies.as_slice() {
            [ServerMessage::State { snapshot }] => assert_eq!(snapshot.completed_indices, vec![1]),
            other => panic!("unexpected replies: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_out_of_range_toggle_is_an_error_message() {
        let (mut live, _, _rx) = session();
        let replies = live.handle_client(ClientMessage::ToggleExercise { index: 9 }).await;
        assert!(matches!(replies.as_slice(), [ServerMessage::Error { .. }]));
        assert!(live.machine().completed_indices().is_empty());
    }

    #[tokio::test]
    async fn test_rest_countdown_ends_with_rest_ended() {
        let (mut live, _, _rx) = session();
        live.handle_client(ClientMessage::StartRest { seconds: 2 }).await;
        let epoch = live.rest_epoch;

        assert!(matches!(
            live.handle_tick(Clock::Rest { epoch }).as_slice(),
            [ServerMessage::State { .. }]
        ));
        assert!(matches!(
            live.handle_tick(Clock::Rest { epoch }).as_slice(),
            [ServerMessage::RestEnded, ServerMessage::State { .. }]
        ));
        assert!(!live.machine().is_resting());
        assert!(live.rest_token.is_none());
    }

    #[tokio::test]
    async fn test_stale_rest_ticks_are_ignored() {
        let (mut live, _, _rx) = session();
        live.handle_client(ClientMessage::StartRest { seconds: 30 }).await;
        let stale = live.rest_epoch;
        live.handle_client(ClientMessage::StartRest { seconds: 30 }).await;

        assert!(live.handle_tick(Clock::Rest { epoch: stale }).is_empty());
        assert_eq!(live.machine().rest_remaining_seconds(), 30);
    }

    #[tokio::test]
    async fn test_pause_stops_mission_ticks_only() {
        let (mut live, _, _rx) = session();
        live.handle_client(ClientMessage::StartRest { seconds: 10 }).await;
        live.handle_client(ClientMessage::TogglePause).await;
        let epoch = live.rest_epoch;

        assert!(live.handle_tick(Clock::Mission).is_empty());
        live.handle_tick(Clock::Rest { epoch });
        assert_eq!(live.machine().elapsed_seconds(), 0);
        assert_eq!(live.machine().rest_remaining_seconds(), 9);
    }

    #[tokio::test]
    async fn test_finish_records_completed_exercises() {
        let (mut live, ledger, _rx) = session();
        live.handle_client(ClientMessage::ToggleExercise { index: 0 }).await;
        live.handle_client(ClientMessage::ToggleExercise { index: 2 }).await;

        let replies = live.handle_client(ClientMessage::Finish).await;
        let finished = match replies.as_slice() {
            [ServerMessage::Finished { plan }] => plan.clone(),
            other => panic!("unexpected replies: {:?}", other),
        };
        let names: Vec<&str> = finished.exercises.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Floor Press", "Pullover"]);
        assert!(live.is_over());
        assert!(live.session_token.is_cancelled());
        assert_eq!(ledger.list(live.user_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_finish_without_progress_keeps_session_alive() {
        let (mut live, _, _rx) = session();
        let replies = live.handle_client(ClientMessage::Finish).await;
        assert!(matches!(replies.as_slice(), [ServerMessage::Error { .. }]));
        assert_eq!(live.machine().status(), SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_disconnect_aborts_without_recording() {
        let (mut live, ledger, _rx) = session();
        live.handle_client(ClientMessage::ToggleExercise { index: 0 }).await;
        live.disconnect();
        assert_eq!(live.machine().status(), SessionStatus::Aborted);
        assert!(ledger.list(live.user_id).await.is_empty());
    }
}
