//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::history::HistoryLedger;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use vector_core::domain::WorkoutPlan;
use vector_core::generation::GenerationClient;
use vector_core::ports::IdentityService;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentityService>,
    pub history: Arc<HistoryLedger>,
    pub generator: Arc<GenerationClient>,
    /// The last generated plan of each user, waiting for a session to claim it.
    pub pending_plans: Arc<Mutex<HashMap<Uuid, Arc<WorkoutPlan>>>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        identity: Arc<dyn IdentityService>,
        history: Arc<HistoryLedger>,
        generator: Arc<GenerationClient>,
    ) -> Self {
        Self {
            config,
            identity,
            history,
            generator,
            pending_plans: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Parks a freshly generated plan, replacing any older one for the user.
    pub async fn park_plan(&self, user_id: Uuid, plan: Arc<WorkoutPlan>) {
        self.pending_plans.lock().await.insert(user_id, plan);
    }

    /// Takes the user's pending plan if its id matches.
    pub async fn claim_plan(&self, user_id: Uuid, plan_id: Uuid) -> Option<Arc<WorkoutPlan>> {
        let mut pending = self.pending_plans.lock().await;
        match pending.get(&user_id) {
            Some(plan) if plan.id == plan_id => pending.remove(&user_id),
            _ => None,
        }
    }
}
