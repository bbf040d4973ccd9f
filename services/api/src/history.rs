//! services/api/src/history.rs
//!
//! The per-process workout ledger. The `HistoryGateway` is written to in the
//! background and read from when listing. The local list holds only plans the
//! gateway has not confirmed, so it stays small for a long-running process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use vector_core::domain::WorkoutPlan;
use vector_core::ports::HistoryGateway;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("Refusing to record a workout with no exercises")]
    EmptyPlan,
}

pub struct HistoryLedger {
    gateway: Arc<dyn HistoryGateway>,
    local: Arc<RwLock<HashMap<Uuid, Vec<WorkoutPlan>>>>,
}

impl HistoryLedger {
    pub fn new(gateway: Arc<dyn HistoryGateway>) -> Self {
        Self {
            gateway,
            local: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Records a completed plan locally and starts the remote insert.
    ///
    /// Returns the handle of the insert task, or `None` when there is no user
    /// to attribute the plan to. The local copy is dropped once the insert
    /// succeeds and kept when it fails.
    pub async fn record(
        &self,
        user_id: Option<Uuid>,
        plan: WorkoutPlan,
    ) -> Result<Option<JoinHandle<()>>, HistoryError> {
        if plan.exercises.is_empty() {
            return Err(HistoryError::EmptyPlan);
        }
        let Some(user_id) = user_id else {
            info!(plan_id = %plan.id, "No signed-in user; workout is not recorded.");
            return Ok(None);
        };

        self.local
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(0, plan.clone());

        let gateway = self.gateway.clone();
        let local = self.local.clone();
        let handle = tokio::spawn(async move {
            match gateway.insert(user_id, &plan).await {
                Ok(()) => {
                    info!(plan_id = %plan.id, %user_id, "Workout saved to history.");
                    let mut local = local.write().await;
                    if let Some(pending) = local.get_mut(&user_id) {
                        pending.retain(|p| p.id != plan.id);
                        if pending.is_empty() {
                            local.remove(&user_id);
                        }
                    }
                }
                Err(e) => warn!(plan_id = %plan.id, %user_id, "Failed to save workout: {}", e),
            }
        });
        Ok(Some(handle))
    }

    /// The user's workouts, most recent first.
    pub async fn list(&self, user_id: Uuid) -> Vec<WorkoutPlan> {
        let local = self
            .local
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default();

        let remote = match self.gateway.query_by_user(user_id).await {
            Ok(plans) => plans,
            Err(e) => {
                warn!(%user_id, "History query failed, serving the local ledger: {}", e);
                return local;
            }
        };

        let mut seen = HashSet::new();
        let mut merged: Vec<WorkoutPlan> = local
            .into_iter()
            .chain(remote)
            .filter(|plan| seen.insert(plan.id))
            .collect();
        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;
    use vector_core::domain::{Equipment, Exercise, MuscleGroup, TimeOption};
    use vector_core::ports::{PortError, PortResult};

    #[derive(Default)]
    struct StubGateway {
        stored: Mutex<Vec<(Uuid, WorkoutPlan)>>,
        fail_inserts: bool,
        fail_queries: bool,
    }

    #[async_trait]
    impl HistoryGateway for StubGateway {
        async fn insert(&self, user_id: Uuid, plan: &WorkoutPlan) -> PortResult<()> {
            if self.fail_inserts {
                return Err(PortError::Unexpected("write refused".to_string()));
            }
            self.stored.lock().unwrap().push((user_id, plan.clone()));
            Ok(())
        }

        async fn query_by_user(&self, user_id: Uuid) -> PortResult<Vec<WorkoutPlan>> {
            if self.fail_queries {
                return Err(PortError::Unexpected("read refused".to_string()));
            }
            let mut plans: Vec<WorkoutPlan> = self
                .stored
                .lock()
                .unwrap()
                .iter()
                .filter(|(owner, _)| *owner == user_id)
                .map(|(_, plan)| plan.clone())
                .collect();
            plans.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            Ok(plans)
        }
    }

    fn plan(minutes_ago: i64, exercises: usize) -> WorkoutPlan {
        WorkoutPlan {
            id: Uuid::new_v4(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            muscle_groups: vec![MuscleGroup::Legs].into(),
            equipment: Equipment::Bodyweight,
            duration_minutes: TimeOption::Fifteen,
            exercises: (0..exercises)
                .map(|i| Exercise {
                    name: format!("Squat {}", i),
                    sets: 3,
                    reps_or_duration: "12".to_string(),
                    rest_seconds: 30,
                    form_guidance: "Knees track over toes.".to_string(),
                    equipment: "Bodyweight".to_string(),
                    visual_tag: None,
                })
                .collect(),
            estimated_calories: 90,
        }
    }

    #[tokio::test]
    async fn test_record_then_list_newest_first() {
        let gateway = Arc::new(StubGateway::default());
        let ledger = HistoryLedger::new(gateway.clone());
        let user = Uuid::new_v4();

        let older = plan(30, 2);
        let newer = plan(5, 3);
        for p in [older.clone(), newer.clone()] {
            let handle = ledger.record(Some(user), p).await.unwrap().unwrap();
            handle.await.unwrap();
        }

        let listed = ledger.list(user).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
        assert_eq!(gateway.stored.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_insert_keeps_local_copy() {
        let gateway = Arc::new(StubGateway {
            fail_inserts: true,
            ..Default::default()
        });
        let ledger = HistoryLedger::new(gateway);
        let user = Uuid::new_v4();
        let p = plan(1, 1);

        ledger.record(Some(user), p.clone()).await.unwrap().unwrap().await.unwrap();
        assert_eq!(ledger.list(user).await, vec![p]);
        assert_eq!(ledger.local.read().await.get(&user).map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_saved_plans_leave_the_local_ledger() {
        let gateway = Arc::new(StubGateway::default());
        let ledger = HistoryLedger::new(gateway.clone());
        let user = Uuid::new_v4();

        let mut recorded = Vec::new();
        for minutes_ago in (0..20).rev() {
            let p = plan(minutes_ago, 1);
            recorded.push(p.id);
            ledger.record(Some(user), p).await.unwrap().unwrap().await.unwrap();
        }

        assert!(ledger.local.read().await.is_empty());
        let listed: Vec<Uuid> = ledger.list(user).await.iter().map(|p| p.id).collect();
        recorded.reverse();
        assert_eq!(listed, recorded);
    }

    #[tokio::test]
    async fn test_query_failure_falls_back_to_local() {
        let gateway = Arc::new(StubGateway {
            fail_inserts: true,
            fail_queries: true,
            ..Default::default()
        });
        let ledger = HistoryLedger::new(gateway);
        let user = Uuid::new_v4();
        let p = plan(1, 2);

        ledger.record(Some(user), p.clone()).await.unwrap().unwrap().await.unwrap();
        assert_eq!(ledger.list(user).await, vec![p]);
    }

    #[tokio::test]
    async fn test_remote_records_merge_without_duplicates() {
        let gateway = Arc::new(StubGateway::default());
        let user = Uuid::new_v4();
        let from_earlier_process = plan(120, 2);
        gateway
            .stored
            .lock()
            .unwrap()
            .push((user, from_earlier_process.clone()));

        let ledger = HistoryLedger::new(gateway);
        let fresh = plan(0, 2);
        ledger.record(Some(user), fresh.clone()).await.unwrap().unwrap().await.unwrap();

        let ids: Vec<Uuid> = ledger.list(user).await.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![fresh.id, from_earlier_process.id]);
    }

    #[tokio::test]
    async fn test_empty_plan_is_rejected() {
        let ledger = HistoryLedger::new(Arc::new(StubGateway::default()));
        let result = ledger.record(Some(Uuid::new_v4()), plan(0, 0)).await;
        assert_eq!(result.err(), Some(HistoryError::EmptyPlan));
    }

    #[tokio::test]
    async fn test_without_user_nothing_is_written() {
        let gateway = Arc::new(StubGateway::default());
        let ledger = HistoryLedger::new(gateway.clone());
        assert!(ledger.record(None, plan(0, 2)).await.unwrap().is_none());
        assert!(gateway.stored.lock().unwrap().is_empty());
    }
}
