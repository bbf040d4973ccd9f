//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `HistoryGateway` and `IdentityService` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use vector_core::domain::{
    Equipment, Exercise, MuscleGroup, MuscleSelection, SignedInUser, TimeOption, UserCredentials,
    WorkoutPlan,
};
use vector_core::ports::{HistoryGateway, IdentityService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage and identity ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Postgres `INTEGER` columns are signed; values past `i32::MAX` are refused.
fn db_int(value: u32, column: &str) -> PortResult<i32> {
    i32::try_from(value).map_err(|_| {
        PortError::Unexpected(format!("{column} value {value} does not fit the column"))
    })
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    display_name: String,
    avatar_url: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> SignedInUser {
        SignedInUser {
            id: self.user_id,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    display_name: String,
    avatar_url: Option<String>,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user: SignedInUser {
                id: self.user_id,
                display_name: self.display_name,
                avatar_url: self.avatar_url,
            },
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct WorkoutRecord {
    id: Uuid,
    muscle_groups: Vec<String>,
    equipment: String,
    duration_minutes: i32,
    exercises: Json<Vec<Exercise>>,
    estimated_calories: i32,
    created_at: DateTime<Utc>,
}
impl WorkoutRecord {
    fn to_domain(self) -> PortResult<WorkoutPlan> {
        let corrupt = |e: String| PortError::Unexpected(format!("Workout {} is corrupt: {}", self.id, e));

        let muscle_groups = self
            .muscle_groups
            .iter()
            .map(|m| m.parse::<MuscleGroup>())
            .collect::<Result<MuscleSelection, _>>()
            .map_err(|e| corrupt(e.to_string()))?;
        let equipment = self
            .equipment
            .parse::<Equipment>()
            .map_err(|e| corrupt(e.to_string()))?;
        let duration_minutes = u32::try_from(self.duration_minutes)
            .map_err(|e| corrupt(e.to_string()))
            .and_then(|m| TimeOption::try_from(m).map_err(|e| corrupt(e.to_string())))?;
        let estimated_calories =
            u32::try_from(self.estimated_calories).map_err(|e| corrupt(e.to_string()))?;

        Ok(WorkoutPlan {
            id: self.id,
            timestamp: self.created_at,
            muscle_groups,
            equipment,
            duration_minutes,
            exercises: self.exercises.0,
            estimated_calories,
        })
    }
}

//=========================================================================================
// `HistoryGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl HistoryGateway for DbAdapter {
    async fn insert(&self, user_id: Uuid, plan: &WorkoutPlan) -> PortResult<()> {
        let muscle_groups: Vec<String> = plan
            .muscle_groups
            .iter()
            .map(|m| m.as_str().to_string())
            .collect();
        let estimated_calories = db_int(plan.estimated_calories, "estimated_calories")?;

        sqlx::query(
            "INSERT INTO workouts (id, user_id, muscle_groups, equipment, duration_minutes, exercises, estimated_calories, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) ON CONFLICT (id) DO NOTHING",
        )
        .bind(plan.id)
        .bind(user_id)
        .bind(muscle_groups)
        .bind(plan.equipment.as_str())
        .bind(plan.duration_minutes.minutes() as i32)
        .bind(Json(&plan.exercises))
        .bind(estimated_calories)
        .bind(plan.timestamp)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn query_by_user(&self, user_id: Uuid) -> PortResult<Vec<WorkoutPlan>> {
        let records = sqlx::query_as::<_, WorkoutRecord>(
            "SELECT id, muscle_groups, equipment, duration_minutes, exercises, estimated_calories, created_at \
             FROM workouts WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for DbAdapter {
    async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        avatar_url: Option<&str>,
        hashed_password: &str,
    ) -> PortResult<SignedInUser> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, display_name, avatar_url, hashed_password) \
             VALUES ($1, $2, $3, $4, $5) RETURNING user_id, display_name, avatar_url",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(display_name)
        .bind(avatar_url)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::AlreadyExists(format!("User {} already exists", email))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, display_name, avatar_url, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn resolve_auth_session(&self, session_id: &str) -> PortResult<SignedInUser> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT u.user_id, u.display_name, u.avatar_url FROM auth_sessions s \
             JOIN users u ON u.user_id = s.user_id WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(UserRecord::to_domain).ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
