//! crates/vector_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the generative provider, the history store and the
//! identity backend.

use crate::domain::{SignedInUser, UserCredentials, WorkoutPlan};
use crate::plan_request::GenerationRequest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for storage and identity port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Item already exists: {0}")]
    AlreadyExists(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failures reported by a generative provider, classified for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider is temporarily overloaded or unavailable.
    #[error("Provider overloaded: {0}")]
    Overloaded(String),

    #[error("Provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Provider transport failure: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Only overload is worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Overloaded(_))
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Sends one structured-output request and returns the raw text payload, if any.
    async fn generate_content(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, ProviderError>;
}

#[async_trait]
pub trait HistoryGateway: Send + Sync {
    async fn insert(&self, user_id: Uuid, plan: &WorkoutPlan) -> PortResult<()>;

    /// Returns the user's plans, most recent first.
    async fn query_by_user(&self, user_id: Uuid) -> PortResult<Vec<WorkoutPlan>>;
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        avatar_url: Option<&str>,
        hashed_password: &str,
    ) -> PortResult<SignedInUser>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live auth session to its user; expired or unknown sessions are `Unauthorized`.
    async fn resolve_auth_session(&self, session_id: &str) -> PortResult<SignedInUser>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}
