//! crates/vector_core/src/generation.rs
//!
//! The generation pipeline: build the request, call the provider with bounded
//! retry on overload, then validate and decode the structured payload into a
//! `WorkoutPlan`.

use crate::domain::{Equipment, Exercise, MuscleSelection, TimeOption, WorkoutPlan};
use crate::plan_request::{GenerationRequest, PlanRequestBuilder, RequestError};
use crate::ports::{GenerationProvider, ProviderError};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Shown to the user for every generation failure.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Workout generation failed. Check your connection and try again.";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);

/// Errors surfaced by `GenerationClient::generate`. Each kind is distinguishable.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// No provider credential is configured. Never retried.
    #[error("Generation is not configured: {0}")]
    Configuration(String),

    /// The provider stayed overloaded for every attempt.
    #[error("Provider still overloaded after {attempts} attempts: {message}")]
    TransientProvider { attempts: u32, message: String },

    #[error("Provider returned a malformed workout: {0}")]
    MalformedResponse(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    /// A non-retryable provider failure.
    #[error("Provider call failed: {0}")]
    Provider(ProviderError),

    #[error("Invalid generation request: {0}")]
    InvalidRequest(#[from] RequestError),
}

impl GenerationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerationError::InvalidRequest(RequestError::NoMuscleGroups) => {
                "Select at least one muscle group."
            }
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}

/// Attempt bound and first backoff delay. The delay doubles after every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

//=========================================================================================
// Wire Payload
//=========================================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedWorkout {
    exercises: Vec<Exercise>,
    estimated_calories: u32,
}

//=========================================================================================
// The Client
//=========================================================================================

#[derive(Clone)]
pub struct GenerationClient {
    provider: Option<Arc<dyn GenerationProvider>>,
    builder: PlanRequestBuilder,
    retry: RetryPolicy,
}

impl GenerationClient {
    /// Creates a client. `provider` is `None` when no credential is configured.
    pub fn new(provider: Option<Arc<dyn GenerationProvider>>, builder: PlanRequestBuilder) -> Self {
        Self {
            provider,
            builder,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn generate(
        &self,
        equipment: Equipment,
        muscles: &MuscleSelection,
        time: TimeOption,
    ) -> Result<WorkoutPlan, GenerationError> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            GenerationError::Configuration("no provider credential available".to_string())
        })?;
        let request = self.builder.build(equipment, muscles, time)?;

        info!(%equipment, %muscles, minutes = time.minutes(), "Requesting workout generation.");
        let text = self.call_with_retry(provider.as_ref(), &request).await?;
        let generated = decode_payload(text, &request)?;

        let plan = WorkoutPlan {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            muscle_groups: muscles.clone(),
            equipment,
            duration_minutes: time,
            exercises: generated.exercises,
            estimated_calories: generated.estimated_calories,
        };

        let work = self.builder.volume_policy().work_seconds_per_set();
        if !plan.fits_window(work) {
            warn!(
                plan_id = %plan.id,
                estimated_seconds = plan.estimated_seconds(work),
                window_seconds = time.seconds(),
                "Generated workout exceeds its time window."
            );
        }
        info!(plan_id = %plan.id, exercises = plan.exercises.len(), "Workout generated.");
        Ok(plan)
    }

    async fn call_with_retry(
        &self,
        provider: &dyn GenerationProvider,
        request: &GenerationRequest,
    ) -> Result<Option<String>, GenerationError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut delay = self.retry.base_delay;
        let mut attempt = 1;

        loop {
            debug!(attempt, "Calling generation provider.");
            match provider.generate_content(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        error = %e,
                        "Provider overloaded. Retrying."
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    error!(attempts = attempt, error = %e, "Provider overloaded on every attempt.");
                    return Err(GenerationError::TransientProvider {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    error!(attempt, error = %e, "Provider call failed.");
                    return Err(GenerationError::Provider(e));
                }
            }
        }
    }
}

fn decode_payload(
    text: Option<String>,
    request: &GenerationRequest,
) -> Result<GeneratedWorkout, GenerationError> {
    let text = text
        .filter(|t| !t.trim().is_empty())
        .ok_or(GenerationError::EmptyResponse)?;

    let value: serde_json::Value = serde_json::from_str(text.trim())
        .map_err(|e| GenerationError::MalformedResponse(format!("invalid JSON: {e}")))?;
    request
        .response_schema
        .validate(&value)
        .map_err(|v| GenerationError::MalformedResponse(v.to_string()))?;
    let generated: GeneratedWorkout = serde_json::from_value(value)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    if generated.exercises.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "workout contains no exercises".to_string(),
        ));
    }
    if let Some((i, _)) = generated
        .exercises
        .iter()
        .enumerate()
        .find(|(_, e)| e.sets == 0 || e.name.trim().is_empty())
    {
        return Err(GenerationError::MalformedResponse(format!(
            "exercise {i} needs a name and at least one set"
        )));
    }
    Ok(generated)
}
