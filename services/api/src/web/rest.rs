//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;
use vector_core::domain::{
    Equipment, Exercise, MuscleSelection, SignedInUser, TimeOption, WorkoutPlan,
};
use vector_core::generation::GenerationError;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_workout_handler,
        list_history_handler,
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::auth::me_handler,
    ),
    components(
        schemas(
            GenerateWorkoutRequest,
            WorkoutResponse,
            ExerciseResponse,
            SignupRequest,
            LoginRequest,
            AuthResponse,
        )
    ),
    tags(
        (name = "Vector API", description = "Workout generation, live sessions and history.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The choices that parameterise a generated workout.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWorkoutRequest {
    #[schema(value_type = String, example = "Dumbbells")]
    pub equipment: Equipment,
    #[schema(value_type = Vec<String>, example = json!(["Chest", "Arms"]))]
    pub muscle_groups: MuscleSelection,
    #[schema(value_type = u32, example = 30)]
    pub duration_minutes: TimeOption,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseResponse {
    pub name: String,
    pub sets: u32,
    pub reps_or_duration: String,
    pub rest_seconds: u32,
    pub form_guidance: String,
    pub equipment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_tag: Option<String>,
}

impl From<&Exercise> for ExerciseResponse {
    fn from(exercise: &Exercise) -> Self {
        Self {
            name: exercise.name.clone(),
            sets: exercise.sets,
            reps_or_duration: exercise.reps_or_duration.clone(),
            rest_seconds: exercise.rest_seconds,
            form_guidance: exercise.form_guidance.clone(),
            equipment: exercise.equipment.clone(),
            visual_tag: exercise.visual_tag.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub muscle_groups: Vec<String>,
    pub equipment: String,
    pub duration_minutes: u32,
    pub exercises: Vec<ExerciseResponse>,
    pub estimated_calories: u32,
}

impl From<&WorkoutPlan> for WorkoutResponse {
    fn from(plan: &WorkoutPlan) -> Self {
        Self {
            id: plan.id,
            timestamp: plan.timestamp,
            muscle_groups: plan
                .muscle_groups
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
            equipment: plan.equipment.as_str().to_string(),
            duration_minutes: plan.duration_minutes.minutes(),
            exercises: plan.exercises.iter().map(ExerciseResponse::from).collect(),
            estimated_calories: plan.estimated_calories,
        }
    }
}

/// The HTTP status for each generation failure.
pub fn generation_status(err: &GenerationError) -> StatusCode {
    match err {
        GenerationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        GenerationError::TransientProvider { .. } => StatusCode::SERVICE_UNAVAILABLE,
        GenerationError::MalformedResponse(_)
        | GenerationError::EmptyResponse
        | GenerationError::Provider(_) => StatusCode::BAD_GATEWAY,
        GenerationError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Generate a workout for the signed-in user.
///
/// The plan is parked as the user's pending plan; a WebSocket `init` with its
/// id starts the live session.
#[utoipa::path(
    post,
    path = "/workouts",
    request_body = GenerateWorkoutRequest,
    responses(
        (status = 201, description = "Workout generated", body = WorkoutResponse),
        (status = 400, description = "No muscle groups selected"),
        (status = 401, description = "Not signed in"),
        (status = 502, description = "The provider returned an unusable workout"),
        (status = 503, description = "The provider stayed overloaded"),
        (status = 500, description = "Generation is not configured")
    )
)]
pub async fn generate_workout_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<SignedInUser>,
    Json(req): Json<GenerateWorkoutRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let plan = app_state
        .generator
        .generate(req.equipment, &req.muscle_groups, req.duration_minutes)
        .await
        .map_err(|e| {
            let status = generation_status(&e);
            if status.is_server_error() {
                error!(user_id = %user.id, "Workout generation failed: {}", e);
            } else {
                warn!(user_id = %user.id, "Workout request rejected: {}", e);
            }
            (status, e.user_message().to_string())
        })?;

    info!(user_id = %user.id, plan_id = %plan.id, "Workout parked for a live session.");
    let response = WorkoutResponse::from(&plan);
    app_state.park_plan(user.id, Arc::new(plan)).await;
    Ok((StatusCode::CREATED, Json(response)))
}

/// List the signed-in user's completed workouts, most recent first.
#[utoipa::path(
    get,
    path = "/workouts/history",
    responses(
        (status = 200, description = "Completed workouts", body = [WorkoutResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<SignedInUser>,
) -> Json<Vec<WorkoutResponse>> {
    let plans = app_state.history.list(user.id).await;
    Json(plans.iter().map(WorkoutResponse::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vector_core::domain::MuscleGroup;
    use vector_core::plan_request::RequestError;
    use vector_core::ports::ProviderError;

    #[test]
    fn test_generation_status_mapping() {
        assert_eq!(
            generation_status(&GenerationError::InvalidRequest(RequestError::NoMuscleGroups)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            generation_status(&GenerationError::TransientProvider {
                attempts: 3,
                message: "overloaded".to_string()
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            generation_status(&GenerationError::EmptyResponse),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            generation_status(&GenerationError::Provider(ProviderError::Rejected {
                status: 400,
                message: "bad schema".to_string()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            generation_status(&GenerationError::Configuration("no key".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_request_body_parses() {
        let req: GenerateWorkoutRequest = serde_json::from_str(
            r#"{"equipment":"Full Gym","muscleGroups":["Back","Core"],"durationMinutes":45}"#,
        )
        .unwrap();
        assert_eq!(req.equipment, Equipment::FullGym);
        assert!(req.muscle_groups.contains(MuscleGroup::Core));
        assert_eq!(req.duration_minutes, TimeOption::FortyFive);

        assert!(serde_json::from_str::<GenerateWorkoutRequest>(
            r#"{"equipment":"Dumbbells","muscleGroups":["Back"],"durationMinutes":20}"#
        )
        .is_err());
    }

    #[test]
    fn test_workout_response_shape() {
        let plan = WorkoutPlan {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            muscle_groups: vec![MuscleGroup::Shoulders].into(),
            equipment: Equipment::Bodyweight,
            duration_minutes: TimeOption::Fifteen,
            exercises: vec![Exercise {
                name: "Pike Push-Up".to_string(),
                sets: 3,
                reps_or_duration: "8-10".to_string(),
                rest_seconds: 45,
                form_guidance: "Hips high.".to_string(),
                equipment: "Bodyweight".to_string(),
                visual_tag: None,
            }],
            estimated_calories: 70,
        };
        let value = serde_json::to_value(WorkoutResponse::from(&plan)).unwrap();
        assert_eq!(value["durationMinutes"], 15);
        assert_eq!(value["muscleGroups"][0], "Shoulders");
        assert_eq!(value["exercises"][0]["repsOrDuration"], "8-10");
        assert!(value["exercises"][0].get("visualTag").is_none());
    }
}
