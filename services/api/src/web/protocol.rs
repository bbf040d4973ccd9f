//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for a live workout session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vector_core::domain::WorkoutPlan;
use vector_core::session::SessionSnapshot;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Claims a generated plan and starts its session. This must be the first message.
    #[serde(rename_all = "camelCase")]
    Init { plan_id: Uuid },

    ToggleExercise { index: usize },

    StartRest { seconds: u32 },

    SkipRest,

    TogglePause,

    /// Ends the session and records the completed exercises.
    Finish,

    /// Ends the session without recording anything.
    Abort,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session and carries the full plan.
    SessionInitialized { plan: WorkoutPlan },

    /// The live state after any change, including each clock tick.
    State { snapshot: SessionSnapshot },

    /// The rest countdown reached zero.
    RestEnded,

    /// The session finished; `plan` holds only the completed exercises.
    Finished { plan: WorkoutPlan },

    Aborted,

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
