pub mod domain;
pub mod flow;
pub mod generation;
pub mod plan_request;
pub mod ports;
pub mod session;

pub use domain::{
    DomainError, Equipment, Exercise, MuscleGroup, MuscleSelection, Prescription, SignedInUser,
    TimeOption, UserCredentials, WorkoutPlan,
};
pub use generation::{GenerationClient, GenerationError, RetryPolicy, GENERIC_FAILURE_MESSAGE};
pub use plan_request::{GenerationRequest, PlanRequestBuilder, RequestError, VolumePolicy};
pub use ports::{
    GenerationProvider, HistoryGateway, IdentityService, PortError, PortResult, ProviderError,
};
pub use session::{SessionError, SessionSnapshot, SessionStateMachine, SessionStatus};
