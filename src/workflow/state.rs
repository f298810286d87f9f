use crate::models::{GenerationRequest, GenerationResult};

/// Where the generation workflow currently is. Exactly one state is active.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    InFlight(GenerationRequest),
    Succeeded {
        request: GenerationRequest,
        result: GenerationResult,
    },
    Failed {
        request: GenerationRequest,
        message: String,
    },
}

impl GenerationState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, GenerationState::InFlight(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            GenerationState::Idle => "idle",
            GenerationState::InFlight(_) => "in-flight",
            GenerationState::Succeeded { .. } => "succeeded",
            GenerationState::Failed { .. } => "failed",
        }
    }

    /// The request behind the current attempt, if any.
    pub fn request(&self) -> Option<&GenerationRequest> {
        match self {
            GenerationState::Idle => None,
            GenerationState::InFlight(request)
            | GenerationState::Succeeded { request, .. }
            | GenerationState::Failed { request, .. } => Some(request),
        }
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        match self {
            GenerationState::Succeeded { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            GenerationState::Failed { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}
