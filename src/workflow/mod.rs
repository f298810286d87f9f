pub mod controller;
pub mod state;

pub use controller::GenerationController;
pub use state::GenerationState;
