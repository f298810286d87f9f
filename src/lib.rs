//! Client for a Stable Diffusion text-to-image backend.
//!
//! [`GenerationController`] drives the generate workflow, [`Gallery`] browses stored
//! images, and [`HttpImageApi`] is the `reqwest` transport both sit on.

pub mod api;
pub mod config;
pub mod error;
pub mod gallery;
pub mod logger;
pub mod models;
pub mod workflow;

pub use api::{HttpImageApi, ImageApi};
pub use config::ClientConfig;
pub use error::{Result, SdError, ValidationError};
pub use gallery::{Gallery, GallerySource};
pub use models::*;
pub use workflow::{GenerationController, GenerationState};
