//! AI-backed project generation: a rate-limited client for the hosted
//! generation endpoint and the prompt/parse loop on top of it.

pub mod client;
pub mod gate;
pub mod generate;

pub use client::{AiClient, AiConfig};
pub use gate::{DEFAULT_MIN_INTERVAL, RequestGate};
pub use generate::{GeneratedProject, ProjectGenerator, parse_generated_project};
