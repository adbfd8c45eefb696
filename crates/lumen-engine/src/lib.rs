pub mod client;
pub mod decode;
pub mod dryrun;
pub mod error;
pub mod export;
pub mod gemini;
pub mod studio;

pub use client::{ContentPart, ContentRequest, GenerativeModel, ModelResponse};
pub use decode::{DecodedImage, InputImage};
pub use dryrun::DryrunModel;
pub use error::StudioError;
pub use gemini::GeminiClient;
pub use studio::{GenerationOutcome, Studio};
