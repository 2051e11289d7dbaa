pub mod prompts;
pub mod schema_validator;
pub mod structured_generation;

pub use prompts::{PromptCatalog, PromptSpec};
pub use structured_generation::{invoke_typed, StructuredGeneration, StructuredGenerationClient};
