// Public API for the reel-gen library

pub mod audio;
pub mod config;
pub mod errors;
pub mod image;
pub mod script;
pub mod storage;
pub mod trace;
pub mod utils;

// Re-export commonly used types
pub use audio::{
    normalizer::TextNormalizer, structs::synthesis_options::SynthesisOptions,
    synthesizer::AudioSynthesizer,
};
pub use config::Config;
pub use errors::{GenError, Result};
pub use image::generator::{BatchFailurePolicy, ImageGenerator, ImageOptions};
pub use script::{
    generator::{ScriptGenerator, ScriptOptions},
    structs::script_document::ScriptDocument,
};
pub use storage::ObjectStore;
pub use utils::{RetryPolicy, RetryVerdict};
