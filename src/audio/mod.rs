pub mod chimege;
pub mod normalizer;
pub mod structs;
pub mod synthesizer;
