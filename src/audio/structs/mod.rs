pub mod audio_result;
pub mod synthesis_options;
