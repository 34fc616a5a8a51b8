pub mod background_image;
pub mod scene;
pub mod scene_response;
pub mod script_document;
