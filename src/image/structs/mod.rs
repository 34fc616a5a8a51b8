pub mod generated_image;
pub mod image_request;
pub mod image_style;
