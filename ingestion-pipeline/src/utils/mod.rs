pub mod image_labels;
pub mod text_extraction;
pub mod thumbnail;
