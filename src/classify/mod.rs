pub mod completion;
pub mod image;
pub mod taxonomy;
pub mod text;
