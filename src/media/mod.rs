pub mod mimetype;
pub mod organizer;
pub mod report;
