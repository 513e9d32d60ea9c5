pub mod cleaner;
pub mod entities;
pub mod export;
pub mod schema_mapper;
