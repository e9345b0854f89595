mod schema;
mod settings;
mod tags;
mod types;

pub use schema::Database;
pub use tags::{TagError, TagStore, DEFAULT_MOVIE_TAGS, DEFAULT_TV_TAGS, RESERVED_TAG};
pub use types::DatabaseError;
