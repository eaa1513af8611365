pub mod config;
pub mod error;
pub mod schema;

pub use config::Config;
pub use error::*;
pub use schema::{ColumnSpec, SqlType, TRIP_COLUMNS};
