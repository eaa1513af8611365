use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid table name '{0}': expected a lowercase SQL identifier")]
    InvalidTableName(String),

    #[error("invalid config value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },
}
