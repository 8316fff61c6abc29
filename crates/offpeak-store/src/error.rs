use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("No scaling record for {namespace}/{resource_name} ({resource_kind})")]
    NotFound {
        namespace: String,
        resource_name: String,
        resource_kind: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
