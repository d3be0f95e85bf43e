pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("User password error: {0}")]
    UserPasswordError(#[from] argon2::password_hash::Error),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Record is locked: {0}")]
    Locked(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("Unknown sort order: {0}")]
    UnknownSort(String),
}

impl Error {
    /// Translates constraint violations on write into domain errors.
    ///
    /// `entity` is the record being written (unique violation), `referenced`
    /// is the record it points to (foreign key violation).
    pub(crate) fn from_write(err: sqlx::Error, entity: &str, referenced: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Error::AlreadyExists(entity.to_string());
            }
            if db_err.is_foreign_key_violation() {
                return Error::RecordNotFound(referenced.to_string());
            }
        }
        Error::DatabaseError(err)
    }
}
