use std::fmt;

/// Failure modes of the admin store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// Connection pool is exhausted
    PoolExhausted,
    /// Record not found
    NotFound { entity: String, id: String },
    /// Unique constraint violation, e.g. a payment intent id already linked to another order
    UniqueConstraintViolation { constraint: String },
    /// Check constraint violation, e.g. an unknown status value
    CheckViolation { constraint: String },
    /// Query execution error
    QueryError { message: String },
    /// Database connection error
    ConnectionError { message: String },
    /// Stored row could not be decoded
    DecodeError { message: String },
    /// Configuration error
    ConfigError { message: String },
    /// Unknown error
    Unknown { message: String },
}

pub type DbResult<T> = Result<T, DatabaseError>;

#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub context: Option<String>,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Transient failures a caller could retry. Nothing in this service retries; the flag is logged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::PoolExhausted | DatabaseErrorKind::ConnectionError { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::NotFound { .. })
    }

    pub fn from_sqlx(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::new(DatabaseErrorKind::NotFound {
                entity: "Order".to_string(),
                id: "unknown".to_string(),
            }),
            sqlx::Error::PoolTimedOut => Self::new(DatabaseErrorKind::PoolExhausted),
            sqlx::Error::PoolClosed => Self::new(DatabaseErrorKind::ConnectionError {
                message: "Connection pool is closed".to_string(),
            }),
            sqlx::Error::Configuration(msg) => Self::new(DatabaseErrorKind::ConfigError {
                message: msg.to_string(),
            }),
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                match db_err.code().as_deref() {
                    Some("23505") => {
                        Self::new(DatabaseErrorKind::UniqueConstraintViolation { constraint })
                    }
                    Some("23514") => Self::new(DatabaseErrorKind::CheckViolation { constraint }),
                    _ => Self::new(DatabaseErrorKind::QueryError {
                        message: db_err.message().to_string(),
                    }),
                }
            }
            sqlx::Error::Io(io_err) => Self::new(DatabaseErrorKind::ConnectionError {
                message: io_err.to_string(),
            }),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(DatabaseErrorKind::DecodeError {
                    message: format!("column {}: {}", index, source),
                })
            }
            _ => Self::new(DatabaseErrorKind::Unknown {
                message: error.to_string(),
            }),
        }
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            DatabaseErrorKind::PoolExhausted => {
                "Database connection pool exhausted".to_string()
            }
            DatabaseErrorKind::NotFound { entity, id } => {
                format!("{} with ID '{}' not found", entity, id)
            }
            DatabaseErrorKind::UniqueConstraintViolation { constraint } => {
                format!("Unique constraint '{}' violated", constraint)
            }
            DatabaseErrorKind::CheckViolation { constraint } => {
                format!("Check constraint '{}' violated", constraint)
            }
            DatabaseErrorKind::QueryError { message } => {
                format!("Database query failed: {}", message)
            }
            DatabaseErrorKind::ConnectionError { message } => {
                format!("Database connection error: {}", message)
            }
            DatabaseErrorKind::DecodeError { message } => {
                format!("Failed to decode row: {}", message)
            }
            DatabaseErrorKind::ConfigError { message } => {
                format!("Database configuration error: {}", message)
            }
            DatabaseErrorKind::Unknown { message } => {
                format!("Unknown database error: {}", message)
            }
        };

        if let Some(context) = &self.context {
            write!(f, "{} ({})", message, context)
        } else {
            write!(f, "{}", message)
        }
    }
}

impl std::error::Error for DatabaseError {}
