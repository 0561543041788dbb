use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use crate::sampletable::SampleRecord;

/// Everything that can go wrong while registering runs, samples and annotations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed or semantically invalid input data. Raised before any write.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A run or sample accession that does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness or existence-state invariant would be violated.
    #[error("{0}")]
    Conflict(String),

    /// Table records that could not be matched to a registered sample.
    #[error("Not accessioned in run {run_accession}: {}", describe_records(.records))]
    Unresolved {
        run_accession: i32,
        records: Vec<SampleRecord>,
    },

    #[error("database error: {0}")]
    Storage(DieselError),

    #[error("could not connect to database: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// True for errors caused by the caller's input, false for failures of the
    /// underlying store.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            RegistryError::Storage(_) | RegistryError::Connection(_)
        )
    }
}

// The store's constraints have the last word on uniqueness, so constraint
// violations surface as the same kinds the pre-checks raise.
impl From<DieselError> for RegistryError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                if is_accession_key(info.message()) {
                    RegistryError::Conflict(format!(
                        "accession taken by a concurrent registration, safe to retry: {}",
                        info.message()
                    ))
                } else {
                    RegistryError::Conflict(format!("already registered: {}", info.message()))
                }
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                RegistryError::NotFound(format!("referenced record does not exist: {}", info.message()))
            }
            DieselError::NotFound => RegistryError::NotFound(String::from("record not found")),
            e => RegistryError::Storage(e),
        }
    }
}

// SQLite names the columns of the violated constraint, e.g.
// "UNIQUE constraint failed: runs.run_accession"
fn is_accession_key(message: &str) -> bool {
    let columns = message.rsplit(": ").next().unwrap_or("");
    columns == "runs.run_accession" || columns == "samples.sample_accession"
}

fn describe_records(records: &[SampleRecord]) -> String {
    records
        .iter()
        .map(|r| {
            let (name, barcode) = r.core_info();
            format!("{} ({})", name, barcode)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, RegistryError>;
