use thiserror::Error;

/// Errors raised while applying or retracting a chain event.
#[derive(Error, Debug)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("missing dependency: {0}")]
    MissingDependency(String),

    #[error("duplicate {table} row for {transaction_hash}:{log_index}")]
    DuplicateKey {
        table: &'static str,
        transaction_hash: String,
        log_index: u64,
    },

    #[error("no {table} row for {transaction_hash}:{log_index}")]
    NotFound {
        table: &'static str,
        transaction_hash: String,
        log_index: u64,
    },

    #[error("retracting {amount} from crowdsourcer {crowdsourcer} would leave a negative stake (staked {staked})")]
    NegativeStake {
        crowdsourcer: String,
        staked: String,
        amount: String,
    },

    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    #[error("share settlement failed: {0}")]
    Settlement(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl Error {
    /// Whether the event stream should halt on this error.
    ///
    /// Only a retraction of a row that was never applied is tolerated; it
    /// leaves the store untouched.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::NotFound { .. })
    }

    /// Maps a unique-constraint violation on insert to [`Error::DuplicateKey`].
    pub(crate) fn on_insert(
        err: sqlx::Error,
        table: &'static str,
        transaction_hash: &str,
        log_index: u64,
    ) -> Self {
        let duplicate = err
            .as_database_error()
            .map(|db_err| db_err.is_unique_violation())
            .unwrap_or(false);
        if duplicate {
            Error::DuplicateKey {
                table,
                transaction_hash: transaction_hash.to_string(),
                log_index,
            }
        } else {
            Error::Store(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
