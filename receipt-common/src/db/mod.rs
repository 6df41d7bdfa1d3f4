use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use std::fmt;
use std::time::Duration;

pub mod category;
pub mod receipt;

pub type DbThreadPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub fn create_db_thread_pool(
    database_uri: &str,
    max_connections: u32,
    idle_timeout: Duration,
) -> Result<DbThreadPool, r2d2::Error> {
    let manager = ConnectionManager::<PgConnection>::new(database_uri);
    r2d2::Pool::builder()
        .max_size(max_connections)
        .idle_timeout(Some(idle_timeout))
        .build(manager)
}

#[derive(Debug)]
pub enum DaoError {
    DbThreadPoolFailure(r2d2::Error),
    QueryFailure(diesel::result::Error),
    CannotRunQuery(&'static str),
}

impl DaoError {
    /// True when the underlying failure was a violated uniqueness
    /// constraint, e.g. a concurrent insert of the same content hash.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            DaoError::QueryFailure(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ))
        )
    }
}

impl std::error::Error for DaoError {}

impl fmt::Display for DaoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaoError::DbThreadPoolFailure(e) => {
                write!(f, "DaoError: Failed to obtain DB connection: {e}")
            }
            DaoError::QueryFailure(e) => {
                write!(f, "DaoError: Query failed: {e}")
            }
            DaoError::CannotRunQuery(msg) => {
                write!(f, "DaoError: Cannot run query: {msg}")
            }
        }
    }
}

impl From<r2d2::Error> for DaoError {
    fn from(error: r2d2::Error) -> Self {
        DaoError::DbThreadPoolFailure(error)
    }
}

impl From<diesel::result::Error> for DaoError {
    fn from(error: diesel::result::Error) -> Self {
        DaoError::QueryFailure(error)
    }
}
