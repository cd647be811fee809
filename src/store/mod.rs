//! Persistent store: chat settings and warn records in PostgreSQL.

/// Chat settings rows and field updates
pub mod settings;
/// Per-(chat, user) warn records
pub mod warnings;

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Compile-time discovered SQLx migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Shared database handle passed across handlers.
///
/// The pool is safe for concurrent use from every event-processing task.
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        MIGRATOR.run(&pool).await?;
        info!("Database connected, migrations applied.");
        Ok(Self { pool })
    }

    /// Create a database handle from an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Expose the underlying pool for query modules.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
