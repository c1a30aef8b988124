use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Builds the Postgres pool the storage adapter runs on. Lazy connect so
/// construction never blocks startup; the first query surfaces failures.
pub async fn build_pg_pool(config: &AppConfig) -> AppResult<PgPool> {
    let database_url = config.database_url.as_deref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_pool_max_connections)
        .min_connections(config.db_pool_min_connections)
        .acquire_timeout(Duration::from_secs(config.db_pool_acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.db_pool_idle_timeout_seconds))
        .connect_lazy(database_url)
        .map_err(|error| {
            tracing::error!(db_error = %error, "Could not build database pool");
            AppError::Dependency("Database pool construction failed.".to_string())
        })?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::build_pg_pool;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn missing_database_url_is_a_dependency_error() {
        let config = AppConfig {
            app_name: "test".to_string(),
            environment: "test".to_string(),
            database_url: None,
            db_pool_max_connections: 1,
            db_pool_min_connections: 0,
            db_pool_acquire_timeout_seconds: 1,
            db_pool_idle_timeout_seconds: 1,
            default_currency: "USD".to_string(),
        };
        let error = build_pg_pool(&config).await.unwrap_err();
        assert_eq!(error.kind(), "dependency");
    }
}
