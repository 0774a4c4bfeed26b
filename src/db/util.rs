use sqlx::postgres::PgPool;
use tracing::debug;

/// Log how many pool connections are idle and in use before an operation
pub fn log_pool_state(pool: &PgPool, action: &str, code: &str) {
    let pool_idle = pool.num_idle() as u32;
    let pool_size = pool.size();
    debug!(
        "{} for room {}. Pool connections: {} idle, {} in use",
        action,
        code,
        pool_idle,
        pool_size.saturating_sub(pool_idle)
    );
}
