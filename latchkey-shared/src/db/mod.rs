/// Database layer for Latchkey
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health check and statement timeout
/// - `migrations`: Embedded migration runner
/// - Models are in the `models` module at crate root level

pub mod migrations;
pub mod pool;
