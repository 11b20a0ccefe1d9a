/// Middleware for the API server
///
/// - `security`: Cache and security headers on every response

pub mod security;
