/// API route handlers
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, refresh and logout

pub mod auth;
pub mod health;
