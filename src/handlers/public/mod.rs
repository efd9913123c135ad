// handlers/public/mod.rs - Handlers reachable without a session
//
// Pages, health, and the session lifecycle endpoints that create or destroy
// the session cookie.
pub mod dev;
pub mod pages;
pub mod session;
