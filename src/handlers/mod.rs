// handlers/mod.rs - Two-tier handler layout
//
// Public (no session) → Protected (session cookie verified by middleware,
// role checked in the handler)
pub mod public;
pub mod protected;
