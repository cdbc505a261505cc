//! Shared client state.
//!
//! DESIGN
//! ======
//! One [`auth::AuthContext`] is built by the app shell and handed by `Arc` to
//! the route guard and to every page command, so there is a single source of
//! truth for "who is signed in" instead of each consumer fetching its own.

pub mod auth;

// =============================================================================
// TEST HELPERS
// =============================================================================
