//! Networking for the calculator backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` owns the authenticated HTTP pipeline, `calculator` adds the
//! calculator/history endpoints on top of it, `csrf` holds the anti-forgery
//! token, and `types` defines the wire schema and errors.

pub mod api;
pub mod calculator;
pub mod csrf;
pub mod types;

#[cfg(test)]
pub(crate) mod test_backend;
