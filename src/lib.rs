//! Native client for the calculator backend.
//!
//! Guarded in-app navigation ([`router`]), a CSRF- and session-aware HTTP
//! client ([`net`]), one shared auth context ([`state`]), and the app shell
//! tying them together ([`app`]).

pub mod app;
pub mod config;
pub mod net;
pub mod router;
pub mod state;
pub mod storage;
