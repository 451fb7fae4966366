//! Sync2 Server
//!
//! Synchronizes clinical records between a child instance and its parent:
//! envelope-wrapped push/pull between peers, conflict detection on normalized
//! representations and an operator workflow for resolving conflicts, all
//! recorded in an audit trail.

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
pub mod sync;
