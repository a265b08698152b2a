//! Balance reconciliation and statement scheduling for a current-account
//! ledger.
//!
//! Keeps each account's versioned balance snapshot caught up with the
//! append-only transaction ledger, and selects statement schedules that are
//! due for generation.

pub mod action_lookup;
pub mod audit;
pub mod balance_writer;
pub mod collaborator;
pub mod config;
pub mod demo;
pub mod engine;
pub mod error;
pub mod event;
pub mod reconciliation_selector;
pub mod rng;
pub mod statement_selector;
pub mod store;
pub mod types;
