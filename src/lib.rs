// src/lib.rs
//! Time-boxed single-choice polls.
//!
//! Admins create polls with a fixed option list and a closing deadline.
//! Users vote once per poll while it is open, and see the tally only after
//! it closes and only if they voted.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod routes;
pub mod store;
pub mod tally;
