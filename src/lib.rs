//! # GlowUp
//!
//! A mood- and energy-aware personal kanban. Before work starts the user
//! checks in with how they feel; the board then adapts:
//!
//! - the WIP limit shrinks when the user is anxious or low on energy;
//! - the To Do column is ranked so urgent and energy-appropriate work floats up;
//! - after each completion a single next task is suggested;
//! - starting demanding work on low energy asks for confirmation first.
//!
//! The pure pieces ([`wip`], [`ranking`], [`board`]) take plain data and never
//! touch storage. [`app::App`] owns the state and routes every mutation, and
//! [`db`] persists snapshots as JSON.

pub mod app;
pub mod board;
pub mod checkin;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod onboarding;
pub mod ranking;
pub mod review;
pub mod settings;
pub mod task;
pub mod timer;
pub mod wip;

pub use app::{App, AppEvent, Outcome};
pub use error::{Error, Result};
