//! Compliance verification engine for messaging-campaign submissions.
//!
//! The [`verification`] module holds the orchestration engine and its collaborators;
//! [`config`], [`error`] and [`telemetry`] carry the service plumbing shared with the
//! `campaign-verify-api` binary.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod verification;
