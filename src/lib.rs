//! Post Sweeper: bulk deletion of a user's posts with cancellable jobs.

pub mod auth;
pub mod config;
pub mod error;
pub mod jobs;
pub mod platform;
pub mod routes;
