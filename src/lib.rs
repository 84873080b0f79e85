//! Deploylock: branch-backed environment locks for comment-driven deployments.
//!
//! Locks are stored one per scope on branches of a shared repository (see
//! [`store`]). The [`coordinator`] acquires them, [`release`] deletes them,
//! and [`reconcile`] cleans up after closed pull requests.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod git;
pub mod lock;
pub mod reconcile;
pub mod release;
pub mod scope;
pub mod store;

#[cfg(test)]
mod test_support;
