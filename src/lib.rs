//! Data orchestration core for genomic association plots.
//!
//! A [`registry::DataSources`] maps namespaces to adapters. A
//! [`requester::Requester`] routes a flat field list (`assoc:position`,
//! `ld:correlation`, ...) to those adapters, runs them in request order and
//! returns one [`chain::Chain`] with the joined records.

pub mod adapters;
pub mod cache;
pub mod chain;
pub mod config;
pub mod control;
pub mod domain;
pub mod error;
pub mod fields;
pub mod join;
pub mod output;
pub mod record;
pub mod registry;
pub mod requester;
pub mod transport;
