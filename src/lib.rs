//! Carbongate - Graphite to Prometheus translation layer
//!
//! This library provides the shared translation kernel and the three
//! daemons that let a Graphite-speaking ecosystem (carbonapi dashboards,
//! carbon collection agents, Prometheus-dialect queries over dotted names)
//! run transparently on a Prometheus-compatible backend.

pub mod api;
pub mod backend;
pub mod carbonapi;
pub mod cli;
pub mod config;
pub mod logging;
pub mod mateql;
pub mod proxy;
pub mod relay;
pub mod translate;
