//! Apple Counter
//!
//! This library provides the core of the apple-counter service, which counts
//! apples in uploaded videos by sampling frames and running each sampled
//! frame through a hosted object-detection model. Videos are counted either
//! within a single blocking request or as background jobs polled for
//! progress.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
pub mod worker;
