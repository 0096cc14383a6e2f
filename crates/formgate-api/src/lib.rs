//! Formgate API: the public submission endpoint and its supporting plumbing.

pub mod alerts;
pub mod api_doc;
pub mod captcha;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod setup;
pub mod state;
pub mod telemetry;
pub mod utils;
