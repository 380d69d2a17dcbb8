//! prediction-service: serves pre-trained models over HTTP.
//!
//! Clients post form-encoded variables to `/{model}/predict/` and receive the
//! prediction as plain text; classifiers also answer on
//! `/{model}/predict_proba/` with comma-separated class probabilities.
pub mod config;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod startup;
