//! media-vault: storage policy and object lifecycle in front of an S3 bucket.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
