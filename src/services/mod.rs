//! Storage policy and object lifecycle services.
//!
//! Pure policy (`catalog`, `transfer`, `validation`, `naming`,
//! `content_type`) sits below the I/O seams (`backend`, `record_store`).
//! `object_store` applies visibility rules on top of a backend, and
//! `lifecycle` drives save and delete across all of them.

pub mod backend;
pub mod catalog;
pub mod content_type;
pub mod lifecycle;
pub mod naming;
pub mod object_store;
pub mod record_store;
pub mod s3_backend;
pub mod transfer;
pub mod validation;
