//! Sorted, sectioned record lists kept in step with a document store.

pub mod domain;
pub mod engine;
pub mod error;
pub mod runtime;
pub mod service;
pub mod types;
