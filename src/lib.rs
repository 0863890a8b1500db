//! Compliance case approval workflow engine.
//!
//! Tracks client onboarding jobs through the KYC and BRA approval pipelines:
//! a three-stage review sequence (LMRO -> DLMRO -> CEO), each stage gated by
//! a capability check and a freshly uploaded supporting document, with the
//! job timeline and notification fan-out updated on every transition.

pub mod actor;
pub mod approval;
pub mod blob;
pub mod config;
pub mod document;
pub mod error;
pub mod job;
pub mod notify;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;
