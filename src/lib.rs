pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod storage;

// Reference-framework import: header normalization, value cleaning, record assembly
pub mod referentiel;

// Domain data shapes shared across layers
pub mod domain;

// Use cases orchestrating storage and the import pipeline
pub mod app;
