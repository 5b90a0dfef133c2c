// argus-config/src/lib.rs
// ============================================================================
// Module: Argus Config Library
// Description: Canonical runtime configuration model and validation.
// Purpose: Single source of truth for argus.toml semantics.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! `argus-config` defines the canonical configuration model for the Argus
//! pipeline: document-store connection and bulk-client tuning, object-store
//! settings for raw bundle artifacts, and pipeline run defaults. Loading is
//! strict and fail-closed; a config that does not parse or validate is
//! never silently patched over.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ArgusConfig;
pub use config::ConfigError;
pub use config::DocumentStoreConfig;
pub use config::ObjectStoreConfig;
pub use config::ObjectStoreProvider;
pub use config::RunConfig;
