//! Request and Response models for the cache server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    validate_key, ExpireRequest, MgetRequest, MsetItem, MsetRequest, SetRequest, MAX_BATCH_SIZE,
};
pub use responses::{
    BatchResponse, DeleteResponse, ErrorResponse, ExistsResponse, ExpireResponse, GetResponse,
    HealthResponse, MgetResponse, SetResponse, StatsResponse,
};
