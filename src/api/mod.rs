//! API Module
//!
//! HTTP handlers, routing and the rate-limit gate for the cache server.
//!
//! # Endpoints
//! - `PUT /set` - Store a JSON value
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `GET /exists/:key` - Check whether a key is cached
//! - `PUT /expire/:key` - Reset a key's TTL
//! - `POST /mget` / `POST /mset` - Batch read and write
//! - `DELETE /flush` - Clear every key
//! - `GET /stats` - Cache statistics
//! - `GET /performance` - Query performance report
//! - `GET /health` - Health check, never rate limited

pub mod handlers;
pub mod rate_limit;
pub mod routes;

pub use handlers::*;
pub use rate_limit::{rate_limit_middleware, LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER};
pub use routes::create_router;
