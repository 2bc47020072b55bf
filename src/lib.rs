//! # tinyserve
//!
//! A lightweight, modular HTTP/1.1 serving toolkit.
//!
//! This crate provides the storage primitives (growable array, chained hash
//! table), a request parser and response serializer working on raw byte
//! buffers, an exact-match router, a static-file layer, and a TCP accept
//! loop tying them together.
//!
//! Refer to the included binary for a complete server implementation.

/// Module containing the generic storage primitives
pub mod store;

/// Module containing the HTTP request, response and status types
pub mod http;

/// Module containing the route table and dispatch
pub mod router;

/// Module serving static files from a root directory
pub mod fileserve;

/// Module loading the server configuration
pub mod conf;

/// Module containing the server runtime
pub mod runtime;
