//! Core services: classification, resolution, storage, serving, rewriting.
//!
//! `classifier` and `resolver` are the single shared implementation of the
//! path-matching rules; both the request path (`proxy_service`) and the
//! offline job (`rewriter`) go through them.

pub mod classifier;
pub mod object_store;
pub mod proxy_service;
pub mod resolver;
pub mod rewriter;
