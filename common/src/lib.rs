//! Shared model and text utilities for letterkit.
//!
//! This crate holds everything that both the server and any client need to agree
//! on: the serialized shape of templates, documents and users, the request
//! payloads accepted by the HTTP API, and the placeholder engine that turns a
//! template body into a rendered document.

pub mod model;
pub mod placeholder;
pub mod requests;
