// src/extract.rs
//! Request extractors whose rejections come back as `PollError` JSON bodies.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::PollError;

/// JSON request body. A body that does not deserialize is an invalid argument.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(PollError))]
pub struct JsonBody<T>(pub T);

/// Path parameters. An id that does not parse is an invalid argument.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(PollError))]
pub struct PathParam<T>(pub T);
