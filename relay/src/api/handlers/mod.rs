//! HTTP request handlers.
//!
//! - [`transcribe`]: Relay an uploaded audio file to the transcription service
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Result`]; failures are rendered by the
//! [`IntoResponse`](axum::response::IntoResponse) impl on [`crate::errors::Error`], which logs the
//! full error and sends the client only a short, safe message.

pub mod transcribe;
