//! wasapi-bridge: webhook adapter for the Wasapi WhatsApp API.
//!
//! Normalizes inbound Wasapi webhooks into provider-independent message
//! events, publishes them on a topic bus, and sends text and attachments
//! back through Wasapi.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bus;
pub mod config;
pub mod logging;
pub mod wasapi;
pub mod webhook;
