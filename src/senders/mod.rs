//! Sender variants (C5): one implementation of [`crate::sender::Sender`] per
//! egress destination.

pub mod capture_file;
pub mod websocket;
