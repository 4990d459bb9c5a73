//! mail-rules — user-defined rules applied to stored email.

pub mod channels;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod rules;
pub mod store;
