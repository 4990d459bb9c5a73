//! Message ingestion: raw RFC 822 parsing and mailbox directory import.

pub mod email;
pub mod mailbox;

pub use email::parse_raw_email;
pub use mailbox::{ImportReport, import_directory};
