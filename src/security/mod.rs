//! Security utilities.
//!
//! Credentials are never logged: the credential type redacts itself in
//! `Debug`, and any text coming back from the object store is scrubbed here
//! before it reaches an event.

pub mod credential_scrubber;

pub use credential_scrubber::{safe_error_message, scrub_credentials, scrub_known_secrets};
