//! Adds signatures to OpenPGP cleartext-signed documents.
//!
//! A clearsigned document carries its signatures in a trailing armor
//! block.  [`amend::Amender`] signs a document, and if the document
//! is already signed, it merges the new signature into the existing
//! block instead of wrapping the document a second time.  The result
//! is verified before it is released.
//!
//! The OpenPGP operations are behind the [`engine::Engine`] trait.
//! [`engine::EngineBuilder`] configures the Sequoia-based engine.

#[macro_use] mod log;

/// Re-export.
pub use sequoia_openpgp as openpgp;

mod errors;
pub use errors::Error;
pub use errors::Result;
pub use errors::error_chain;
pub use errors::one_line_error_chain;

pub mod amend;
pub mod armor;
pub mod cleartext;
pub mod config;
pub mod engine;
pub mod hash;
pub mod packet;
pub mod types;
