//! 5GS (5G System) NAS implementation
//!
//! 5GMM messages of the UE-initiated de-registration procedure as specified
//! in 3GPP TS 24.501.

pub mod types;
pub mod message;
pub mod header;

pub use types::*;
pub use message::*;
pub use header::*;
