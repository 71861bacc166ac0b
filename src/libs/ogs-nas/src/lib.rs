//! NextGCore NAS Protocol Library
//!
//! 5GMM message coding for the UE-initiated de-registration procedure as
//! specified in 3GPP TS 24.501.
//!
//! # Features
//!
//! - 5GMM plain and security protected NAS headers
//! - De-registration type and ngKSI half-octet IEs
//! - Deregistration Request (UE originating) and Deregistration Accept
//!   (UE originating)
//!
//! # Example
//!
//! ```rust
//! use ogs_nas::fiveg::{
//!     build_5gmm_message, decode_5gmm_message, DeRegistrationType,
//!     DeregistrationRequestFromUe, FiveGmmMessage, MobileIdentity,
//! };
//! use ogs_nas::common::types::KeySetIdentifier;
//!
//! let request = DeregistrationRequestFromUe {
//!     de_registration_type: DeRegistrationType::new(true, false, 1),
//!     ngksi: KeySetIdentifier::new(0, 3),
//!     mobile_identity: MobileIdentity::no_identity(),
//! };
//!
//! let buf = build_5gmm_message(&FiveGmmMessage::DeregistrationRequestFromUe(request.clone()));
//! let decoded = decode_5gmm_message(&buf).unwrap();
//! assert_eq!(decoded, FiveGmmMessage::DeregistrationRequestFromUe(request));
//! ```

pub mod error;
pub mod common;
pub mod fiveg;


pub use error::{NasError, NasResult};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{NasError, NasResult};
    pub use crate::common::types::{
        KeySetIdentifier,
        ProtocolDiscriminator,
        SecurityHeaderType,
    };
    pub use crate::fiveg::{
        AccessType,
        DeRegistrationType,
        DeregistrationRequestFromUe,
        FiveGmmMessage,
        FiveGmmMessageType,
        FiveGsNasHeader,
        FiveGsNasSecurityHeader,
        MobileIdentity,
        MobileIdentityType,
    };
}
