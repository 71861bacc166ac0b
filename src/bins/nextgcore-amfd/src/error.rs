//! AMF procedure errors

use thiserror::Error;

use ogs_nas::NasError;

use crate::amf_sap::SapError;
use crate::gmm_sm::GmmError;
use crate::nas_security::NasSecurityError;

/// Deregistration Request decoding failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Access type code outside 1..=3
    #[error("Invalid access type {0}")]
    InvalidAccessType(u8),
}

/// De-registration procedure failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcedureError {
    /// No UE context for the AMF UE NGAP ID
    #[error("[amf_ue_ngap_id={0}] No UE context")]
    NoContext(u64),
    /// UE context without its NAS context bundle
    #[error("[amf_ue_ngap_id={0}] No AMF NAS context")]
    NoAmfContext(u64),
    /// A SAP primitive could not be delivered
    #[error("SAP send failed: {0}")]
    SendFailed(#[source] SapError),
    /// The 5GMM state machine refused the transition
    #[error("GMM state machine: {0}")]
    StateMachineError(#[source] GmmError),
}

/// Errors surfaced by the AMF NAS entry points
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmfError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Procedure(#[from] ProcedureError),
    #[error("NAS decode: {0}")]
    Nas(#[from] NasError),
    #[error("NAS security: {0}")]
    Security(#[from] NasSecurityError),
}

/// AMF result type
pub type AmfResult<T> = Result<T, AmfError>;
