//! AMF Service Access Points
//!
//! Primitives the NAS procedures hand to the lower layers: AS data requests
//! towards NGAP and registration sublayer notifications.

use std::sync::Arc;

use thiserror::Error;

use crate::context::AmfUe;
use crate::gmm_build;
use crate::nas_security::{NasSecurityError, SecurityData};
use crate::ngap_path::{NgapError, NgapTransport};

// ============================================================================
// Primitives
// ============================================================================

/// NAS message an AS data request carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NasInfo {
    DeregistrationAccept,
}

/// SAP primitive
#[derive(Debug)]
pub enum AmfSap<'a> {
    /// Send a downlink NAS message to the UE
    AsDataReq {
        amf_ue_ngap_id: u64,
        ran_ue_ngap_id: u64,
        nas_info: NasInfo,
        sctx: SecurityData,
    },
    /// Tell the registration sublayer the UE de-registered; `ue` is only
    /// borrowed for the duration of the send
    RegDeregistrationReq {
        amf_ue_ngap_id: u64,
        ue: &'a mut AmfUe,
    },
}

impl AmfSap<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            AmfSap::AsDataReq { .. } => "AMFAS_DATA_REQ",
            AmfSap::RegDeregistrationReq { .. } => "AMFREG_DEREGISTRATION_REQ",
        }
    }

    pub fn amf_ue_ngap_id(&self) -> u64 {
        match self {
            AmfSap::AsDataReq { amf_ue_ngap_id, .. } => *amf_ue_ngap_id,
            AmfSap::RegDeregistrationReq { amf_ue_ngap_id, .. } => *amf_ue_ngap_id,
        }
    }
}

/// SAP errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SapError {
    #[error("NAS security: {0}")]
    Security(#[from] NasSecurityError),
    #[error("NGAP: {0}")]
    Transport(#[from] NgapError),
}

// ============================================================================
// Dispatcher
// ============================================================================

/// SAP dispatch seam
///
/// Called with the UE table locked; implementations must not touch the
/// store or block.
pub trait AmfSapSender: Send + Sync {
    fn send(&self, primitive: AmfSap<'_>) -> Result<(), SapError>;
}

/// Default SAP dispatcher
pub struct AmfSapDispatcher {
    ngap: Arc<dyn NgapTransport>,
}

impl AmfSapDispatcher {
    pub fn new(ngap: Arc<dyn NgapTransport>) -> Self {
        Self { ngap }
    }

    fn as_data_req(
        &self,
        amf_ue_ngap_id: u64,
        ran_ue_ngap_id: u64,
        nas_info: NasInfo,
        sctx: &SecurityData,
    ) -> Result<(), SapError> {
        let nas_pdu = match nas_info {
            NasInfo::DeregistrationAccept => gmm_build::build_protected_deregistration_accept(sctx)?,
        };
        self.ngap.send_downlink_nas(amf_ue_ngap_id, ran_ue_ngap_id, nas_pdu)?;
        Ok(())
    }
}

impl AmfSapSender for AmfSapDispatcher {
    fn send(&self, primitive: AmfSap<'_>) -> Result<(), SapError> {
        log::debug!("[amf_ue_ngap_id={}] {}", primitive.amf_ue_ngap_id(), primitive.name());

        match primitive {
            AmfSap::AsDataReq { amf_ue_ngap_id, ran_ue_ngap_id, nas_info, sctx } => {
                self.as_data_req(amf_ue_ngap_id, ran_ue_ngap_id, nas_info, &sctx)
            }
            AmfSap::RegDeregistrationReq { amf_ue_ngap_id, ue } => {
                ue.explicit_de_registered.n1_done = true;
                log::info!(
                    "[amf_ue_ngap_id={}] N1 de-registration recorded (supi={})",
                    amf_ue_ngap_id,
                    ue.supi.as_deref().unwrap_or("unknown")
                );
                Ok(())
            }
        }
    }
}
