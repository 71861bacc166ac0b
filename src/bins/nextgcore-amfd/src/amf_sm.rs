//! AMF Main State Machine
//!
//! Routes uplink NAS and NGAP release events to the de-registration
//! procedure.

use std::sync::Arc;

use tokio::sync::mpsc;

use ogs_nas::fiveg::{decode_5gmm_message, FiveGmmMessage};
use ogs_nas::NasError;

use crate::deregistration::Deregistration;
use crate::error::AmfResult;
use crate::event::AmfEvent;
use crate::gmm_sm::GmmState;
use crate::nas_security::nas_5gs_security_decode;

/// Result of FSM event handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmfFsmResult {
    /// Event was handled
    Handled,
    /// Event was ignored
    Ignored,
    /// Error occurred
    Error,
}

/// AMF State Machine
pub struct AmfSm {
    dereg: Arc<Deregistration>,
}

impl AmfSm {
    pub fn new(dereg: Arc<Deregistration>) -> Self {
        Self { dereg }
    }

    /// Dispatch an event to the FSM
    pub fn dispatch(&self, event: &AmfEvent) -> AmfFsmResult {
        log::debug!("[amf_ue_ngap_id={}] {}", event.amf_ue_ngap_id(), event.name());

        match event {
            AmfEvent::UplinkNas { amf_ue_ngap_id, nas_pdu } => self.handle_uplink_nas(*amf_ue_ngap_id, nas_pdu),
            AmfEvent::UeContextReleaseComplete { amf_ue_ngap_id } => {
                if self.dereg.remove_subscriber(*amf_ue_ngap_id) {
                    AmfFsmResult::Handled
                } else {
                    AmfFsmResult::Ignored
                }
            }
        }
    }

    fn handle_uplink_nas(&self, amf_ue_ngap_id: u64, nas_pdu: &[u8]) -> AmfFsmResult {
        self.process_uplink_nas(amf_ue_ngap_id, nas_pdu).unwrap_or_else(|e| {
            log::error!("[amf_ue_ngap_id={}] Uplink NAS failed: {}", amf_ue_ngap_id, e);
            AmfFsmResult::Error
        })
    }

    fn process_uplink_nas(&self, amf_ue_ngap_id: u64, nas_pdu: &[u8]) -> AmfResult<AmfFsmResult> {
        let decoded = self
            .dereg
            .store()
            .with_ue_mut(amf_ue_ngap_id, |amf_ue| nas_5gs_security_decode(amf_ue.security_mut(), nas_pdu));

        let Some(decoded) = decoded else {
            log::warn!("[amf_ue_ngap_id={}] Uplink NAS for unknown UE", amf_ue_ngap_id);
            return Ok(AmfFsmResult::Ignored);
        };
        let (plain, status) = decoded?;

        if status.integrity_protected_message && !status.mac_matched {
            log::warn!("[amf_ue_ngap_id={}] Integrity check failed, processing anyway", amf_ue_ngap_id);
        }

        let msg = match decode_5gmm_message(&plain) {
            Ok(FiveGmmMessage::DeregistrationRequestFromUe(msg)) => msg,
            Ok(other) => {
                log::debug!(
                    "[amf_ue_ngap_id={}] Unhandled 5GMM message type {:?}",
                    amf_ue_ngap_id,
                    other.message_type()
                );
                return Ok(AmfFsmResult::Ignored);
            }
            Err(NasError::UnsupportedMessageType(message_type)) => {
                log::debug!("[amf_ue_ngap_id={}] Unhandled 5GMM message type 0x{:02x}", amf_ue_ngap_id, message_type);
                return Ok(AmfFsmResult::Ignored);
            }
            Err(e) => return Err(e.into()),
        };

        self.dereg.handle_ue_originated_deregistration(amf_ue_ngap_id, &msg, &status)?;

        let state = self.dereg.store().find(amf_ue_ngap_id).map(|amf_ue| amf_ue.gmm_state);
        if state == Some(GmmState::DeRegistered) {
            self.dereg.handle_deregistration_completion(amf_ue_ngap_id)?;
        }

        Ok(AmfFsmResult::Handled)
    }

    /// Consume events until every sender is gone
    pub async fn run(&self, mut rx: mpsc::Receiver<AmfEvent>) {
        log::info!("AMF event loop started");
        while let Some(event) = rx.recv().await {
            self.dispatch(&event);
        }
        log::info!("AMF event loop exited");
    }
}
