//! NGAP Path
//!
//! Downlink side of the N2 interface as seen by the NAS layer: Downlink NAS
//! Transport and UE Context Release Command. ASN.1 framing and SCTP are
//! handled by whoever drains the channel.

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::context::{AmfUe, NgapCause};

// ============================================================================
// Errors
// ============================================================================

/// NGAP path errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NgapError {
    /// The NGAP writer went away
    #[error("NGAP channel closed")]
    ChannelClosed,
}

// ============================================================================
// Transport seam
// ============================================================================

/// Outbound NGAP operations used by the NAS layer
///
/// Called with the UE table locked; implementations must not touch the
/// store or block.
pub trait NgapTransport: Send + Sync {
    /// Queue a Downlink NAS Transport carrying `nas_pdu`
    fn send_downlink_nas(
        &self,
        amf_ue_ngap_id: u64,
        ran_ue_ngap_id: u64,
        nas_pdu: Bytes,
    ) -> Result<(), NgapError>;

    /// Ask the RAN to release the UE context; fire and forget
    fn notify_release(&self, amf_ue: &AmfUe, cause: NgapCause);
}

// ============================================================================
// Channel transport
// ============================================================================

/// NGAP messages handed to the N2 writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NgapMessage {
    DownlinkNasTransport {
        amf_ue_ngap_id: u64,
        ran_ue_ngap_id: u64,
        nas_pdu: Bytes,
    },
    UeContextReleaseCommand {
        amf_ue_ngap_id: u64,
        ran_ue_ngap_id: u64,
        cause: NgapCause,
    },
}

impl NgapMessage {
    pub fn name(&self) -> &'static str {
        match self {
            NgapMessage::DownlinkNasTransport { .. } => "DownlinkNASTransport",
            NgapMessage::UeContextReleaseCommand { .. } => "UEContextReleaseCommand",
        }
    }
}

/// `NgapTransport` over an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct NgapChannel {
    tx: mpsc::UnboundedSender<NgapMessage>,
}

impl NgapChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NgapMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NgapTransport for NgapChannel {
    fn send_downlink_nas(
        &self,
        amf_ue_ngap_id: u64,
        ran_ue_ngap_id: u64,
        nas_pdu: Bytes,
    ) -> Result<(), NgapError> {
        log::debug!(
            "[amf_ue_ngap_id={}] DownlinkNASTransport ran_ue_ngap_id={} len={}",
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            nas_pdu.len()
        );
        self.tx
            .send(NgapMessage::DownlinkNasTransport { amf_ue_ngap_id, ran_ue_ngap_id, nas_pdu })
            .map_err(|_| NgapError::ChannelClosed)
    }

    fn notify_release(&self, amf_ue: &AmfUe, cause: NgapCause) {
        log::info!(
            "[amf_ue_ngap_id={}] UEContextReleaseCommand cause group={} value={}",
            amf_ue.amf_ue_ngap_id,
            cause.group,
            cause.cause
        );
        let msg = NgapMessage::UeContextReleaseCommand {
            amf_ue_ngap_id: amf_ue.amf_ue_ngap_id,
            ran_ue_ngap_id: amf_ue.ran_ue_ngap_id,
            cause,
        };
        if self.tx.send(msg).is_err() {
            log::error!(
                "[amf_ue_ngap_id={}] NGAP channel closed, release command dropped",
                amf_ue.amf_ue_ngap_id
            );
        }
    }
}
