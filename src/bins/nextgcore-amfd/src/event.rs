//! AMF Event Definitions

use bytes::Bytes;

/// Events fed to the AMF dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmfEvent {
    /// NAS PDU carried by an Uplink NAS Transport
    UplinkNas { amf_ue_ngap_id: u64, nas_pdu: Bytes },
    /// RAN confirmed the UE context release
    UeContextReleaseComplete { amf_ue_ngap_id: u64 },
}

impl AmfEvent {
    /// Get the name of the event
    pub fn name(&self) -> &'static str {
        match self {
            AmfEvent::UplinkNas { .. } => "AMF_EVENT_5GMM_MESSAGE",
            AmfEvent::UeContextReleaseComplete { .. } => "AMF_EVENT_NGAP_UE_CONTEXT_RELEASE_COMPLETE",
        }
    }

    pub fn amf_ue_ngap_id(&self) -> u64 {
        match self {
            AmfEvent::UplinkNas { amf_ue_ngap_id, .. } => *amf_ue_ngap_id,
            AmfEvent::UeContextReleaseComplete { amf_ue_ngap_id } => *amf_ue_ngap_id,
        }
    }

    pub fn uplink_nas(amf_ue_ngap_id: u64, nas_pdu: impl Into<Bytes>) -> Self {
        AmfEvent::UplinkNas { amf_ue_ngap_id, nas_pdu: nas_pdu.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name() {
        let event = AmfEvent::uplink_nas(3, vec![0x7e, 0x00, 0x45]);
        assert_eq!(event.name(), "AMF_EVENT_5GMM_MESSAGE");
        assert_eq!(event.amf_ue_ngap_id(), 3);

        let event = AmfEvent::UeContextReleaseComplete { amf_ue_ngap_id: 4 };
        assert_eq!(event.name(), "AMF_EVENT_NGAP_UE_CONTEXT_RELEASE_COMPLETE");
        assert_eq!(event.amf_ue_ngap_id(), 4);
    }
}
