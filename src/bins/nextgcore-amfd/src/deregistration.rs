//! UE-initiated De-registration Procedure
//!
//! TS 24.501 Section 5.5.2.2. The AMF answers a Deregistration Request
//! (unless the UE is switching off), moves the UE to 5GMM-DEREGISTERED and,
//! once the state machine has released it, tears the UE context down.

use std::sync::Arc;

use ogs_nas::fiveg::DeregistrationRequestFromUe;

use crate::amf_sap::{AmfSap, AmfSapSender, NasInfo};
use crate::context::{AmfUe, NgapCause, UeContextStore};
use crate::error::{AmfResult, ProcedureError};
use crate::gmm_handler::{parse_deregistration_request, DeregistrationIes, DeregistrationType};
use crate::gmm_sm::{GmmEvent, SessionIndicator, UeStateHandler};
use crate::metrics::{self, CounterSink};
use crate::nas_security::{NasDecodeStatus, SecurityData};
use crate::ngap_path::NgapTransport;

/// De-registration procedure controller and completion handler
pub struct Deregistration {
    store: Arc<UeContextStore>,
    sap: Arc<dyn AmfSapSender>,
    gmm: Arc<dyn UeStateHandler>,
    ngap: Arc<dyn NgapTransport>,
    counters: Arc<dyn CounterSink>,
    teardown_on_send_failure: bool,
}

impl Deregistration {
    pub fn new(
        store: Arc<UeContextStore>,
        sap: Arc<dyn AmfSapSender>,
        gmm: Arc<dyn UeStateHandler>,
        ngap: Arc<dyn NgapTransport>,
        counters: Arc<dyn CounterSink>,
    ) -> Self {
        Self {
            store,
            sap,
            gmm,
            ngap,
            counters,
            teardown_on_send_failure: true,
        }
    }

    /// Release the UE locally when the Deregistration Accept cannot be sent
    pub fn with_teardown_on_send_failure(mut self, enabled: bool) -> Self {
        self.teardown_on_send_failure = enabled;
        self
    }

    pub fn store(&self) -> &Arc<UeContextStore> {
        &self.store
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Handle a Deregistration Request (UE originating)
    pub fn handle_ue_originated_deregistration(
        &self,
        amf_ue_ngap_id: u64,
        msg: &DeregistrationRequestFromUe,
        decode_status: &NasDecodeStatus,
    ) -> AmfResult<()> {
        let ies = parse_deregistration_request(amf_ue_ngap_id, msg, decode_status, self.counters.as_ref())?;

        match self.run(amf_ue_ngap_id, &ies) {
            Err(ProcedureError::SendFailed(e)) => {
                if self.teardown_on_send_failure {
                    log::warn!(
                        "[amf_ue_ngap_id={}] Deregistration accept not delivered, releasing UE context",
                        amf_ue_ngap_id
                    );
                    self.store.with_ue_mut(amf_ue_ngap_id, |amf_ue| {
                        amf_ue.ue_context_rel_cause = NgapCause::nas_deregister();
                    });
                    if let Err(err) = self.complete(amf_ue_ngap_id) {
                        log::error!("[amf_ue_ngap_id={}] Local teardown failed: {}", amf_ue_ngap_id, err);
                    }
                }
                Err(ProcedureError::SendFailed(e).into())
            }
            other => other.map_err(Into::into),
        }
    }

    /// Handle the end of the 5GMM release: notify NGAP, drop the UE context
    pub fn handle_deregistration_completion(&self, amf_ue_ngap_id: u64) -> AmfResult<()> {
        Ok(self.complete(amf_ue_ngap_id)?)
    }

    /// Drop a UE context without notifying anyone
    pub fn remove_subscriber(&self, amf_ue_ngap_id: u64) -> bool {
        let removed = self.store.remove(amf_ue_ngap_id);
        if !removed {
            log::debug!("[amf_ue_ngap_id={}] No UE context to remove", amf_ue_ngap_id);
        }
        removed
    }

    // ========================================================================
    // Procedure
    // ========================================================================

    /// Run the de-registration procedure for normalized IEs
    pub fn run(&self, amf_ue_ngap_id: u64, ies: &DeregistrationIes) -> Result<(), ProcedureError> {
        match self
            .store
            .with_ue_mut(amf_ue_ngap_id, |amf_ue| self.run_locked(amf_ue_ngap_id, ies, amf_ue))
        {
            Some(result) => result,
            None => {
                log::warn!("[amf_ue_ngap_id={}] No UE context for deregistration", amf_ue_ngap_id);
                Err(ProcedureError::NoContext(amf_ue_ngap_id))
            }
        }
    }

    fn run_locked(
        &self,
        amf_ue_ngap_id: u64,
        ies: &DeregistrationIes,
        amf_ue: &mut AmfUe,
    ) -> Result<(), ProcedureError> {
        let Some(security) = amf_ue.security() else {
            log::error!("[amf_ue_ngap_id={}] No AMF context", amf_ue_ngap_id);
            return Err(ProcedureError::NoAmfContext(amf_ue_ngap_id));
        };

        match ies.de_reg_type {
            DeregistrationType::SwitchOff => {
                log::info!("[amf_ue_ngap_id={}] Switch off, deregistration accept not sent", amf_ue_ngap_id);
                self.record_success(metrics::ACTION_ACCEPT_NOT_SENT);
            }
            DeregistrationType::Normal => {
                let sctx = SecurityData::from_context(security, false, true);
                self.sap
                    .send(AmfSap::AsDataReq {
                        amf_ue_ngap_id,
                        ran_ue_ngap_id: amf_ue.ran_ue_ngap_id,
                        nas_info: NasInfo::DeregistrationAccept,
                        sctx,
                    })
                    .map_err(|e| {
                        log::error!("[amf_ue_ngap_id={}] Deregistration accept send failed: {}", amf_ue_ngap_id, e);
                        ProcedureError::SendFailed(e)
                    })?;

                if let Some(security) = amf_ue.security_mut() {
                    security.increment_dl_count();
                }
                log::info!("[amf_ue_ngap_id={}] Deregistration accept sent", amf_ue_ngap_id);
                self.record_success(metrics::ACTION_ACCEPT_SENT);
            }
        }

        if let Err(e) = self.sap.send(AmfSap::RegDeregistrationReq { amf_ue_ngap_id, ue: &mut *amf_ue }) {
            log::warn!("[amf_ue_ngap_id={}] Registration sublayer notification failed: {}", amf_ue_ngap_id, e);
        }

        let current = amf_ue.gmm_state;
        let new_state = self
            .gmm
            .handle_event(current, GmmEvent::Deregister, SessionIndicator::Null, amf_ue, amf_ue_ngap_id)
            .map_err(|e| {
                log::error!("[amf_ue_ngap_id={}] {}", amf_ue_ngap_id, e);
                ProcedureError::StateMachineError(e)
            })?;

        log::debug!(
            "[amf_ue_ngap_id={}] Deregister handled: {} -> {}",
            amf_ue_ngap_id,
            current.name(),
            new_state.name()
        );
        Ok(())
    }

    fn record_success(&self, action: &str) {
        self.counters
            .increment(metrics::UE_DEREGISTER, 1, &[(metrics::LABEL_RESULT, metrics::RESULT_SUCCESS)]);
        self.counters
            .increment(metrics::UE_DEREGISTER, 1, &[(metrics::LABEL_ACTION, action)]);
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Notify NGAP of the release, then remove the UE context
    pub fn complete(&self, amf_ue_ngap_id: u64) -> Result<(), ProcedureError> {
        let ngap = &self.ngap;
        let released = self.store.remove_with(amf_ue_ngap_id, |amf_ue| {
            ngap.notify_release(amf_ue, amf_ue.ue_context_rel_cause);
        });

        match released {
            Some(()) => {
                log::info!("[amf_ue_ngap_id={}] UE context released", amf_ue_ngap_id);
                Ok(())
            }
            None => {
                log::error!("[amf_ue_ngap_id={}] No UE context to release", amf_ue_ngap_id);
                Err(ProcedureError::NoContext(amf_ue_ngap_id))
            }
        }
    }
}
