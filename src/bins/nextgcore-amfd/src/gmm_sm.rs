//! GMM (5G Mobility Management) State Machine
//!
//! Only the `Deregister` event is modelled; the rest of the 5GMM table
//! lives with the registration procedures.

use thiserror::Error;

use crate::context::{AmfUe, NgapCause};

/// GMM FSM states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GmmState {
    /// Initial state
    #[default]
    Initial,
    /// De-registered state - UE is not registered
    DeRegistered,
    /// Authentication state - performing authentication
    Authentication,
    /// Security mode state - establishing security
    SecurityMode,
    /// Initial context setup state - setting up initial context
    InitialContextSetup,
    /// Registered state - UE is registered
    Registered,
    /// UE context will remove state - preparing to remove UE context
    UeContextWillRemove,
    /// Exception state - error condition
    Exception,
    /// Final state
    Final,
}

impl GmmState {
    /// Get the name of the state
    pub fn name(&self) -> &'static str {
        match self {
            GmmState::Initial => "GMM_STATE_INITIAL",
            GmmState::DeRegistered => "GMM_STATE_DE_REGISTERED",
            GmmState::Authentication => "GMM_STATE_AUTHENTICATION",
            GmmState::SecurityMode => "GMM_STATE_SECURITY_MODE",
            GmmState::InitialContextSetup => "GMM_STATE_INITIAL_CONTEXT_SETUP",
            GmmState::Registered => "GMM_STATE_REGISTERED",
            GmmState::UeContextWillRemove => "GMM_STATE_UE_CONTEXT_WILL_REMOVE",
            GmmState::Exception => "GMM_STATE_EXCEPTION",
            GmmState::Final => "GMM_STATE_FINAL",
        }
    }
}

/// GMM events raised by the de-registration procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GmmEvent {
    Deregister,
}

impl GmmEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GmmEvent::Deregister => "STATE_EVENT_DEREGISTER",
        }
    }
}

/// Whether PDU sessions are still attached to the UE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionIndicator {
    #[default]
    Null,
    Active,
}

/// GMM state machine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GmmError {
    #[error("{} not allowed in {}", .event.name(), .state.name())]
    InvalidTransition { state: GmmState, event: GmmEvent },
}

/// 5GMM state machine seam
///
/// Called with the UE table locked; implementations must not touch the
/// store or block.
pub trait UeStateHandler: Send + Sync {
    /// Apply `event` to `current`, write the new state into `amf_ue` and
    /// return it
    fn handle_event(
        &self,
        current: GmmState,
        event: GmmEvent,
        session: SessionIndicator,
        amf_ue: &mut AmfUe,
        amf_ue_ngap_id: u64,
    ) -> Result<GmmState, GmmError>;
}

/// Default GMM state machine
#[derive(Debug, Clone, Default)]
pub struct GmmStateMachine;

impl GmmStateMachine {
    pub fn new() -> Self {
        Self
    }

    fn handle_deregister(
        &self,
        current: GmmState,
        session: SessionIndicator,
        amf_ue: &mut AmfUe,
        amf_ue_ngap_id: u64,
    ) -> Result<GmmState, GmmError> {
        match current {
            GmmState::Registered
            | GmmState::Authentication
            | GmmState::SecurityMode
            | GmmState::InitialContextSetup
            | GmmState::Exception => {
                if session == SessionIndicator::Active {
                    log::info!(
                        "[amf_ue_ngap_id={}] PDU session release deferred to session management",
                        amf_ue_ngap_id
                    );
                }
                amf_ue.ue_context_rel_cause = NgapCause::nas_deregister();
                Ok(GmmState::DeRegistered)
            }
            // Release already under way
            GmmState::UeContextWillRemove => Ok(current),
            GmmState::Initial | GmmState::DeRegistered | GmmState::Final => {
                Err(GmmError::InvalidTransition { state: current, event: GmmEvent::Deregister })
            }
        }
    }
}

impl UeStateHandler for GmmStateMachine {
    fn handle_event(
        &self,
        current: GmmState,
        event: GmmEvent,
        session: SessionIndicator,
        amf_ue: &mut AmfUe,
        amf_ue_ngap_id: u64,
    ) -> Result<GmmState, GmmError> {
        let new_state = match event {
            GmmEvent::Deregister => self.handle_deregister(current, session, amf_ue, amf_ue_ngap_id)?,
        };

        if new_state != current {
            log::debug!(
                "[amf_ue_ngap_id={}] GMM state transition: {} -> {} ({})",
                amf_ue_ngap_id,
                current.name(),
                new_state.name(),
                event.name()
            );
        }
        amf_ue.gmm_state = new_state;
        Ok(new_state)
    }
}
