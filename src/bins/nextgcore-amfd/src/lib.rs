//! NextGCore AMF (Access and Mobility Management Function) Library
//!
//! UE-initiated de-registration for the AMF:
//! - Deregistration Request parsing and the de-registration procedure
//! - Protected Deregistration Accept towards the UE
//! - UE context release towards the RAN and context removal
//! - Event dispatcher driving the procedure from uplink NAS

pub mod amf_sap;
pub mod amf_sm;
pub mod config;
pub mod context;
pub mod deregistration;
pub mod error;
pub mod event;
pub mod gmm_build;
pub mod gmm_handler;
pub mod gmm_sm;
pub mod metrics;
pub mod nas_security;
pub mod ngap_path;


// Re-export commonly used types
pub use amf_sap::{AmfSap, AmfSapDispatcher, AmfSapSender, NasInfo, SapError};
pub use amf_sm::{AmfFsmResult, AmfSm};
pub use config::{AmfConfig, ConfigError};
pub use context::{AmfUe, NasSecurityContext, NgapCause, UeContextStore};
pub use deregistration::Deregistration;
pub use error::{AmfError, AmfResult, ParseError, ProcedureError};
pub use event::AmfEvent;
pub use gmm_handler::{DeregAccessType, DeregistrationIes, DeregistrationType};
pub use gmm_sm::{GmmError, GmmEvent, GmmState, GmmStateMachine, SessionIndicator, UeStateHandler};
pub use metrics::{AmfMetrics, CounterSink};
pub use nas_security::{NasDecodeStatus, NasSecurityError, SecurityData};
pub use ngap_path::{NgapChannel, NgapError, NgapMessage, NgapTransport};
