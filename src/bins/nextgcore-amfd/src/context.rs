//! AMF UE Context Management
//!
//! UE table keyed by AMF UE NGAP ID, plus the per-UE NAS state the
//! de-registration procedure reads and writes.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use ogs_nas::common::types::KeySetIdentifier;

use crate::gmm_sm::GmmState;

// ============================================================================
// Constants
// ============================================================================

/// Default maximum number of UEs
pub const DEFAULT_MAX_NUM_OF_UE: usize = 1024;

/// Key length
pub const OGS_KEY_LEN: usize = 16;

/// NGAP cause groups (TS 38.413 Section 9.3.1.2)
pub mod cause_group {
    pub const NAS: u8 = 2;
}

/// NGAP NAS cause values
pub mod cause_nas {
    pub const DEREGISTER: i64 = 2;
}

// ============================================================================
// Basic Types
// ============================================================================

/// NGAP Cause
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NgapCause {
    /// Cause group
    pub group: u8,
    /// Cause value
    pub cause: i64,
}

impl NgapCause {
    pub fn new(group: u8, cause: i64) -> Self {
        Self { group, cause }
    }

    /// NAS cause "deregister"
    pub fn nas_deregister() -> Self {
        Self::new(cause_group::NAS, cause_nas::DEREGISTER)
    }
}

/// Explicit de-registration state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplicitDeRegistered {
    /// N1 done flag
    pub n1_done: bool,
}

// ============================================================================
// NAS security context
// ============================================================================

/// Native 5G NAS security context of a UE
#[derive(Debug, Clone, Default)]
pub struct NasSecurityContext {
    /// ngKSI
    pub ksi: KeySetIdentifier,
    /// K_NASint
    pub knas_int: [u8; OGS_KEY_LEN],
    /// K_NASenc
    pub knas_enc: [u8; OGS_KEY_LEN],
    /// Downlink NAS COUNT (24-bit)
    pub dl_count: u32,
    /// Uplink NAS COUNT estimate (24-bit)
    pub ul_count: u32,
    /// Selected 5G-IA
    pub selected_int_algorithm: u8,
    /// Selected 5G-EA
    pub selected_enc_algorithm: u8,
    /// Access type the context is used on (1 = 3GPP, 2 = non-3GPP)
    pub access_type: u8,
    /// Set when an uplink MAC did not verify
    pub mac_failed: bool,
}

impl NasSecurityContext {
    /// Advance the downlink NAS COUNT after a protected message went out
    pub fn increment_dl_count(&mut self) {
        self.dl_count = self.dl_count.wrapping_add(1) & 0xffffff;
    }
}

/// AMF side NAS context bundle
#[derive(Debug, Clone, Default)]
pub struct AmfNasContext {
    pub security: NasSecurityContext,
}

// ============================================================================
// AmfUe - AMF UE Context
// ============================================================================

/// AMF UE context
#[derive(Debug, Clone)]
pub struct AmfUe {
    /// AMF UE NGAP ID
    pub amf_ue_ngap_id: u64,
    /// RAN UE NGAP ID
    pub ran_ue_ngap_id: u64,
    /// SUPI (Subscription Permanent Identifier)
    pub supi: Option<String>,
    /// 5GMM state
    pub gmm_state: GmmState,
    /// NAS context, absent until the UE has been authenticated
    pub amf_ctx: Option<AmfNasContext>,
    /// Cause carried by the UE context release
    pub ue_context_rel_cause: NgapCause,
    /// Explicit de-registration progress
    pub explicit_de_registered: ExplicitDeRegistered,
}

impl AmfUe {
    pub fn new(amf_ue_ngap_id: u64, ran_ue_ngap_id: u64) -> Self {
        Self {
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            supi: None,
            gmm_state: GmmState::Initial,
            amf_ctx: None,
            ue_context_rel_cause: NgapCause::default(),
            explicit_de_registered: ExplicitDeRegistered::default(),
        }
    }

    pub fn with_security(mut self, security: NasSecurityContext) -> Self {
        self.amf_ctx = Some(AmfNasContext { security });
        self
    }

    pub fn security(&self) -> Option<&NasSecurityContext> {
        self.amf_ctx.as_ref().map(|ctx| &ctx.security)
    }

    pub fn security_mut(&mut self) -> Option<&mut NasSecurityContext> {
        self.amf_ctx.as_mut().map(|ctx| &mut ctx.security)
    }
}

// ============================================================================
// UE Context Store
// ============================================================================

/// UE table keyed by AMF UE NGAP ID
///
/// Every per-UE critical section runs under the table's write lock, so a
/// lookup never interleaves with the removal of the same entry. Closures
/// handed to `with_ue_mut` and `remove_with` must not call back into the
/// store. A panic inside one of them poisons the lock but leaves the table
/// usable; the entries stay as the closure left them.
#[derive(Debug)]
pub struct UeContextStore {
    ue_list: RwLock<HashMap<u64, AmfUe>>,
    max_num_of_ue: usize,
}

impl Default for UeContextStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NUM_OF_UE)
    }
}

impl UeContextStore {
    pub fn new(max_num_of_ue: usize) -> Self {
        Self {
            ue_list: RwLock::new(HashMap::new()),
            max_num_of_ue,
        }
    }

    /// Insert a UE context, refusing duplicates and a full table
    pub fn add(&self, amf_ue: AmfUe) -> bool {
        let mut ue_list = self.ue_list.write().unwrap_or_else(PoisonError::into_inner);

        if ue_list.len() >= self.max_num_of_ue {
            log::error!("Maximum number of UEs [{}] reached", self.max_num_of_ue);
            return false;
        }
        if ue_list.contains_key(&amf_ue.amf_ue_ngap_id) {
            log::error!("[amf_ue_ngap_id={}] UE context already exists", amf_ue.amf_ue_ngap_id);
            return false;
        }

        let id = amf_ue.amf_ue_ngap_id;
        ue_list.insert(id, amf_ue);
        log::debug!("[amf_ue_ngap_id={}] UE context added", id);
        true
    }

    pub fn contains(&self, amf_ue_ngap_id: u64) -> bool {
        self.ue_list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&amf_ue_ngap_id)
    }

    /// Snapshot of a UE context
    pub fn find(&self, amf_ue_ngap_id: u64) -> Option<AmfUe> {
        let ue_list = self.ue_list.read().unwrap_or_else(PoisonError::into_inner);
        ue_list.get(&amf_ue_ngap_id).cloned()
    }

    /// Run `f` on the UE context under the write lock
    pub fn with_ue_mut<R>(&self, amf_ue_ngap_id: u64, f: impl FnOnce(&mut AmfUe) -> R) -> Option<R> {
        let mut ue_list = self.ue_list.write().unwrap_or_else(PoisonError::into_inner);
        ue_list.get_mut(&amf_ue_ngap_id).map(f)
    }

    /// Run `f` on the UE context, then drop the entry, under one write lock
    pub fn remove_with<R>(&self, amf_ue_ngap_id: u64, f: impl FnOnce(&AmfUe) -> R) -> Option<R> {
        let mut ue_list = self.ue_list.write().unwrap_or_else(PoisonError::into_inner);
        let result = f(ue_list.get(&amf_ue_ngap_id)?);
        ue_list.remove(&amf_ue_ngap_id);
        log::debug!("[amf_ue_ngap_id={}] UE context removed", amf_ue_ngap_id);
        Some(result)
    }

    /// Remove a UE context; false if it was already gone
    pub fn remove(&self, amf_ue_ngap_id: u64) -> bool {
        let mut ue_list = self.ue_list.write().unwrap_or_else(PoisonError::into_inner);
        let removed = ue_list.remove(&amf_ue_ngap_id).is_some();
        if removed {
            log::debug!("[amf_ue_ngap_id={}] UE context removed", amf_ue_ngap_id);
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.ue_list.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

// ============================================================================
// Tests
// ============================================================================
