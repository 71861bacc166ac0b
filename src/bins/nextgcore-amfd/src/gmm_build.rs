//! GMM Message Building
//!
//! Downlink 5GMM messages of the de-registration procedure.

use bytes::Bytes;
use ogs_nas::fiveg::{build_5gmm_message, FiveGmmMessage};

use crate::nas_security::{nas_5gs_security_encode, NasSecurityError, SecurityData};

/// Build plain Deregistration Accept message (UE-initiated)
pub fn build_deregistration_accept() -> Bytes {
    build_5gmm_message(&FiveGmmMessage::DeregistrationAcceptFromUe)
}

/// Build Deregistration Accept message (UE-initiated) protected with `sctx`
pub fn build_protected_deregistration_accept(sctx: &SecurityData) -> Result<Bytes, NasSecurityError> {
    let plain = build_deregistration_accept();
    let protected = nas_5gs_security_encode(sctx, &plain)?;
    log::debug!(
        "Deregistration accept built: ksi={} sqn={} len={}",
        sctx.ksi.value,
        sctx.sqn(),
        protected.len()
    );
    Ok(protected)
}
