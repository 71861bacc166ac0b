//! End-to-end tests for UE-initiated de-registration

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use bytes::Bytes;
use tokio::sync::mpsc;

use ogs_nas::common::types::KeySetIdentifier;
use ogs_nas::fiveg::{
    build_5gmm_message, DeRegistrationType, DeregistrationRequestFromUe, FiveGmmMessage, MobileIdentity,
};

use nextgcore_amfd::amf_sap::{AmfSap, AmfSapDispatcher, AmfSapSender, NasInfo, SapError};
use nextgcore_amfd::context::{AmfUe, NasSecurityContext, NgapCause, UeContextStore};
use nextgcore_amfd::deregistration::Deregistration;
use nextgcore_amfd::error::{AmfError, ParseError, ProcedureError};
use nextgcore_amfd::event::AmfEvent;
use nextgcore_amfd::gmm_sm::{GmmError, GmmEvent, GmmState, GmmStateMachine, SessionIndicator, UeStateHandler};
use nextgcore_amfd::metrics::{self, AmfMetrics, CounterSink};
use nextgcore_amfd::nas_security::{
    algorithm, direction, nas_5gs_security_decode, nas_protect, NasDecodeStatus, SecurityData,
};
use nextgcore_amfd::ngap_path::{NgapChannel, NgapError, NgapMessage, NgapTransport};
use nextgcore_amfd::{AmfFsmResult, AmfSm};

// ============================================================================
// Recording collaborators
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    AsDataReq { amf_ue_ngap_id: u64, nas_info: NasInfo, sqn: u8 },
    RegDeregistrationReq { amf_ue_ngap_id: u64 },
    GmmEvent { state: GmmState, event: GmmEvent },
    NotifyRelease { amf_ue_ngap_id: u64, cause: NgapCause, supi: Option<String> },
    Counter { name: String, labels: Vec<(String, String)> },
}

#[derive(Default)]
struct Journal {
    calls: Mutex<Vec<Call>>,
}

impl Journal {
    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| pred(call)).count()
    }

    fn counters(&self, name: &str) -> Vec<Vec<(String, String)>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Counter { name: n, labels } if n == name => Some(labels),
                _ => None,
            })
            .collect()
    }
}

struct RecordingSap {
    journal: Arc<Journal>,
    fail_as_data: bool,
}

impl AmfSapSender for RecordingSap {
    fn send(&self, primitive: AmfSap<'_>) -> Result<(), SapError> {
        match primitive {
            AmfSap::AsDataReq { amf_ue_ngap_id, nas_info, sctx, .. } => {
                self.journal.push(Call::AsDataReq { amf_ue_ngap_id, nas_info, sqn: sctx.sqn() });
                if self.fail_as_data {
                    return Err(SapError::Transport(NgapError::ChannelClosed));
                }
            }
            AmfSap::RegDeregistrationReq { amf_ue_ngap_id, ue } => {
                ue.explicit_de_registered.n1_done = true;
                self.journal.push(Call::RegDeregistrationReq { amf_ue_ngap_id });
            }
        }
        Ok(())
    }
}

struct RecordingGmm {
    journal: Arc<Journal>,
    inner: GmmStateMachine,
}

impl UeStateHandler for RecordingGmm {
    fn handle_event(
        &self,
        current: GmmState,
        event: GmmEvent,
        session: SessionIndicator,
        amf_ue: &mut AmfUe,
        amf_ue_ngap_id: u64,
    ) -> Result<GmmState, GmmError> {
        self.journal.push(Call::GmmEvent { state: current, event });
        self.inner.handle_event(current, event, session, amf_ue, amf_ue_ngap_id)
    }
}

struct RecordingNgap {
    journal: Arc<Journal>,
}

impl NgapTransport for RecordingNgap {
    fn send_downlink_nas(&self, _: u64, _: u64, _: Bytes) -> Result<(), NgapError> {
        Ok(())
    }

    fn notify_release(&self, amf_ue: &AmfUe, cause: NgapCause) {
        self.journal.push(Call::NotifyRelease {
            amf_ue_ngap_id: amf_ue.amf_ue_ngap_id,
            cause,
            supi: amf_ue.supi.clone(),
        });
    }
}

struct RecordingCounters {
    journal: Arc<Journal>,
}

impl CounterSink for RecordingCounters {
    fn increment(&self, name: &str, _value: u64, labels: &[(&str, &str)]) {
        self.journal.push(Call::Counter {
            name: name.to_string(),
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        });
    }
}

// ============================================================================
// Fixtures
// ============================================================================

const S1: u64 = 1;
const S2: u64 = 2;

struct Harness {
    store: Arc<UeContextStore>,
    journal: Arc<Journal>,
    dereg: Deregistration,
}

fn security(dl_count: u32) -> NasSecurityContext {
    NasSecurityContext {
        ksi: KeySetIdentifier::new(0, 1),
        knas_int: [0x11; 16],
        knas_enc: [0x22; 16],
        dl_count,
        selected_int_algorithm: algorithm::NIA2,
        selected_enc_algorithm: algorithm::NEA2,
        access_type: 1,
        ..Default::default()
    }
}

fn registered(id: u64) -> AmfUe {
    let mut ue = AmfUe::new(id, id + 100).with_security(security(5));
    ue.supi = Some(format!("imsi-99970000000000{}", id));
    ue.gmm_state = GmmState::Registered;
    ue
}

fn harness(fail_as_data: bool, teardown: bool) -> Harness {
    let _ = env_logger::try_init();

    let store = Arc::new(UeContextStore::default());
    store.add(registered(S1));
    store.add(registered(S2));

    let journal = Arc::new(Journal::default());
    let ngap = RecordingNgap { journal: journal.clone() };
    let dereg = Deregistration::new(
        store.clone(),
        Arc::new(RecordingSap { journal: journal.clone(), fail_as_data }),
        Arc::new(RecordingGmm { journal: journal.clone(), inner: GmmStateMachine::new() }),
        Arc::new(ngap),
        Arc::new(RecordingCounters { journal: journal.clone() }),
    )
    .with_teardown_on_send_failure(teardown);

    Harness { store, journal, dereg }
}

fn request(switch_off: bool, access_type: u8, ksi: u8) -> DeregistrationRequestFromUe {
    DeregistrationRequestFromUe {
        de_registration_type: DeRegistrationType::new(switch_off, false, access_type),
        ngksi: KeySetIdentifier::new(0, ksi),
        mobile_identity: MobileIdentity::no_identity(),
    }
}

fn labels(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn status() -> NasDecodeStatus {
    NasDecodeStatus {
        integrity_protected_message: true,
        ciphered_message: true,
        mac_matched: true,
        security_context_available: true,
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn scenario_a_switch_off() {
    let h = harness(false, true);
    h.dereg.handle_ue_originated_deregistration(S1, &request(true, 1, 3), &status()).unwrap();

    assert_eq!(h.journal.count(|c| matches!(c, Call::AsDataReq { .. })), 0);
    assert_eq!(h.journal.count(|c| matches!(c, Call::RegDeregistrationReq { amf_ue_ngap_id: S1 })), 1);

    let ue = h.store.find(S1).unwrap();
    assert_eq!(ue.gmm_state, GmmState::DeRegistered);
    assert_eq!(ue.ue_context_rel_cause, NgapCause::nas_deregister());
    assert_eq!(ue.security().unwrap().dl_count, 5);
    assert!(ue.explicit_de_registered.n1_done);

    assert_eq!(
        h.journal.counters(metrics::UE_DEREGISTRATION),
        vec![labels(&[(metrics::LABEL_AMF_CAUSE, metrics::CAUSE_UE_INITIATED)])]
    );
    assert_eq!(
        h.journal.counters(metrics::UE_DEREGISTER),
        vec![
            labels(&[(metrics::LABEL_RESULT, metrics::RESULT_SUCCESS)]),
            labels(&[(metrics::LABEL_ACTION, "deregistration_accept_not_sent")]),
        ]
    );
}

#[test]
fn scenario_b_normal() {
    let h = harness(false, true);
    h.dereg.handle_ue_originated_deregistration(S2, &request(false, 3, 5), &status()).unwrap();

    let ordered: Vec<_> = h
        .journal
        .calls()
        .into_iter()
        .filter(|c| !matches!(c, Call::Counter { .. }))
        .collect();
    assert_eq!(
        ordered,
        vec![
            Call::AsDataReq { amf_ue_ngap_id: S2, nas_info: NasInfo::DeregistrationAccept, sqn: 5 },
            Call::RegDeregistrationReq { amf_ue_ngap_id: S2 },
            Call::GmmEvent { state: GmmState::Registered, event: GmmEvent::Deregister },
        ]
    );

    let ue = h.store.find(S2).unwrap();
    assert_eq!(ue.gmm_state, GmmState::DeRegistered);
    assert_eq!(ue.security().unwrap().dl_count, 6);
    assert_eq!(
        h.journal.counters(metrics::UE_DEREGISTER),
        vec![
            labels(&[(metrics::LABEL_RESULT, metrics::RESULT_SUCCESS)]),
            labels(&[(metrics::LABEL_ACTION, "deregister_accept_sent")]),
        ]
    );

    // The other UE is untouched
    assert_eq!(h.store.find(S1).unwrap().gmm_state, GmmState::Registered);
}

#[test]
fn scenario_c_completion() {
    let h = harness(false, true);
    h.dereg.handle_ue_originated_deregistration(S1, &request(true, 1, 3), &status()).unwrap();
    h.dereg.handle_deregistration_completion(S1).unwrap();

    let releases: Vec<_> = h
        .journal
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::NotifyRelease { .. }))
        .collect();
    assert_eq!(
        releases,
        vec![Call::NotifyRelease {
            amf_ue_ngap_id: S1,
            cause: NgapCause::nas_deregister(),
            supi: Some("imsi-999700000000001".to_string()),
        }]
    );
    assert!(!h.store.contains(S1));
    assert!(!h.dereg.remove_subscriber(S1));
    assert!(h.store.contains(S2));
}

#[test]
fn scenario_d_missing_context() {
    let h = harness(false, true);
    let result = h.dereg.handle_ue_originated_deregistration(42, &request(false, 1, 0), &status());

    assert_eq!(result, Err(AmfError::Procedure(ProcedureError::NoContext(42))));
    assert_eq!(h.journal.count(|c| matches!(c, Call::AsDataReq { .. } | Call::RegDeregistrationReq { .. })), 0);
    assert!(h.journal.counters(metrics::UE_DEREGISTER).is_empty());

    assert_eq!(
        h.dereg.handle_deregistration_completion(42),
        Err(AmfError::Procedure(ProcedureError::NoContext(42)))
    );
    assert_eq!(h.journal.count(|c| matches!(c, Call::NotifyRelease { .. })), 0);
    assert_eq!(h.store.count(), 2);
}

// ============================================================================
// Error paths
// ============================================================================

#[test]
fn invalid_access_type_never_reaches_controller() {
    let h = harness(false, true);
    for code in [0u8, 4] {
        let result = h.dereg.handle_ue_originated_deregistration(S1, &request(false, code, 1), &status());
        assert_eq!(result, Err(AmfError::Parse(ParseError::InvalidAccessType(code))));
    }
    assert!(h.journal.calls().is_empty());
    assert_eq!(h.store.find(S1).unwrap().gmm_state, GmmState::Registered);
}

#[test]
fn missing_amf_context() {
    let h = harness(false, true);
    let mut ue = AmfUe::new(3, 103);
    ue.gmm_state = GmmState::Registered;
    h.store.add(ue);

    let result = h.dereg.handle_ue_originated_deregistration(3, &request(false, 1, 0), &status());
    assert_eq!(result, Err(AmfError::Procedure(ProcedureError::NoAmfContext(3))));
    assert_eq!(h.store.find(3).unwrap().gmm_state, GmmState::Registered);
}

#[test]
fn send_failure_with_teardown_releases_ue() {
    let h = harness(true, true);
    let result = h.dereg.handle_ue_originated_deregistration(S2, &request(false, 1, 0), &status());

    assert!(matches!(result, Err(AmfError::Procedure(ProcedureError::SendFailed(_)))));
    assert!(!h.store.contains(S2));
    assert_eq!(
        h.journal.count(|c| matches!(c, Call::NotifyRelease { amf_ue_ngap_id: S2, .. })),
        1
    );
    assert!(h.journal.calls().contains(&Call::NotifyRelease {
        amf_ue_ngap_id: S2,
        cause: NgapCause::nas_deregister(),
        supi: Some("imsi-999700000000002".to_string()),
    }));
    assert_eq!(h.journal.count(|c| matches!(c, Call::GmmEvent { .. })), 0);
    assert!(h.journal.counters(metrics::UE_DEREGISTER).is_empty());
}

#[test]
fn send_failure_without_teardown_keeps_ue() {
    let h = harness(true, false);
    let result = h.dereg.handle_ue_originated_deregistration(S2, &request(false, 1, 0), &status());

    assert!(matches!(result, Err(AmfError::Procedure(ProcedureError::SendFailed(_)))));
    let ue = h.store.find(S2).unwrap();
    assert_eq!(ue.gmm_state, GmmState::Registered);
    assert_eq!(ue.security().unwrap().dl_count, 5);
    assert_eq!(h.journal.count(|c| matches!(c, Call::NotifyRelease { .. })), 0);

    assert!(h.dereg.remove_subscriber(S2));
    assert!(!h.dereg.remove_subscriber(S2));
}

#[test]
fn state_machine_rejection_is_surfaced() {
    let h = harness(false, true);
    h.dereg.handle_ue_originated_deregistration(S1, &request(true, 1, 0), &status()).unwrap();

    // Second request on a UE already de-registered
    let result = h.dereg.handle_ue_originated_deregistration(S1, &request(true, 1, 0), &status());
    assert_eq!(
        result,
        Err(AmfError::Procedure(ProcedureError::StateMachineError(GmmError::InvalidTransition {
            state: GmmState::DeRegistered,
            event: GmmEvent::Deregister,
        })))
    );
    assert!(h.store.contains(S1));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn completion_and_removal_race_releases_once() {
    for _ in 0..64 {
        let h = harness(false, true);
        let barrier = Barrier::new(3);

        let (dereg_result, completion, removed) = thread::scope(|scope| {
            let dereg = scope.spawn(|| {
                barrier.wait();
                h.dereg.handle_ue_originated_deregistration(S1, &request(true, 1, 0), &status())
            });
            let completion = scope.spawn(|| {
                barrier.wait();
                h.dereg.handle_deregistration_completion(S1)
            });
            let removed = scope.spawn(|| {
                barrier.wait();
                h.dereg.remove_subscriber(S1)
            });
            (dereg.join().unwrap(), completion.join().unwrap(), removed.join().unwrap())
        });

        // Exactly one of completion and removal owns the teardown
        assert_ne!(completion.is_ok(), removed);
        if let Err(e) = &completion {
            assert_eq!(e, &AmfError::Procedure(ProcedureError::NoContext(S1)));
        }

        let releases: Vec<_> = h
            .journal
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::NotifyRelease { amf_ue_ngap_id, cause, supi } => Some((amf_ue_ngap_id, cause, supi)),
                _ => None,
            })
            .collect();
        assert_eq!(releases.len(), usize::from(completion.is_ok()));
        for (id, _, supi) in &releases {
            assert_eq!(*id, S1);
            assert_eq!(supi.as_deref(), Some("imsi-999700000000001"));
        }

        match dereg_result {
            Ok(()) => {
                assert_eq!(h.journal.count(|c| matches!(c, Call::RegDeregistrationReq { amf_ue_ngap_id: S1 })), 1);
                assert_eq!(h.journal.count(|c| matches!(c, Call::GmmEvent { .. })), 1);
                // The procedure ran first, so the release carries its cause
                if let Some((_, cause, _)) = releases.first() {
                    assert_eq!(*cause, NgapCause::nas_deregister());
                }
            }
            Err(e) => {
                assert_eq!(e, AmfError::Procedure(ProcedureError::NoContext(S1)));
                assert_eq!(
                    h.journal.count(|c| matches!(c, Call::RegDeregistrationReq { .. } | Call::GmmEvent { .. })),
                    0
                );
            }
        }

        assert!(!h.store.contains(S1));
        assert_eq!(
            h.dereg.handle_ue_originated_deregistration(S1, &request(true, 1, 0), &status()),
            Err(AmfError::Procedure(ProcedureError::NoContext(S1)))
        );
        assert_eq!(h.store.find(S2).unwrap().gmm_state, GmmState::Registered);
    }
}

/// State handler that panics for one UE
struct PanickingGmm {
    amf_ue_ngap_id: u64,
    inner: GmmStateMachine,
}

impl UeStateHandler for PanickingGmm {
    fn handle_event(
        &self,
        current: GmmState,
        event: GmmEvent,
        session: SessionIndicator,
        amf_ue: &mut AmfUe,
        amf_ue_ngap_id: u64,
    ) -> Result<GmmState, GmmError> {
        if amf_ue_ngap_id == self.amf_ue_ngap_id {
            panic!("state handler failed for amf_ue_ngap_id={}", amf_ue_ngap_id);
        }
        self.inner.handle_event(current, event, session, amf_ue, amf_ue_ngap_id)
    }
}

#[test]
fn panicking_state_handler_leaves_store_usable() {
    let h = harness(false, true);
    let dereg = Arc::new(
        Deregistration::new(
            h.store.clone(),
            Arc::new(RecordingSap { journal: h.journal.clone(), fail_as_data: false }),
            Arc::new(PanickingGmm { amf_ue_ngap_id: S1, inner: GmmStateMachine::new() }),
            Arc::new(RecordingNgap { journal: h.journal.clone() }),
            Arc::new(RecordingCounters { journal: h.journal.clone() }),
        ),
    );

    let panicking = dereg.clone();
    let joined = thread::spawn(move || {
        panicking.handle_ue_originated_deregistration(S1, &request(true, 1, 0), &status())
    })
    .join();
    assert!(joined.is_err());

    // Other UEs still go through the full procedure
    dereg.handle_ue_originated_deregistration(S2, &request(true, 1, 0), &status()).unwrap();
    assert_eq!(h.store.find(S2).unwrap().gmm_state, GmmState::DeRegistered);
    dereg.handle_deregistration_completion(S2).unwrap();
    assert_eq!(h.journal.count(|c| matches!(c, Call::NotifyRelease { amf_ue_ngap_id: S2, .. })), 1);
    assert!(!h.store.contains(S2));

    // The UE whose handler failed is still there to be cleaned up
    assert_eq!(h.store.count(), 1);
    assert!(dereg.remove_subscriber(S1));
    assert!(!dereg.remove_subscriber(S1));
    assert_eq!(h.store.count(), 0);
}

// ============================================================================
// Downlink protection over the default SAP dispatcher
// ============================================================================

fn channel_deregistration(sec: NasSecurityContext) -> (Deregistration, mpsc::UnboundedReceiver<NgapMessage>) {
    let store = Arc::new(UeContextStore::default());
    let mut ue = AmfUe::new(S1, 101).with_security(sec);
    ue.gmm_state = GmmState::Registered;
    store.add(ue);

    let (channel, rx) = NgapChannel::new();
    let ngap = Arc::new(channel);
    let dereg = Deregistration::new(
        store,
        Arc::new(AmfSapDispatcher::new(ngap.clone())),
        Arc::new(GmmStateMachine::new()),
        ngap,
        Arc::new(AmfMetrics::new()),
    );
    (dereg, rx)
}

fn downlink_pdu(rx: &mut mpsc::UnboundedReceiver<NgapMessage>) -> Bytes {
    match rx.try_recv() {
        Ok(NgapMessage::DownlinkNasTransport { amf_ue_ngap_id, ran_ue_ngap_id, nas_pdu }) => {
            assert_eq!((amf_ue_ngap_id, ran_ue_ngap_id), (S1, 101));
            nas_pdu
        }
        other => panic!("expected DownlinkNASTransport, got {:?}", other),
    }
}

#[test]
fn accept_is_ciphered_with_nea2() {
    let sec = security(5);
    let (dereg, mut rx) = channel_deregistration(sec.clone());
    dereg.handle_ue_originated_deregistration(S1, &request(false, 1, 1), &status()).unwrap();

    let pdu = downlink_pdu(&mut rx);
    assert_eq!(pdu[0], 0x7e);
    assert_eq!(pdu[1], 0x02);
    assert_eq!(pdu[6], 5);
    assert_ne!(&pdu[7..], &[0x7e, 0x00, 0x46]);

    // Same protection as the snapshot taken before the send
    let expected = nas_protect(
        &SecurityData::from_context(&sec, false, true),
        5,
        direction::DOWNLINK,
        &build_5gmm_message(&FiveGmmMessage::DeregistrationAcceptFromUe),
    )
    .unwrap();
    assert_eq!(pdu, expected);
}

#[test]
fn accept_is_integrity_only_with_nea0() {
    let sec = NasSecurityContext { selected_enc_algorithm: algorithm::NEA0, ..security(9) };
    let (dereg, mut rx) = channel_deregistration(sec);
    dereg.handle_ue_originated_deregistration(S1, &request(false, 2, 1), &status()).unwrap();

    let pdu = downlink_pdu(&mut rx);
    assert_eq!(pdu[1], 0x01);
    assert_eq!(pdu[6], 9);
    assert_eq!(&pdu[7..], &[0x7e, 0x00, 0x46]);
    assert_eq!(dereg.store().find(S1).unwrap().security().unwrap().dl_count, 10);
}

// ============================================================================
// Event dispatcher
// ============================================================================

#[tokio::test]
async fn protected_uplink_request_releases_ue() {
    let sec = security(0);
    let (dereg, mut ngap_rx) = channel_deregistration(sec.clone());
    let amf_sm = Arc::new(AmfSm::new(Arc::new(dereg)));

    // UE side protection of the uplink request
    let plain = build_5gmm_message(&FiveGmmMessage::DeregistrationRequestFromUe(request(false, 1, 1)));
    let uplink = nas_protect(&SecurityData::from_context(&sec, false, true), 0, direction::UPLINK, &plain).unwrap();

    // Sanity check the UE-side PDU against a copy of the AMF context
    let mut check = sec.clone();
    let (decoded, decode_status) = nas_5gs_security_decode(Some(&mut check), &uplink).unwrap();
    assert_eq!(decoded, plain);
    assert!(decode_status.mac_matched);

    let (tx, rx) = mpsc::channel(4);
    let event_loop = {
        let amf_sm = amf_sm.clone();
        tokio::spawn(async move { amf_sm.run(rx).await })
    };

    tx.send(AmfEvent::uplink_nas(S1, uplink)).await.unwrap();
    tx.send(AmfEvent::UeContextReleaseComplete { amf_ue_ngap_id: S1 }).await.unwrap();
    drop(tx);
    event_loop.await.unwrap();

    assert!(matches!(ngap_rx.recv().await, Some(NgapMessage::DownlinkNasTransport { amf_ue_ngap_id: S1, .. })));
    assert_eq!(
        ngap_rx.recv().await,
        Some(NgapMessage::UeContextReleaseCommand {
            amf_ue_ngap_id: S1,
            ran_ue_ngap_id: 101,
            cause: NgapCause::nas_deregister(),
        })
    );
    assert_eq!(
        amf_sm.dispatch(&AmfEvent::UeContextReleaseComplete { amf_ue_ngap_id: S1 }),
        AmfFsmResult::Ignored
    );
}
