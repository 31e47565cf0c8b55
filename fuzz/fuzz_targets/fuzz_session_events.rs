#![no_main]
use libfuzzer_sys::fuzz_target;

use trl_core::types::{CriterionId, EvidenceKey, EvidenceRef, QuestionIndex, TrlLevel};
use trl_engine::session::{AssessmentSession, SessionEvent};

// Each 3-byte chunk decodes to one event.
fn decode(chunk: &[u8]) -> Option<SessionEvent> {
    let (op, a, b) = (chunk[0], chunk[1], chunk[2]);
    let question = QuestionIndex::new(a % 7)?;
    let level = TrlLevel::new(a % 9 + 1)?;
    let criterion = CriterionId::new(b % 5 + 1)?;
    Some(match op % 6 {
        0 => SessionEvent::Answer {
            question,
            value: b & 1 == 1,
        },
        1 => SessionEvent::SetCriterion {
            level,
            criterion,
            checked: op & 0x80 != 0,
        },
        2 => SessionEvent::Toggle { level, criterion },
        3 => SessionEvent::Evaluate,
        4 => SessionEvent::AttachEvidence {
            target: EvidenceKey::Gating(question),
            evidence: EvidenceRef::new(format!("ref-{b}")),
        },
        _ => SessionEvent::DetachEvidence {
            target: EvidenceKey::Gating(question),
        },
    })
}

fuzz_target!(|data: &[u8]| {
    let mut session = AssessmentSession::new();
    for chunk in data.chunks_exact(3) {
        let Some(event) = decode(chunk) else { continue };
        let before = session.clone();
        if session.apply(&event).is_err() {
            assert_eq!(session, before, "rejected {event:?} mutated the session");
        }
        if let Err(e) = session.check_invariants() {
            panic!("{e} after {event:?}");
        }
        let _ = session.payload();
    }
});
