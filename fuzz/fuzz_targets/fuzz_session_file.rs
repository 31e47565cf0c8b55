#![no_main]
use libfuzzer_sys::fuzz_target;

use trl_engine::session::{AssessmentSession, SessionEvent};
use trl_engine::state::SessionFile;

fuzz_target!(|data: &[u8]| {
    if let Ok(file) = serde_json::from_slice::<SessionFile>(data) {
        // A session that passes validation stays valid after Evaluate.
        if file.session.check_invariants().is_ok() {
            let mut session: AssessmentSession = file.session;
            let _ = session.apply(&SessionEvent::Evaluate);
            assert!(session.check_invariants().is_ok());
            let _ = session.payload();
        }
    }
    let _ = serde_json::from_slice::<Vec<SessionEvent>>(data);
});
