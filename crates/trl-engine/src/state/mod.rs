pub mod atomic;
pub mod audit_log;
pub mod outbox;
pub mod store;

pub use audit_log::{verify_chain, JsonlAuditSink};
pub use outbox::FileOutbox;
pub use store::{Applied, SessionFile, SessionStore};

/// Case ids become file names: letters, digits, `-`, `_` and `.`, not
/// starting with `.`.
pub fn is_valid_case_id(case_id: &str) -> bool {
    !case_id.is_empty()
        && case_id.len() <= 128
        && !case_id.starts_with('.')
        && case_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
