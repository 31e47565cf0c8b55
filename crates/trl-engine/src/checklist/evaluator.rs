use trl_core::catalog;
use trl_core::types::TrlLevel;

/// True iff every criterion of `level`'s checklist is checked.
///
/// Missing indicators count as unchecked; indicators past the end of the
/// checklist are ignored.
pub fn is_complete(level: TrlLevel, indicators: &[bool]) -> bool {
    let len = catalog::checklist(level).len();
    (0..len).all(|i| indicators.get(i).copied().unwrap_or(false))
}
