use trl_core::types::{GatingOutcome, QuestionIndex, TrlLevel};

// Evaluated at compile time: an out-of-range literal fails the build.
const fn ask(index: u8) -> GatingOutcome {
    match QuestionIndex::new(index) {
        Some(question) => GatingOutcome::NextQuestion(question),
        None => panic!("gating table names a question out of range"),
    }
}

const fn start(level: u8) -> GatingOutcome {
    match TrlLevel::new(level) {
        Some(level) => GatingOutcome::StartLevel(level),
        None => panic!("gating table names a level out of range"),
    }
}

/// One row per question: outcome for "yes", outcome for "no".
const TABLE: [(GatingOutcome, GatingOutcome); 7] = [
    (ask(1), ask(6)),
    (ask(2), ask(5)),
    (ask(3), ask(4)),
    (ask(4), start(7)),
    (start(9), start(8)),
    (start(5), start(4)),
    (start(3), start(2)),
];

/// Deterministic gating lookup.
///
/// Total over every `(question, answer)` pair: each answer either names the
/// next question or the level at which checklist descent starts.
pub fn route(question: QuestionIndex, answer: bool) -> GatingOutcome {
    let (yes, no) = TABLE[usize::from(question.get())];
    if answer {
        yes
    } else {
        no
    }
}

/// Replay a sequence of answers from question 0, returning the outcome of
/// each step. Returns `None` if an answer is given after gating finished.
pub fn walk(answers: &[bool]) -> Option<Vec<(QuestionIndex, GatingOutcome)>> {
    let mut out = Vec::with_capacity(answers.len());
    let mut current = Some(QuestionIndex::FIRST);
    for &answer in answers {
        let question = current?;
        let outcome = route(question, answer);
        current = match outcome {
            GatingOutcome::NextQuestion(next) => Some(next),
            GatingOutcome::StartLevel(_) => None,
        };
        out.push((question, outcome));
    }
    Some(out)
}
