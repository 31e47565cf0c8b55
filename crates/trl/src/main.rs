#![forbid(unsafe_code)]

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use trl_core::catalog;
use trl_core::config::load_workspace_config;
use trl_core::state::{AssessmentResult, GatingAnswer, Outcome, SessionPhase, Transition};
use trl_core::traits::CaseBackend;
use trl_core::types::{CriterionId, CriterionKey, EvidenceKey, EvidenceRef, QuestionIndex, TrlLevel};
use trl_engine::session::{replay, AssessmentSession, EvidenceTracker, SessionEvent};
use trl_engine::state::{audit_log, verify_chain, FileOutbox, SessionFile, SessionStore};

#[derive(Parser)]
#[command(
    name = "trl",
    version,
    about = "Technology Readiness Level assessments: gating questions, checklist descent, evidence."
)]
struct Cli {
    /// Session directory (overrides .trl/config.json).
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). TRL_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the gating questions and TRL checklists.
    Catalog {
        /// Only this level's checklist.
        #[arg(long)]
        level: Option<u8>,

        /// Output JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create an empty assessment session.
    New {
        case: String,

        /// Replace an existing session.
        #[arg(long)]
        force: bool,
    },

    /// Answer a gating question.
    Answer {
        case: String,

        /// Question index (0-6).
        #[arg(long)]
        question: u8,

        /// yes or no.
        #[arg(long, value_parser = parse_yes_no, action = ArgAction::Set)]
        value: bool,
    },

    /// Check (or uncheck) a checklist criterion.
    Check {
        case: String,

        /// TRL level of the checklist (1-9).
        #[arg(long)]
        level: u8,

        /// Criterion id (1-based).
        #[arg(long)]
        criterion: u8,

        /// Clear the criterion instead of checking it.
        #[arg(long)]
        uncheck: bool,
    },

    /// Evaluate the current checklist.
    Evaluate { case: String },

    /// Attach an evidence reference to an answer or criterion.
    Attach {
        case: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Evidence reference (file name, URL, document id).
        #[arg(long)]
        evidence: String,
    },

    /// Remove the evidence attached to an answer or criterion.
    Detach {
        case: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Show phase, result, answers, and checklist trail.
    Status {
        case: String,

        /// Output JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the result payload as JSON.
    Payload { case: String },

    /// Hand the result payload to the submission outbox.
    Submit {
        case: String,

        /// Outbox directory.
        #[arg(long)]
        outbox: PathBuf,
    },

    /// Apply an event script to a fresh session.
    Replay {
        /// Path to script .json (or "-" for stdin).
        #[arg(default_value = "-")]
        script: String,

        /// Output a single JSON report.
        #[arg(long)]
        json: bool,
    },

    /// Show or verify a case's audit log.
    Audit {
        case: String,

        /// Verify hash chain integrity.
        #[arg(long)]
        verify: bool,
    },
}

/// Evidence target: a gating question or a checklist criterion.
#[derive(Args)]
#[group(required = true, multiple = true)]
struct TargetArgs {
    /// Gating question index (0-6).
    #[arg(long, conflicts_with_all = ["level", "criterion"])]
    question: Option<u8>,

    /// TRL level (with --criterion).
    #[arg(long, requires = "criterion")]
    level: Option<u8>,

    /// Criterion id (with --level).
    #[arg(long, requires = "level")]
    criterion: Option<u8>,
}

fn parse_yes_no(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" => Ok(true),
        "no" | "n" | "false" => Ok(false),
        _ => Err(format!("expected yes or no, got '{s}'")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Cmd::Catalog { level, json } => cmd_catalog(level, json),

        Cmd::New { case, force } => cmd_new(cli.dir.as_deref(), &case, force),

        Cmd::Answer {
            case,
            question,
            value,
        } => {
            let event = SessionEvent::Answer {
                question: question_index(question)?,
                value,
            };
            cmd_apply(cli.dir.as_deref(), &case, &event)
        }

        Cmd::Check {
            case,
            level,
            criterion,
            uncheck,
        } => {
            let key = criterion_key(level, criterion)?;
            let event = SessionEvent::SetCriterion {
                level: key.level(),
                criterion: key.id(),
                checked: !uncheck,
            };
            cmd_apply(cli.dir.as_deref(), &case, &event)
        }

        Cmd::Evaluate { case } => cmd_apply(cli.dir.as_deref(), &case, &SessionEvent::Evaluate),

        Cmd::Attach {
            case,
            target,
            evidence,
        } => {
            if evidence.trim().is_empty() {
                bail!("evidence reference must not be empty");
            }
            let event = SessionEvent::AttachEvidence {
                target: target.key()?,
                evidence: EvidenceRef::new(evidence),
            };
            cmd_apply(cli.dir.as_deref(), &case, &event)
        }

        Cmd::Detach { case, target } => {
            let event = SessionEvent::DetachEvidence {
                target: target.key()?,
            };
            cmd_apply(cli.dir.as_deref(), &case, &event)
        }

        Cmd::Status { case, json } => cmd_status(cli.dir.as_deref(), &case, json),

        Cmd::Payload { case } => cmd_payload(cli.dir.as_deref(), &case),

        Cmd::Submit { case, outbox } => cmd_submit(cli.dir.as_deref(), &case, &outbox),

        Cmd::Replay { script, json } => cmd_replay(&script, json),

        Cmd::Audit { case, verify } => cmd_audit(cli.dir.as_deref(), &case, verify),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("TRL_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

// ── Argument helpers ────────────────────────────────────────────

fn question_index(question: u8) -> Result<QuestionIndex> {
    QuestionIndex::new(question).ok_or_else(|| anyhow!("question must be 0-6, got {question}"))
}

fn trl_level(level: u8) -> Result<TrlLevel> {
    TrlLevel::new(level).ok_or_else(|| anyhow!("level must be 1-9, got {level}"))
}

fn criterion_key(level: u8, criterion: u8) -> Result<CriterionKey> {
    let level = trl_level(level)?;
    let count = catalog::checklist(level).len();
    CriterionId::new(criterion)
        .and_then(|id| CriterionKey::new(level, id))
        .ok_or_else(|| anyhow!("{level} has criteria 1-{count}, got {criterion}"))
}

impl TargetArgs {
    fn key(&self) -> Result<EvidenceKey> {
        match (self.question, self.level, self.criterion) {
            (Some(q), None, None) => Ok(EvidenceKey::Gating(question_index(q)?)),
            (None, Some(level), Some(criterion)) => {
                Ok(EvidenceKey::Criterion(criterion_key(level, criterion)?))
            }
            _ => bail!("give either --question or --level with --criterion"),
        }
    }
}

fn open_store(dir: Option<&Path>) -> Result<SessionStore> {
    let config = load_workspace_config(Path::new("."))?;
    let dir = dir.map(Path::to_path_buf).unwrap_or(config.session_dir);
    Ok(SessionStore::new(dir, config.audit))
}

// ── Commands ────────────────────────────────────────────────────

fn cmd_catalog(level: Option<u8>, json_out: bool) -> Result<()> {
    let levels: Vec<TrlLevel> = match level {
        Some(l) => vec![trl_level(l)?],
        None => TrlLevel::all().collect(),
    };

    if json_out {
        let checklists: Vec<_> = levels
            .iter()
            .map(|&level| {
                serde_json::json!({
                    "level": level,
                    "criteria": catalog::criteria(level).collect::<Vec<_>>(),
                })
            })
            .collect();
        let out = if level.is_some() {
            serde_json::json!({ "checklists": checklists })
        } else {
            serde_json::json!({
                "gating_questions": catalog::gating_questions().collect::<Vec<_>>(),
                "checklists": checklists,
            })
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if level.is_none() {
        println!("Gating questions:");
        for q in catalog::gating_questions() {
            println!("  [{}] {}", q.index.get(), q.prompt);
        }
        println!();
    }
    for level in levels {
        println!("{level} checklist:");
        for c in catalog::criteria(level) {
            println!("  [{}] {}", c.id, c.label);
        }
    }
    Ok(())
}

fn cmd_new(dir: Option<&Path>, case: &str, force: bool) -> Result<()> {
    let store = open_store(dir)?;
    store.create(case, force)?;
    eprintln!("  created session {case} in {}", store.dir().display());
    print_next_step(&AssessmentSession::new());
    Ok(())
}

fn cmd_apply(dir: Option<&Path>, case: &str, event: &SessionEvent) -> Result<()> {
    let store = open_store(dir)?;
    let applied = store.apply(case, event)?;
    debug!(
        case,
        kind = applied.transition.kind(),
        rev = applied.file.state_rev,
        "transition persisted"
    );
    eprintln!("  {}", describe(&applied.transition));
    if let Some(rollback) = applied.transition.rollback() {
        eprintln!(
            "  rollback: {} answer(s), {} checklist(s), {} evidence reference(s) discarded",
            rollback.answers.len(),
            rollback.levels.len(),
            rollback.evidence.len()
        );
        if rollback.outcome_reset {
            eprintln!("  previous result cleared");
        }
    }
    print_next_step(&applied.file.session);
    Ok(())
}

fn cmd_status(dir: Option<&Path>, case: &str, json_out: bool) -> Result<()> {
    let store = open_store(dir)?;
    let file = store.load(case)?;

    if json_out {
        println!("{}", serde_json::to_string_pretty(&StatusReport::new(&file))?);
        return Ok(());
    }

    let session = &file.session;
    let result = session.result();
    eprintln!("  Case:      {}", file.case_id);
    eprintln!("  State rev: {}", file.state_rev);
    eprintln!("  Updated:   {}", timestamp(file.updated_at));
    eprintln!("  Phase:     {}", describe_phase(session.phase()));
    if result.resolved {
        eprintln!("  Result:    TRL {}", result.trl_level);
    } else if session.outcome() == Outcome::FloorReached {
        eprintln!("  Result:    unresolved (TRL 1 checklist incomplete)");
    } else {
        eprintln!("  Result:    unresolved");
    }
    for answer in session.answers() {
        let value = if answer.value { "yes" } else { "no" };
        match session.gating_evidence(answer.question) {
            Some(evidence) => eprintln!("  {}: {value} [{evidence}]", answer.question),
            None => eprintln!("  {}: {value}", answer.question),
        }
    }
    for step in session.steps() {
        let marks: String = step
            .indicators()
            .iter()
            .map(|&c| if c { 'x' } else { '.' })
            .collect();
        let state = if step.is_complete() { "complete" } else { "incomplete" };
        eprintln!("  {}: [{marks}] {state}", step.level);
        for key in step.checked_keys() {
            let label = catalog::criterion_label(key);
            match session.evidence().get(EvidenceKey::Criterion(key)) {
                Some(evidence) => eprintln!("    {key} {label} [{evidence}]"),
                None => eprintln!("    {key} {label}"),
            }
        }
    }
    if !session.evidence().is_empty() {
        eprintln!("  Evidence:  {} reference(s)", session.evidence().len());
    }
    Ok(())
}

#[derive(Serialize)]
struct StepReport {
    level: TrlLevel,
    checked: Vec<bool>,
    complete: bool,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    case_id: &'a str,
    state_rev: u64,
    updated_at: DateTime<Utc>,
    phase: SessionPhase,
    outcome: Outcome,
    result: AssessmentResult,
    answers: &'a [GatingAnswer],
    steps: Vec<StepReport>,
    evidence: &'a EvidenceTracker,
}

impl<'a> StatusReport<'a> {
    fn new(file: &'a SessionFile) -> Self {
        let session = &file.session;
        Self {
            case_id: &file.case_id,
            state_rev: file.state_rev,
            updated_at: file.updated_at,
            phase: session.phase(),
            outcome: session.outcome(),
            result: session.result(),
            answers: session.answers(),
            steps: session
                .steps()
                .iter()
                .map(|step| StepReport {
                    level: step.level,
                    checked: step.indicators().to_vec(),
                    complete: step.is_complete(),
                })
                .collect(),
            evidence: session.evidence(),
        }
    }
}

fn cmd_payload(dir: Option<&Path>, case: &str) -> Result<()> {
    let store = open_store(dir)?;
    let file = store.load(case)?;
    println!("{}", serde_json::to_string_pretty(&file.session.payload())?);
    Ok(())
}

fn cmd_submit(dir: Option<&Path>, case: &str, outbox_dir: &Path) -> Result<()> {
    let store = open_store(dir)?;
    let file = store.load(case)?;
    if !file.session.result().resolved {
        eprintln!("  warning: submitting an unresolved assessment (trl_level_result = null)");
    }
    let outbox = FileOutbox::new(outbox_dir);
    outbox.submit(case, &file.session.payload())?;
    info!(case, state_rev = file.state_rev, "payload handed to outbox");
    eprintln!("  submitted {case} to {}", outbox.submission_path(case).display());
    Ok(())
}

fn read_script(path: &str) -> Result<Vec<SessionEvent>> {
    let content = if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("cannot read {path}"))?
    };
    serde_json::from_str(&content).with_context(|| format!("invalid event script {path}"))
}

fn cmd_replay(path: &str, json_out: bool) -> Result<()> {
    let events = read_script(path)?;
    let (session, entries) = replay(&events);

    if json_out {
        let report = serde_json::json!({
            "entries": entries,
            "phase": session.phase(),
            "result": session.result(),
            "payload": session.payload(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for entry in &entries {
        match (&entry.transition, &entry.rejected) {
            (Some(t), _) => eprintln!("  [{}] {}", entry.index, describe(t)),
            (None, Some(reason)) => eprintln!("  [{}] rejected: {reason}", entry.index),
            (None, None) => {}
        }
    }
    eprintln!("  Phase:  {}", describe_phase(session.phase()));
    let result = session.result();
    if result.resolved {
        eprintln!("  Result: TRL {}", result.trl_level);
    } else {
        eprintln!("  Result: unresolved");
    }
    println!("{}", serde_json::to_string_pretty(&session.payload())?);
    Ok(())
}

fn cmd_audit(dir: Option<&Path>, case: &str, verify: bool) -> Result<()> {
    let store = open_store(dir)?;
    let path = store.audit_path(case)?;
    if !path.exists() {
        eprintln!("  no audit log found at {}", path.display());
        return Ok(());
    }

    if verify {
        let count = verify_chain(&path)?;
        eprintln!("  audit chain valid ({count} entries)");
        return Ok(());
    }

    for record in audit_log::read_records(&path)? {
        let result = if record.resolved {
            format!("TRL {}", record.trl_level)
        } else {
            "unresolved".to_string()
        };
        println!(
            "{}  rev {:>3}  {:<18} {}",
            timestamp(record.ts),
            record.state_rev,
            record.event_type,
            result
        );
    }
    Ok(())
}

// ── Rendering ───────────────────────────────────────────────────

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn describe(transition: &Transition) -> String {
    let yes_no = |v: bool| if v { "yes" } else { "no" };
    match transition {
        Transition::Unchanged => "no change".to_string(),
        Transition::NextQuestion {
            answered,
            value,
            next,
            ..
        } => format!("{answered} = {}; next question {next}", yes_no(*value)),
        Transition::ChecklistOpened {
            answered,
            value,
            level,
            ..
        } => format!("{answered} = {}; {level} checklist opened", yes_no(*value)),
        Transition::CriterionSet {
            criterion,
            checked,
            complete,
            ..
        } => {
            let verb = if *checked { "checked" } else { "unchecked" };
            let state = if *complete { "complete" } else { "incomplete" };
            format!("{criterion} {verb}; {} checklist {state}", criterion.level())
        }
        Transition::Descended { from, to } => {
            format!("{from} checklist incomplete; descended to {to}")
        }
        Transition::Resolved { level } => format!("assessment resolved at {level}"),
        Transition::FloorReached => {
            "TRL 1 checklist incomplete; assessment cannot resolve".to_string()
        }
        Transition::EvidenceAttached {
            target,
            evidence,
            replaced,
        } => match replaced {
            Some(old) => format!("evidence {evidence} attached to {target} (replaced {old})"),
            None => format!("evidence {evidence} attached to {target}"),
        },
        Transition::EvidenceDetached { target, evidence } => {
            format!("evidence {evidence} detached from {target}")
        }
    }
}

fn describe_phase(phase: SessionPhase) -> String {
    match phase {
        SessionPhase::Gating { question } => format!("gating ({question} pending)"),
        SessionPhase::ChecklistOpen { level } => format!("{level} checklist open"),
        SessionPhase::Resolved { level } => format!("resolved at {level}"),
    }
}

fn print_next_step(session: &AssessmentSession) {
    match session.phase() {
        SessionPhase::Gating { question } => {
            let q = catalog::gating_question(question);
            eprintln!("  next: {question} (--question {}) {}", question.get(), q.prompt);
        }
        SessionPhase::ChecklistOpen { level } => {
            let open = session
                .step(level)
                .map(|s| s.indicators().iter().filter(|&&c| !c).count())
                .unwrap_or(0);
            eprintln!("  next: {level} checklist, {open} criterion(s) unchecked");
        }
        SessionPhase::Resolved { .. } => {}
    }
}
