#![allow(clippy::doc_markdown)]

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of gating questions in the fixed sequence.
pub const GATING_QUESTION_COUNT: u8 = 7;

/// Highest readiness level.
pub const MAX_TRL: u8 = 9;

/// 0-based position of a gating question, constrained to 0..=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuestionIndex(u8);

impl QuestionIndex {
    pub const FIRST: QuestionIndex = QuestionIndex(0);

    pub const fn new(index: u8) -> Option<Self> {
        if index < GATING_QUESTION_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// 1-based number used in payload field names (`rq1` .. `rq7`).
    pub fn number(self) -> u8 {
        self.0 + 1
    }

    pub fn all() -> impl Iterator<Item = QuestionIndex> {
        (0..GATING_QUESTION_COUNT).map(QuestionIndex)
    }
}

impl fmt::Display for QuestionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl Serialize for QuestionIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QuestionIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        QuestionIndex::new(v).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "question index {v} not in 0..{GATING_QUESTION_COUNT}"
            ))
        })
    }
}

/// Technology Readiness Level, constrained to 1..=9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrlLevel(u8);

impl TrlLevel {
    pub const FLOOR: TrlLevel = TrlLevel(1);
    pub const CEILING: TrlLevel = TrlLevel(MAX_TRL);

    pub const fn new(level: u8) -> Option<Self> {
        if level >= 1 && level <= MAX_TRL {
            Some(Self(level))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The next level down, or `None` at the floor.
    pub fn below(self) -> Option<Self> {
        Self::new(self.0 - 1)
    }

    pub fn is_floor(self) -> bool {
        self == Self::FLOOR
    }

    pub fn all() -> impl Iterator<Item = TrlLevel> {
        (1..=MAX_TRL).map(TrlLevel)
    }
}

impl fmt::Display for TrlLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TRL {}", self.0)
    }
}

impl Serialize for TrlLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TrlLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        TrlLevel::new(v)
            .ok_or_else(|| serde::de::Error::custom(format!("TRL level {v} not in 1..={MAX_TRL}")))
    }
}

/// 1-based position of a criterion within its level's checklist.
///
/// Only the lower bound is checked here; the upper bound depends on the
/// checklist and is checked against the catalog via [`CriterionKey::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CriterionId(u8);

impl CriterionId {
    pub fn new(id: u8) -> Option<Self> {
        (id >= 1).then_some(Self(id))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// 0-based position in the indicator array.
    pub fn position(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub(crate) fn from_position(pos: usize) -> Self {
        Self(pos as u8 + 1)
    }
}

impl TryFrom<u8> for CriterionId {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        CriterionId::new(v).ok_or_else(|| "criterion ids start at 1".to_string())
    }
}

impl From<CriterionId> for u8 {
    fn from(id: CriterionId) -> u8 {
        id.0
    }
}

impl fmt::Display for CriterionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A criterion addressed by level and id. Always refers to a criterion
/// that exists in the catalog: the only ways in are [`CriterionKey::new`]
/// and a validating `Deserialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CriterionKey {
    level: TrlLevel,
    id: CriterionId,
}

impl CriterionKey {
    pub fn new(level: TrlLevel, id: CriterionId) -> Option<Self> {
        (id.position() < crate::catalog::checklist(level).len()).then_some(Self { level, id })
    }

    pub fn level(self) -> TrlLevel {
        self.level
    }

    pub fn id(self) -> CriterionId {
        self.id
    }

    /// Build a key from raw numbers, as typed by a user.
    pub fn parse(level: u8, id: u8) -> Option<Self> {
        Self::new(TrlLevel::new(level)?, CriterionId::new(id)?)
    }
}

impl<'de> Deserialize<'de> for CriterionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            level: TrlLevel,
            id: CriterionId,
        }
        let raw = Raw::deserialize(deserializer)?;
        CriterionKey::new(raw.level, raw.id).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "criterion {} does not exist at {}",
                raw.id, raw.level
            ))
        })
    }
}

impl fmt::Display for CriterionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cq{}-{}", self.level.0, self.id.0)
    }
}

/// Outcome of one gating-table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatingOutcome {
    /// Continue the gating sequence.
    NextQuestion(QuestionIndex),
    /// Stop gating and open the checklist at this level.
    StartLevel(TrlLevel),
}

/// Opaque reference to an uploaded evidence file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceRef(String);

impl EvidenceRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EvidenceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a piece of evidence is attached to.
///
/// String form is the payload key: `rq{n}` (1-based question number) or
/// `cq{level}-{criterion}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EvidenceKey {
    Gating(QuestionIndex),
    Criterion(CriterionKey),
}

impl EvidenceKey {
    pub fn level(&self) -> Option<TrlLevel> {
        match self {
            EvidenceKey::Gating(_) => None,
            EvidenceKey::Criterion(key) => Some(key.level()),
        }
    }
}

impl fmt::Display for EvidenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvidenceKey::Gating(q) => write!(f, "rq{}", q.number()),
            EvidenceKey::Criterion(key) => write!(f, "{key}"),
        }
    }
}

impl FromStr for EvidenceKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid evidence key '{s}' (expected rqN or cqL-C)");
        if let Some(num) = s.strip_prefix("rq") {
            let n: u8 = num.parse().map_err(|_| invalid())?;
            let q = n
                .checked_sub(1)
                .and_then(QuestionIndex::new)
                .ok_or_else(invalid)?;
            return Ok(EvidenceKey::Gating(q));
        }
        if let Some(rest) = s.strip_prefix("cq") {
            let (level, id) = rest.split_once('-').ok_or_else(invalid)?;
            let level: u8 = level.parse().map_err(|_| invalid())?;
            let id: u8 = id.parse().map_err(|_| invalid())?;
            return CriterionKey::parse(level, id)
                .map(EvidenceKey::Criterion)
                .ok_or_else(invalid);
        }
        Err(invalid())
    }
}

impl Serialize for EvidenceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EvidenceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
