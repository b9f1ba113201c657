use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

/// The two kinds of work item. Written lowercase, read in any case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Request,
    Project,
}

impl Kind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Project => "project",
        }
    }

    /// Only requests may be abandoned; projects are committed once created.
    #[must_use]
    pub const fn can_abandon(self) -> bool {
        matches!(self, Self::Request)
    }

    /// Only projects carry the archive flag.
    #[must_use]
    pub const fn can_archive(self) -> bool {
        matches!(self, Self::Project)
    }
}

/// The four lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Pending,
    #[serde(rename = "In Process", alias = "InProcess")]
    InProcess,
    Completed,
    Rejected,
}

impl Status {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProcess => "In Process",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
        }
    }

    /// Completed and rejected items are history: they fade and get purged.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

/// A caller-visible transition on a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Accept,
    Complete,
    Abandon,
    Archive,
    Unarchive,
    Delete,
}

impl Action {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Complete => "complete",
            Self::Abandon => "abandon",
            Self::Archive => "archive",
            Self::Unarchive => "unarchive",
            Self::Delete => "delete",
        }
    }

    /// Validate whether this action may be applied to `item`.
    ///
    /// Rules:
    /// - `accept` needs a pending item
    /// - `abandon` is for requests only
    /// - `archive` is for projects only
    /// - `complete`, `unarchive` and `delete` are unconditional
    pub fn check(self, item: &WorkItem) -> Result<(), InvalidTransition> {
        let reason = match self {
            Self::Accept if item.status != Status::Pending => Some("only pending items can be accepted"),
            Self::Abandon if !item.kind.can_abandon() => Some("projects cannot be abandoned"),
            Self::Archive if !item.kind.can_archive() => Some("only projects can be archived"),
            _ => None,
        };

        match reason {
            Some(reason) => Err(InvalidTransition {
                action: self,
                kind: item.kind,
                status: item.status,
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// A tracked request or project.
///
/// Field names serialize in camelCase and unknown fields are carried through
/// `extra`, so collections written by other tools survive a rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: Kind,
    pub creator: String,
    pub department: String,
    pub status: Status,
    pub users_needed: u32,
    pub users_accepted: u32,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub last_status_update: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub date_created: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for WorkItem {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            kind: Kind::Request,
            creator: String::new(),
            department: String::new(),
            status: Status::Pending,
            users_needed: 0,
            users_accepted: 0,
            archived: false,
            archived_at: None,
            last_status_update: None,
            is_expired: false,
            date_created: DateTime::<Utc>::default(),
            extra: BTreeMap::new(),
        }
    }
}

impl WorkItem {
    /// A fresh pending item, as handed to the engine by whatever created it.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        kind: Kind,
        creator: impl Into<String>,
        department: impl Into<String>,
        date_created: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            creator: creator.into(),
            department: department.into(),
            date_created,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_quorum(mut self, needed: u32, accepted: u32) -> Self {
        self.users_needed = needed;
        self.users_accepted = accepted;
        self
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `usersAccepted >= usersNeeded`. Counting itself happens elsewhere.
    #[must_use]
    pub const fn quorum_met(&self) -> bool {
        self.users_accepted >= self.users_needed
    }

    /// Structural invariants this item currently breaks, if any.
    #[must_use]
    pub fn invariant_violations(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        if self.archived && self.archived_at.is_none() {
            violations.push(InvariantViolation::ArchivedWithoutTimestamp);
        }
        if !self.archived && self.archived_at.is_some() {
            violations.push(InvariantViolation::TimestampWithoutArchive);
        }
        if self.is_expired && !self.is_terminal() {
            violations.push(InvariantViolation::ExpiredWhileActive);
        }
        violations
    }
}

/// A broken record-level invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantViolation {
    ArchivedWithoutTimestamp,
    TimestampWithoutArchive,
    ExpiredWhileActive,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ArchivedWithoutTimestamp => "archived but archivedAt is missing",
            Self::TimestampWithoutArchive => "archivedAt set on an unarchived item",
            Self::ExpiredWhileActive => "isExpired set on a non-terminal item",
        })
    }
}

/// Error returned when an action is not legal for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub action: Action,
    pub kind: Kind,
    pub status: Status,
    pub reason: &'static str,
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .to_ascii_lowercase()
}

impl FromStr for Kind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "request" => Ok(Self::Request),
            "project" => Ok(Self::Project),
            _ => Err(ParseEnumError {
                expected: "kind",
                got: s.to_string(),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for Kind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(Self::Pending),
            "inprocess" => Ok(Self::InProcess),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}
