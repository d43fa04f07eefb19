//! Domain types for the recruitment queue.
//!
//! Members are supplied by the host chat platform; the queue never constructs
//! or validates them beyond keying on [`MemberId`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueueError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Platform-assigned member identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for MemberId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for MemberId {
    type Err = std::num::ParseIntError;

    /// Accepts a bare id or a platform mention (`<@id>` / `<@!id>`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let inner = s
            .strip_prefix("<@")
            .and_then(|rest| rest.strip_suffix('>'))
            .map(|rest| rest.strip_prefix('!').unwrap_or(rest))
            .unwrap_or(s);
        inner.parse::<u64>().map(Self)
    }
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// A platform member handle: id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
}

impl Member {
    pub fn new(id: impl Into<MemberId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Platform mention token, e.g. `<@42>`.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name.fmt(f)
    }
}

/// What the queue stores per entry.
///
/// `Unresolved` holds a persisted id the member directory could not map to a
/// live member at load time. It is upgraded by
/// [`RecruitQueue::resolve_members`](crate::queue::RecruitQueue::resolve_members)
/// once the directory learns about it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRef {
    Resolved(Member),
    Unresolved(MemberId),
}

impl MemberRef {
    pub fn id(&self) -> MemberId {
        match self {
            MemberRef::Resolved(member) => member.id,
            MemberRef::Unresolved(id) => *id,
        }
    }

    pub fn member(&self) -> Option<&Member> {
        match self {
            MemberRef::Resolved(member) => Some(member),
            MemberRef::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, MemberRef::Resolved(_))
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id())
    }
}

impl From<Member> for MemberRef {
    fn from(member: Member) -> Self {
        MemberRef::Resolved(member)
    }
}

impl From<MemberId> for MemberRef {
    fn from(id: MemberId) -> Self {
        MemberRef::Unresolved(id)
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberRef::Resolved(member) => member.fmt(f),
            MemberRef::Unresolved(id) => write!(f, "unknown member ({id})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Queue state of a member. Persisted and displayed as the uppercase label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecruitmentStatus {
    Ready,
    Active,
}

impl RecruitmentStatus {
    pub const ALL: [RecruitmentStatus; 2] = [RecruitmentStatus::Ready, RecruitmentStatus::Active];

    /// Uppercase label, as stored in the persistence file.
    pub fn label(self) -> &'static str {
        match self {
            RecruitmentStatus::Ready => "READY",
            RecruitmentStatus::Active => "ACTIVE",
        }
    }

    /// Case-insensitive label match. `None` for anything outside the enumeration.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(label))
    }

    /// Exact, case-sensitive match used by the persistence loader.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.label() == label)
    }

    /// Comma-separated list of every valid label.
    pub fn valid_labels() -> String {
        Self::ALL
            .iter()
            .map(|status| status.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for RecruitmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RecruitmentStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| QueueError::InvalidStatus {
            label: s.trim().to_uppercase(),
            valid: Self::valid_labels(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
