//! The recruitment queue: member → status, plus the single active slot.
//!
//! # Invariants
//!
//! - `active` is `Some` iff exactly one entry is `ACTIVE`, and it names that entry.
//! - At most one entry per [`MemberId`].
//!
//! Every mutating method either upholds both or returns an error with the
//! queue untouched. Nothing here performs I/O; see [`crate::registry`] for the
//! write-through wrapper.

use std::fmt;

use crate::directory::MemberDirectory;
use crate::error::QueueError;
use crate::types::{Member, MemberId, MemberRef, RecruitmentStatus};

/// One queue row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub member: MemberRef,
    pub status: RecruitmentStatus,
}

/// Result of a successful `set_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub member: MemberRef,
    /// `None` when the member had no entry.
    pub previous: Option<RecruitmentStatus>,
    /// `None` when the member was removed.
    pub current: Option<RecruitmentStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecruitQueue {
    entries: Vec<Entry>,
    active: Option<MemberId>,
}

impl RecruitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from persisted pairs, in order.
    ///
    /// A repeated id overwrites the earlier status in place (the YAML loader
    /// already rejects duplicate keys, so only in-memory callers hit this).
    /// If more than one entry claims `ACTIVE`, the first keeps it and the
    /// rest are demoted to `READY`; the demoted members are returned so the
    /// caller can report them.
    pub fn restore(
        pairs: impl IntoIterator<Item = (MemberRef, RecruitmentStatus)>,
    ) -> (Self, Vec<MemberRef>) {
        let mut queue = Self::new();
        let mut demoted = Vec::new();
        for (member, status) in pairs {
            let id = member.id();
            if queue.active == Some(id) {
                queue.active = None;
            }
            let status = match (status, queue.active) {
                (RecruitmentStatus::Active, Some(_)) => {
                    demoted.push(member.clone());
                    RecruitmentStatus::Ready
                }
                (RecruitmentStatus::Active, None) => {
                    queue.active = Some(id);
                    status
                }
                (status, _) => status,
            };
            match queue.position(id) {
                Some(pos) => queue.entries[pos] = Entry { member, status },
                None => queue.entries.push(Entry { member, status }),
            }
        }
        (queue, demoted)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Set, overwrite or (with `None`) remove a member's status.
    ///
    /// - `None`: removes the entry; fails with [`QueueError::NotFound`] if absent.
    /// - `ACTIVE`: fails with [`QueueError::ActiveConflict`] if a different
    ///   member holds the active slot. Re-activating the active member is a
    ///   no-op success.
    /// - `READY`: creates or overwrites; overwriting the active member frees
    ///   the slot.
    pub fn set_status(
        &mut self,
        member: impl Into<MemberRef>,
        status: Option<RecruitmentStatus>,
    ) -> Result<Transition, QueueError> {
        let member = member.into();
        let transition = match status {
            None => self.take(member)?,
            Some(status) => self.put(member, status)?,
        };
        debug_assert!(self.check_invariants().is_ok());
        Ok(transition)
    }

    /// `set_status(member, None)`.
    pub fn remove(&mut self, member: impl Into<MemberRef>) -> Result<Transition, QueueError> {
        self.set_status(member, None)
    }

    fn take(&mut self, member: MemberRef) -> Result<Transition, QueueError> {
        let id = member.id();
        let Some(pos) = self.position(id) else {
            return Err(QueueError::NotFound {
                member: member.to_string(),
            });
        };
        let entry = self.entries.remove(pos);
        if self.active == Some(id) {
            self.active = None;
        }
        Ok(Transition {
            member: entry.member,
            previous: Some(entry.status),
            current: None,
        })
    }

    fn put(&mut self, member: MemberRef, status: RecruitmentStatus) -> Result<Transition, QueueError> {
        let id = member.id();
        if status == RecruitmentStatus::Active {
            if let Some(incumbent) = self.active.filter(|active| *active != id) {
                return Err(QueueError::ActiveConflict {
                    incumbent: self.display_name(incumbent),
                });
            }
        }

        let (pos, previous) = match self.position(id) {
            Some(pos) => {
                let entry = &mut self.entries[pos];
                let previous = entry.status;
                entry.status = status;
                // Keep a resolved handle rather than downgrading to a bare id.
                if member.is_resolved() {
                    entry.member = member;
                }
                (pos, Some(previous))
            }
            None => {
                self.entries.push(Entry { member, status });
                (self.entries.len() - 1, None)
            }
        };

        match status {
            RecruitmentStatus::Active => self.active = Some(id),
            RecruitmentStatus::Ready => {
                if self.active == Some(id) {
                    self.active = None;
                }
            }
        }

        Ok(Transition {
            member: self.entries[pos].member.clone(),
            previous,
            current: Some(status),
        })
    }

    /// Upgrade unresolved placeholders the directory now knows about.
    /// Returns how many entries were resolved.
    pub fn resolve_members(&mut self, directory: &dyn MemberDirectory) -> usize {
        let mut resolved = 0;
        for entry in &mut self.entries {
            if let MemberRef::Unresolved(id) = entry.member {
                if let Some(member) = directory.lookup(id) {
                    entry.member = MemberRef::Resolved(member);
                    resolved += 1;
                }
            }
        }
        resolved
    }

    /// Refresh the stored handle for a member seen on the platform.
    /// Returns `true` if an entry was updated.
    pub fn observe(&mut self, member: &Member) -> bool {
        match self.position(member.id) {
            Some(pos) if self.entries[pos].member.member() != Some(member) => {
                self.entries[pos].member = MemberRef::Resolved(member.clone());
                true
            }
            _ => false,
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn active_member(&self) -> Option<&MemberRef> {
        let id = self.active?;
        self.entry(id).map(|entry| &entry.member)
    }

    pub fn status_of(&self, id: MemberId) -> Option<RecruitmentStatus> {
        self.entry(id).map(|entry| entry.status)
    }

    pub fn contains(&self, id: MemberId) -> bool {
        self.position(id).is_some()
    }

    pub fn entry(&self, id: MemberId) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.member.id() == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.iter()
    }

    /// Members currently holding `status`, in insertion order. Lazy; each call
    /// re-reads the current state.
    pub fn list_by_status(
        &self,
        status: RecruitmentStatus,
    ) -> impl Iterator<Item = &MemberRef> + '_ {
        self.entries
            .iter()
            .filter(move |entry| entry.status == status)
            .map(|entry| &entry.member)
    }

    /// Display projection: the active member first, then everyone else.
    pub fn render(&self) -> Roster {
        Roster {
            active: self.active_member().map(|member| member.to_string()),
            rows: self
                .entries
                .iter()
                .filter(|entry| entry.status != RecruitmentStatus::Active)
                .map(|entry| RosterRow {
                    name: entry.member.to_string(),
                    status: entry.status,
                })
                .collect(),
        }
    }

    /// Verify both queue invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.member.id()) {
                return Err(format!("duplicate entry for member {}", entry.member.id()));
            }
        }

        let active: Vec<MemberId> = self
            .list_by_status(RecruitmentStatus::Active)
            .map(MemberRef::id)
            .collect();
        match (active.as_slice(), self.active) {
            ([], None) => Ok(()),
            ([only], Some(slot)) if *only == slot => Ok(()),
            (entries, slot) => Err(format!(
                "active slot {slot:?} disagrees with ACTIVE entries {entries:?}"
            )),
        }
    }

    fn position(&self, id: MemberId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.member.id() == id)
    }

    fn display_name(&self, id: MemberId) -> String {
        self.entry(id)
            .map(|entry| entry.member.to_string())
            .unwrap_or_else(|| MemberRef::Unresolved(id).to_string())
    }
}

// ---------------------------------------------------------------------------
// Roster (render output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub name: String,
    pub status: RecruitmentStatus,
}

/// Two-column name/status listing with the active member pulled out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    pub active: Option<String>,
    /// Non-active entries only.
    pub rows: Vec<RosterRow>,
}

impl Roster {
    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.rows.is_empty()
    }
}

impl fmt::Display for Roster {
    /// Chat-markdown body: header line, bold active row, then one row per entry.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name:\t\t\t\tStatus")?;
        if let Some(active) = &self.active {
            write!(f, "\n**{active}: {}**", RecruitmentStatus::Active)?;
        }
        for row in &self.rows {
            write!(f, "\n{}:\t\t\t\t{}", row.name, row.status)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
