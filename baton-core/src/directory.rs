//! Member directory lookup.
//!
//! The host platform owns member identities. The queue only ever asks it to
//! turn a persisted [`MemberId`] back into a live [`Member`], and that lookup
//! may fail.

use std::collections::HashMap;

use crate::types::{Member, MemberId};

/// Resolves member ids to live member handles.
pub trait MemberDirectory {
    fn lookup(&self, id: MemberId) -> Option<Member>;
}

impl MemberDirectory for HashMap<MemberId, Member> {
    fn lookup(&self, id: MemberId) -> Option<Member> {
        self.get(&id).cloned()
    }
}

/// A directory that knows nobody. Every id loads as unresolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDirectory;

impl MemberDirectory for EmptyDirectory {
    fn lookup(&self, _id: MemberId) -> Option<Member> {
        None
    }
}

/// In-process directory fed by whatever the gateway tells us about members:
/// the snapshot it sends on login, plus every message author it relays.
#[derive(Debug, Clone, Default)]
pub struct KnownMembers {
    members: HashMap<MemberId, Member>,
}

impl KnownMembers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or refresh a member. Returns `true` if the id was new or the
    /// display name changed.
    pub fn learn(&mut self, member: Member) -> bool {
        match self.members.get(&member.id) {
            Some(existing) if existing.name == member.name => false,
            _ => {
                self.members.insert(member.id, member);
                true
            }
        }
    }

    pub fn extend(&mut self, members: impl IntoIterator<Item = Member>) {
        for member in members {
            self.learn(member);
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl MemberDirectory for KnownMembers {
    fn lookup(&self, id: MemberId) -> Option<Member> {
        self.members.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learn_reports_changes_only() {
        let mut known = KnownMembers::new();
        assert!(known.learn(Member::new(1, "alice")));
        assert!(!known.learn(Member::new(1, "alice")));
        assert!(known.learn(Member::new(1, "alice2")));
        assert_eq!(known.lookup(MemberId(1)).map(|m| m.name), Some("alice2".to_string()));
        assert_eq!(known.len(), 1);
    }

    #[test]
    fn empty_directory_resolves_nothing() {
        assert!(EmptyDirectory.lookup(MemberId(1)).is_none());
    }
}
