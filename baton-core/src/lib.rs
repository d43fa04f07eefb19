//! Baton core library: recruitment queue, YAML persistence, errors.
//!
//! - [`types`]: member handles and [`RecruitmentStatus`]
//! - [`queue`]: the in-memory [`RecruitQueue`] and its single-active rule
//! - [`registry`]: write-through load / save
//! - [`directory`]: member id lookup seam
//! - [`error`]: [`QueueError`], [`RegistryError`]

pub mod directory;
pub mod error;
pub mod queue;
pub mod registry;
pub mod types;

pub use directory::{EmptyDirectory, KnownMembers, MemberDirectory};
pub use error::{QueueError, RegistryError};
pub use queue::{Entry, RecruitQueue, Roster, RosterRow, Transition};
pub use registry::Registry;
pub use types::{Member, MemberId, MemberRef, RecruitmentStatus};
