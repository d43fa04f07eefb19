//! YAML persistence for the recruitment queue.
//!
//! # Storage layout
//!
//! ```text
//! ~/.baton/
//!   recruiters.yaml     (member id → status label, mode 0600)
//! ```
//!
//! ```yaml
//! 123456789: ACTIVE
//! 987654321: READY
//! ```
//!
//! The file is rewritten in full after every mutation (write-through). The
//! active slot is not stored; it is derived from the `ACTIVE` entry on load.
//!
//! # API pattern
//!
//! Path helpers take an explicit home (`fn_at(home: &Path, …)`); callers
//! decide where home is, tests pass a `TempDir`.

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Number, Value};

use crate::directory::MemberDirectory;
use crate::error::RegistryError;
use crate::queue::{RecruitQueue, Transition};
use crate::types::{Member, MemberId, MemberRef, RecruitmentStatus};

pub const REGISTRY_FILE: &str = "recruiters.yaml";

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.baton/`
pub fn baton_dir_at(home: &Path) -> PathBuf {
    home.join(".baton")
}

/// `<home>/.baton/recruiters.yaml`. Pure, no I/O.
pub fn registry_path_at(home: &Path) -> PathBuf {
    baton_dir_at(home).join(REGISTRY_FILE)
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load the queue from `path`, resolving ids through `directory`.
///
/// A missing file is created empty (parent directories included) and yields
/// an empty queue. Ids the directory does not know load as
/// [`MemberRef::Unresolved`]. Labels must match exactly (`READY`, `ACTIVE`);
/// anything else is a [`RegistryError::Parse`].
pub fn load_at(path: &Path, directory: &dyn MemberDirectory) -> Result<RecruitQueue, RegistryError> {
    if !path.exists() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::File::create(path)?;
        set_file_permissions(path)?;
        return Ok(RecruitQueue::new());
    }
    read_at(path, directory)
}

/// Like [`load_at`], but never touches the filesystem beyond reading: a
/// missing file is an empty queue and nothing is created.
pub fn read_at(path: &Path, directory: &dyn MemberDirectory) -> Result<RecruitQueue, RegistryError> {
    if !path.exists() {
        return Ok(RecruitQueue::new());
    }

    let contents = std::fs::read_to_string(path)?;
    let pairs = parse_entries(path, &contents)?;
    let pairs = pairs.into_iter().map(|(id, status)| {
        let member = directory
            .lookup(id)
            .map(MemberRef::Resolved)
            .unwrap_or(MemberRef::Unresolved(id));
        (member, status)
    });

    let (queue, demoted) = RecruitQueue::restore(pairs);
    for member in demoted {
        tracing::warn!(
            member = %member.id(),
            path = %path.display(),
            "more than one ACTIVE entry on disk; demoting to READY"
        );
    }
    Ok(queue)
}

fn parse_entries(
    path: &Path,
    contents: &str,
) -> Result<Vec<(MemberId, RecruitmentStatus)>, RegistryError> {
    let parse_err = |reason: String| RegistryError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    if contents.trim().is_empty() {
        return Ok(vec![]);
    }
    let value: Value = serde_yaml::from_str(contents).map_err(|e| parse_err(e.to_string()))?;
    let mapping = match value {
        Value::Null => return Ok(vec![]),
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(parse_err(format!(
                "expected a mapping of member id to status, found {}",
                value_kind(&other)
            )))
        }
    };

    mapping
        .into_iter()
        .map(|(key, label)| {
            let id = key
                .as_u64()
                .map(MemberId)
                .ok_or_else(|| parse_err(format!("member id {key:?} is not an unsigned integer")))?;
            let label = label
                .as_str()
                .ok_or_else(|| parse_err(format!("status for member {id} is not a string")))?;
            let status = RecruitmentStatus::from_label(label).ok_or_else(|| {
                parse_err(format!(
                    "unknown status '{label}' for member {id}; expected one of {}",
                    RecruitmentStatus::valid_labels()
                ))
            })?;
            Ok((id, status))
        })
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically overwrite `path` with the full queue, in insertion order.
///
/// Write flow: serialize → `.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(path: &Path, queue: &RecruitQueue) -> Result<(), RegistryError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut mapping = Mapping::new();
    for entry in queue.iter() {
        mapping.insert(
            Value::Number(Number::from(entry.member.id().0)),
            Value::String(entry.status.label().to_string()),
        );
    }
    let yaml = serde_yaml::to_string(&mapping)?;

    let tmp_path = tmp_path_for(path);
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// `<file>.tmp` next to the target, on the same filesystem.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| REGISTRY_FILE.into());
    name.push(".tmp");
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// 4. Write-through registry
// ---------------------------------------------------------------------------

/// The queue plus the file it lives in. Every successful mutation is on disk
/// before the method returns.
#[derive(Debug)]
pub struct Registry {
    queue: RecruitQueue,
    path: PathBuf,
}

impl Registry {
    /// Load (or create) the persistence file at `path`.
    pub fn open(path: impl Into<PathBuf>, directory: &dyn MemberDirectory) -> Result<Self, RegistryError> {
        let path = path.into();
        let queue = load_at(&path, directory)?;
        Ok(Self { queue, path })
    }

    pub fn queue(&self) -> &RecruitQueue {
        &self.queue
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// [`RecruitQueue::set_status`] followed by a full save. A rejected
    /// transition writes nothing.
    pub fn set_status(
        &mut self,
        member: impl Into<MemberRef>,
        status: Option<RecruitmentStatus>,
    ) -> Result<Transition, RegistryError> {
        let transition = self.queue.set_status(member, status)?;
        self.persist()?;
        Ok(transition)
    }

    pub fn remove(&mut self, member: impl Into<MemberRef>) -> Result<Transition, RegistryError> {
        self.set_status(member, None)
    }

    /// Rewrite the file from the in-memory queue.
    pub fn persist(&self) -> Result<(), RegistryError> {
        save_at(&self.path, &self.queue)
    }

    /// Display-name refreshes only; ids are unchanged so nothing is written.
    pub fn resolve_members(&mut self, directory: &dyn MemberDirectory) -> usize {
        self.queue.resolve_members(directory)
    }

    pub fn observe(&mut self, member: &Member) -> bool {
        self.queue.observe(member)
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::EmptyDirectory;
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    #[test]
    fn registry_path_is_correct() {
        let home = make_home();
        assert!(registry_path_at(home.path()).ends_with(".baton/recruiters.yaml"));
    }

    #[test]
    fn tmp_path_is_sibling() {
        let tmp = tmp_path_for(Path::new("/x/recruiters.yaml"));
        assert_eq!(tmp, PathBuf::from("/x/recruiters.yaml.tmp"));
    }

    #[test]
    fn load_missing_file_creates_it_empty() {
        let home = make_home();
        let path = registry_path_at(home.path());
        let queue = load_at(&path, &EmptyDirectory).expect("load");
        assert!(queue.is_empty());
        assert!(path.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn read_missing_file_creates_nothing() {
        let home = make_home();
        let path = registry_path_at(home.path());
        let queue = read_at(&path, &EmptyDirectory).expect("read");
        assert!(queue.is_empty());
        assert!(!path.exists());
        assert!(!baton_dir_at(home.path()).exists());
    }

    #[test]
    fn save_writes_uppercase_labels_in_insertion_order() {
        let home = make_home();
        let path = registry_path_at(home.path());
        let mut queue = RecruitQueue::new();
        queue
            .set_status(Member::new(20, "bob"), Some(RecruitmentStatus::Ready))
            .unwrap();
        queue
            .set_status(Member::new(10, "alice"), Some(RecruitmentStatus::Active))
            .unwrap();
        save_at(&path, &queue).expect("save");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "20: READY\n10: ACTIVE\n");
        assert!(!tmp_path_for(&path).exists(), ".tmp must be gone after save");
    }

    #[test]
    fn registry_rejected_transition_writes_nothing() {
        let home = make_home();
        let path = registry_path_at(home.path());
        let mut registry = Registry::open(&path, &EmptyDirectory).expect("open");
        registry
            .set_status(Member::new(1, "alice"), Some(RecruitmentStatus::Active))
            .expect("alice");
        let before = std::fs::read_to_string(&path).unwrap();

        let err = registry
            .set_status(Member::new(2, "bob"), Some(RecruitmentStatus::Active))
            .unwrap_err();
        assert!(err.as_queue_error().is_some());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }
}
