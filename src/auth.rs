use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use ulid::Ulid;

/// Directory roles. Staff and admins operate the venue through other
/// channels; only guests book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Role {
    Guest,
    Staff,
    SystemAdmin,
}

/// An authenticated requester as the directory knows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: Ulid,
    pub name: String,
    pub role: Role,
}

/// The booking-authorization rule, in one place: only guests create
/// bookings. Summary and settlement are open to any authenticated
/// requester, scoped to their own folio.
pub fn may_create_bookings(requester: &Requester) -> bool {
    matches!(requester.role, Role::Guest)
}

/// Identity lookup. Resolves presented access keys to trusted requester ids
/// and serves requester records. The implementation may be remote.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve an access key to a requester id. None = bad credentials.
    async fn authenticate(&self, key: &str) -> Option<Ulid>;
    /// Requester record for an authenticated id.
    async fn find(&self, id: Ulid) -> Option<Requester>;
}

#[derive(Debug)]
pub enum DirectoryError {
    Io(String),
    Parse(String),
    DuplicateKey(String),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::Io(e) => write!(f, "directory read failed: {e}"),
            DirectoryError::Parse(e) => write!(f, "directory parse failed: {e}"),
            DirectoryError::DuplicateKey(k) => write!(f, "duplicate access key: {k}"),
        }
    }
}

impl std::error::Error for DirectoryError {}

#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    key: String,
    id: Ulid,
    name: String,
    role: Role,
}

/// In-memory directory seeded from a JSON file (an array of entries).
#[derive(Debug)]
pub struct StaticDirectory {
    by_key: HashMap<String, Ulid>,
    by_id: HashMap<Ulid, Requester>,
}

impl StaticDirectory {
    pub fn from_json(raw: &str) -> Result<Self, DirectoryError> {
        let entries: Vec<DirectoryEntry> =
            serde_json::from_str(raw).map_err(|e| DirectoryError::Parse(e.to_string()))?;
        let mut by_key = HashMap::with_capacity(entries.len());
        let mut by_id = HashMap::with_capacity(entries.len());
        for e in entries {
            if by_key.insert(e.key.clone(), e.id).is_some() {
                return Err(DirectoryError::DuplicateKey(e.key));
            }
            by_id.insert(
                e.id,
                Requester {
                    id: e.id,
                    name: e.name,
                    role: e.role,
                },
            );
        }
        Ok(Self { by_key, by_id })
    }

    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let raw =
            std::fs::read_to_string(path).map_err(|e| DirectoryError::Io(e.to_string()))?;
        Self::from_json(&raw)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn authenticate(&self, key: &str) -> Option<Ulid> {
        self.by_key.get(key).copied()
    }

    async fn find(&self, id: Ulid) -> Option<Requester> {
        self.by_id.get(&id).cloned()
    }
}
