use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use ulid::Ulid;

use crate::model::Cents;

/// Resource variant. Capacity metadata is reference data for booking forms;
/// the ledger records party sizes but does not enforce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ResourceKind {
    Room { max_adults: u32, max_children: u32 },
    Table { seats: u32 },
}

/// One bookable resource. Owned by the catalog and never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Resource {
    pub id: Ulid,
    pub kind: ResourceKind,
    /// Human-facing number, unique per variant ("101", "T7").
    pub number: String,
    /// Class label shown on statements ("Deluxe", "Window").
    pub class_name: String,
    pub price: Cents,
    #[serde(default)]
    pub description: String,
}

/// Read-only resource lookup. The implementation may live behind a network;
/// the ledger and service only ever see this seam.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolve a set of resource ids. Unknown ids are omitted.
    async fn find_by_ids(&self, ids: &[Ulid]) -> Vec<Resource>;
    /// Resolve a room by its human-facing number.
    async fn find_room(&self, number: &str) -> Option<Resource>;
    /// Resolve a table by its human-facing number.
    async fn find_table(&self, number: &str) -> Option<Resource>;
}

#[derive(Debug)]
pub enum CatalogError {
    Io(String),
    Parse(String),
    NegativePrice(String),
    DuplicateId(Ulid),
    DuplicateNumber(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Io(e) => write!(f, "catalog read failed: {e}"),
            CatalogError::Parse(e) => write!(f, "catalog parse failed: {e}"),
            CatalogError::NegativePrice(number) => {
                write!(f, "resource {number} has a negative price")
            }
            CatalogError::DuplicateId(id) => write!(f, "duplicate resource id: {id}"),
            CatalogError::DuplicateNumber(number) => {
                write!(f, "duplicate resource number: {number}")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// In-memory catalog seeded from a JSON file (an array of resources).
#[derive(Debug)]
pub struct StaticCatalog {
    by_id: HashMap<Ulid, Resource>,
    rooms_by_number: HashMap<String, Ulid>,
    tables_by_number: HashMap<String, Ulid>,
}

impl StaticCatalog {
    pub fn new(resources: Vec<Resource>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(resources.len());
        let mut rooms_by_number = HashMap::new();
        let mut tables_by_number = HashMap::new();

        for r in resources {
            if r.price < 0 {
                return Err(CatalogError::NegativePrice(r.number));
            }
            let numbers = match r.kind {
                ResourceKind::Room { .. } => &mut rooms_by_number,
                ResourceKind::Table { .. } => &mut tables_by_number,
            };
            if numbers.insert(r.number.clone(), r.id).is_some() {
                return Err(CatalogError::DuplicateNumber(r.number));
            }
            let id = r.id;
            if by_id.insert(id, r).is_some() {
                return Err(CatalogError::DuplicateId(id));
            }
        }

        Ok(Self {
            by_id,
            rooms_by_number,
            tables_by_number,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let resources: Vec<Resource> =
            serde_json::from_str(raw).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(resources)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CatalogError::Io(e.to_string()))?;
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
impl Catalog for StaticCatalog {
    async fn find_by_ids(&self, ids: &[Ulid]) -> Vec<Resource> {
        ids.iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }

    async fn find_room(&self, number: &str) -> Option<Resource> {
        let id = self.rooms_by_number.get(number)?;
        self.by_id.get(id).cloned()
    }

    async fn find_table(&self, number: &str) -> Option<Resource> {
        let id = self.tables_by_number.get(number)?;
        self.by_id.get(id).cloned()
    }
}
