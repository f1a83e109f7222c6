//! Read-only view of the schema catalog.
//!
//! The AST never owns or borrows schema objects. A column-reference node
//! stores a [`TableId`] key; consumers resolve it through a [`Catalog`]
//! owned by the surrounding system, which must not mutate a referenced
//! table description while any AST still holds its key (externally
//! synchronized, typically by a schema lock held for the compilation).

use std::collections::HashMap;

use squill_types::{ColumnIdx, LogEst, TableId};

/// Type affinity of a column, as derived from its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Affinity {
    #[default]
    Blob,
    Text,
    Numeric,
    Integer,
    Real,
}

/// Metadata of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDesc {
    pub name: String,
    pub affinity: Affinity,
    /// Collating sequence name; referenced here, computed elsewhere.
    pub collation: Option<String>,
}

/// Metadata of one table, owned by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDesc {
    pub name: String,
    pub columns: Vec<ColumnDesc>,
    /// Estimated rows; defaults to the conventional 2^20.
    pub row_est: LogEst,
}

impl TableDesc {
    /// Conventional row estimate for a table that has never been analyzed
    /// (the encoding of 1,048,576).
    pub const DEFAULT_ROW_EST: LogEst = LogEst(200);

    /// A table description with the default row estimate.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDesc>) -> Self {
        Self {
            name: name.into(),
            columns,
            row_est: Self::DEFAULT_ROW_EST,
        }
    }

    /// Column metadata by index; `None` for the rowid pseudo-column and
    /// out-of-range indices.
    #[must_use]
    pub fn column(&self, idx: ColumnIdx) -> Option<&ColumnDesc> {
        if idx.is_rowid() {
            return None;
        }
        self.columns.get(idx.0 as usize)
    }
}

/// The externally owned map from [`TableId`] keys to table descriptions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    tables: HashMap<TableId, TableDesc>,
    by_name: HashMap<String, TableId>,
    next_id: u32,
}

impl Catalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, returning its stable key.
    pub fn register(&mut self, desc: TableDesc) -> TableId {
        self.next_id += 1;
        let id = TableId(self.next_id);
        self.by_name.insert(desc.name.clone(), id);
        self.tables.insert(id, desc);
        id
    }

    /// Table description by key.
    #[must_use]
    pub fn get(&self, id: TableId) -> Option<&TableDesc> {
        self.tables.get(&id)
    }

    /// Key of the table with the given name, if registered.
    #[must_use]
    pub fn resolve_name(&self, name: &str) -> Option<TableId> {
        self.by_name.get(name).copied()
    }

    /// Column metadata behind a column-reference node's keys.
    #[must_use]
    pub fn column(&self, table: TableId, idx: ColumnIdx) -> Option<&ColumnDesc> {
        self.get(table).and_then(|t| t.column(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Catalog, TableId) {
        let mut cat = Catalog::new();
        let id = cat.register(TableDesc::new(
            "users",
            vec![
                ColumnDesc {
                    name: "id".to_owned(),
                    affinity: Affinity::Integer,
                    collation: None,
                },
                ColumnDesc {
                    name: "name".to_owned(),
                    affinity: Affinity::Text,
                    collation: Some("NOCASE".to_owned()),
                },
            ],
        ));
        (cat, id)
    }

    #[test]
    fn test_register_and_lookup() {
        let (cat, id) = sample();
        assert_eq!(cat.resolve_name("users"), Some(id));
        assert_eq!(cat.resolve_name("missing"), None);
        let t = cat.get(id).unwrap();
        assert_eq!(t.name, "users");
        assert_eq!(t.row_est, TableDesc::DEFAULT_ROW_EST);
    }

    #[test]
    fn test_column_metadata_by_index() {
        let (cat, id) = sample();
        let c = cat.column(id, ColumnIdx(1)).unwrap();
        assert_eq!(c.name, "name");
        assert_eq!(c.affinity, Affinity::Text);
        // The rowid pseudo-column has no description.
        assert!(cat.column(id, ColumnIdx::ROWID).is_none());
        assert!(cat.column(id, ColumnIdx(9)).is_none());
    }
}
