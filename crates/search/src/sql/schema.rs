//! The fixed physical search schema.
//!
//! Every resource version is a row in `Resource`. Each extracted search value
//! is a row in the table of its parameter kind, keyed by
//! `(ResourceSurrogateId, SearchParamId)`. Composite parameters store all of
//! their components in one row; component columns carry a 1-based suffix
//! (`SystemId1`, `Code1`, `SingleValue2`, ...).
//!
//! Long strings that are compared often (code systems, unit codes, resource
//! type names, parameter URLs) are stored as surrogate ids, resolved through
//! the lookup tables described by [`LookupTable`].

use crate::catalog::KeyNamespace;
use crate::types::{CompositeKind, ParameterKind};

/// A physical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Table {
    /// Table name.
    pub name: &'static str,
}

impl Table {
    const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

/// A physical column (without component suffix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Column {
    /// Column name.
    pub name: &'static str,
}

impl Column {
    const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

/// `Resource`
pub struct ResourceTable;

#[allow(missing_docs)]
impl ResourceTable {
    pub const TABLE: Table = Table::new("Resource");
    pub const RESOURCE_SURROGATE_ID: Column = Column::new("ResourceSurrogateId");
    pub const RESOURCE_TYPE_ID: Column = Column::new("ResourceTypeId");
    pub const RESOURCE_ID: Column = Column::new("ResourceId");
    pub const VERSION: Column = Column::new("Version");
    pub const IS_HISTORY: Column = Column::new("IsHistory");
    pub const IS_DELETED: Column = Column::new("IsDeleted");
    pub const LAST_UPDATED: Column = Column::new("LastUpdated");
    pub const REQUEST_METHOD: Column = Column::new("RequestMethod");
    pub const RAW_RESOURCE: Column = Column::new("RawResource");
}

/// Columns every search parameter table has.
pub struct SearchParamTable;

#[allow(missing_docs)]
impl SearchParamTable {
    pub const RESOURCE_SURROGATE_ID: Column = Column::new("ResourceSurrogateId");
    pub const SEARCH_PARAM_ID: Column = Column::new("SearchParamId");
}

/// `StringSearchParam`
pub struct StringSearchParamTable;

#[allow(missing_docs)]
impl StringSearchParamTable {
    pub const TABLE: Table = Table::new("StringSearchParam");
    pub const TEXT: Column = Column::new("Text");
}

/// `TokenSearchParam`
pub struct TokenSearchParamTable;

#[allow(missing_docs)]
impl TokenSearchParamTable {
    pub const TABLE: Table = Table::new("TokenSearchParam");
    pub const SYSTEM_ID: Column = Column::new("SystemId");
    pub const CODE: Column = Column::new("Code");
}

/// `QuantitySearchParam`
pub struct QuantitySearchParamTable;

#[allow(missing_docs)]
impl QuantitySearchParamTable {
    pub const TABLE: Table = Table::new("QuantitySearchParam");
    pub const SYSTEM_ID: Column = Column::new("SystemId");
    pub const QUANTITY_CODE_ID: Column = Column::new("QuantityCodeId");
    pub const SINGLE_VALUE: Column = Column::new("SingleValue");
    pub const LOW_VALUE: Column = Column::new("LowValue");
    pub const HIGH_VALUE: Column = Column::new("HighValue");
}

/// `NumberSearchParam`
pub struct NumberSearchParamTable;

#[allow(missing_docs)]
impl NumberSearchParamTable {
    pub const TABLE: Table = Table::new("NumberSearchParam");
    pub const SINGLE_VALUE: Column = Column::new("SingleValue");
    pub const LOW_VALUE: Column = Column::new("LowValue");
    pub const HIGH_VALUE: Column = Column::new("HighValue");
}

/// `DateTimeSearchParam`
pub struct DateTimeSearchParamTable;

#[allow(missing_docs)]
impl DateTimeSearchParamTable {
    pub const TABLE: Table = Table::new("DateTimeSearchParam");
    pub const START_DATE_TIME: Column = Column::new("StartDateTime");
    pub const END_DATE_TIME: Column = Column::new("EndDateTime");
}

/// `ReferenceSearchParam`
pub struct ReferenceSearchParamTable;

#[allow(missing_docs)]
impl ReferenceSearchParamTable {
    pub const TABLE: Table = Table::new("ReferenceSearchParam");
    pub const BASE_URI: Column = Column::new("BaseUri");
    pub const REFERENCE_RESOURCE_TYPE_ID: Column = Column::new("ReferenceResourceTypeId");
    pub const REFERENCE_RESOURCE_ID: Column = Column::new("ReferenceResourceId");
}

/// `UriSearchParam`
pub struct UriSearchParamTable;

#[allow(missing_docs)]
impl UriSearchParamTable {
    pub const TABLE: Table = Table::new("UriSearchParam");
    pub const URI: Column = Column::new("Uri");
}

/// A lookup table that resolves one surrogate key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupTable {
    /// The table.
    pub table: Table,
    /// Surrogate id column (same name as the referencing column).
    pub id_column: Column,
    /// Raw value column.
    pub value_column: Column,
}

impl LookupTable {
    /// `System(SystemId, Value)`
    pub const SYSTEM: LookupTable = LookupTable {
        table: Table::new("System"),
        id_column: Column::new("SystemId"),
        value_column: Column::new("Value"),
    };

    /// `QuantityCode(QuantityCodeId, Value)`
    pub const QUANTITY_CODE: LookupTable = LookupTable {
        table: Table::new("QuantityCode"),
        id_column: Column::new("QuantityCodeId"),
        value_column: Column::new("Value"),
    };

    /// `ResourceType(ResourceTypeId, Name)`
    pub const RESOURCE_TYPE: LookupTable = LookupTable {
        table: Table::new("ResourceType"),
        id_column: Column::new("ResourceTypeId"),
        value_column: Column::new("Name"),
    };

    /// `SearchParam(SearchParamId, Uri)`
    pub const SEARCH_PARAM: LookupTable = LookupTable {
        table: Table::new("SearchParam"),
        id_column: Column::new("SearchParamId"),
        value_column: Column::new("Uri"),
    };

    /// Returns the lookup table of a namespace.
    pub fn for_namespace(namespace: KeyNamespace) -> &'static LookupTable {
        match namespace {
            KeyNamespace::System => &Self::SYSTEM,
            KeyNamespace::QuantityCode => &Self::QUANTITY_CODE,
            KeyNamespace::ResourceType => &Self::RESOURCE_TYPE,
            KeyNamespace::SearchParam => &Self::SEARCH_PARAM,
        }
    }
}

/// Returns the table of a composite layout.
pub fn composite_table(kind: CompositeKind) -> Table {
    match kind {
        CompositeKind::TokenToken => Table::new("TokenTokenCompositeSearchParam"),
        CompositeKind::TokenQuantity => Table::new("TokenQuantityCompositeSearchParam"),
        CompositeKind::TokenDate => Table::new("TokenDateTimeCompositeSearchParam"),
        CompositeKind::TokenString => Table::new("TokenStringCompositeSearchParam"),
        CompositeKind::TokenNumberNumber => Table::new("TokenNumberNumberCompositeSearchParam"),
        CompositeKind::ReferenceToken => Table::new("ReferenceTokenCompositeSearchParam"),
    }
}

/// Returns the table that stores values of a parameter kind.
pub fn table_for(kind: ParameterKind) -> Table {
    match kind {
        ParameterKind::String => StringSearchParamTable::TABLE,
        ParameterKind::Token => TokenSearchParamTable::TABLE,
        ParameterKind::Quantity => QuantitySearchParamTable::TABLE,
        ParameterKind::Number => NumberSearchParamTable::TABLE,
        ParameterKind::Date => DateTimeSearchParamTable::TABLE,
        ParameterKind::Reference => ReferenceSearchParamTable::TABLE,
        ParameterKind::Uri => UriSearchParamTable::TABLE,
        ParameterKind::Composite(kind) => composite_table(kind),
        ParameterKind::Resource => ResourceTable::TABLE,
    }
}

/// Value columns of a non-composite kind, with their SQLite types.
fn value_columns(kind: ParameterKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        ParameterKind::String => &[("Text", "TEXT")],
        ParameterKind::Token => &[("SystemId", "INTEGER"), ("Code", "TEXT")],
        ParameterKind::Quantity => &[
            ("SystemId", "INTEGER"),
            ("QuantityCodeId", "INTEGER"),
            ("SingleValue", "REAL"),
            ("LowValue", "REAL"),
            ("HighValue", "REAL"),
        ],
        ParameterKind::Number => &[
            ("SingleValue", "REAL"),
            ("LowValue", "REAL"),
            ("HighValue", "REAL"),
        ],
        ParameterKind::Date => &[("StartDateTime", "TEXT"), ("EndDateTime", "TEXT")],
        ParameterKind::Reference => &[
            ("BaseUri", "TEXT"),
            ("ReferenceResourceTypeId", "INTEGER"),
            ("ReferenceResourceId", "TEXT"),
        ],
        ParameterKind::Uri => &[("Uri", "TEXT")],
        ParameterKind::Composite(_) | ParameterKind::Resource => &[],
    }
}

/// Returns the physical column definitions of a parameter table, including
/// suffixed component columns for composite tables.
pub fn column_definitions(kind: ParameterKind) -> Vec<String> {
    match kind {
        ParameterKind::Composite(composite) => composite
            .components()
            .iter()
            .enumerate()
            .flat_map(|(i, component)| {
                value_columns(*component)
                    .iter()
                    .map(move |(name, ty)| format!("{}{} {}", name, i + 1, ty))
            })
            .collect(),
        other => value_columns(other)
            .iter()
            .map(|(name, ty)| format!("{} {}", name, ty))
            .collect(),
    }
}

/// Every search parameter kind with its own table.
pub fn parameter_kinds() -> Vec<ParameterKind> {
    vec![
        ParameterKind::String,
        ParameterKind::Token,
        ParameterKind::Quantity,
        ParameterKind::Number,
        ParameterKind::Date,
        ParameterKind::Reference,
        ParameterKind::Uri,
        ParameterKind::Composite(CompositeKind::TokenToken),
        ParameterKind::Composite(CompositeKind::TokenQuantity),
        ParameterKind::Composite(CompositeKind::TokenDate),
        ParameterKind::Composite(CompositeKind::TokenString),
        ParameterKind::Composite(CompositeKind::TokenNumberNumber),
        ParameterKind::Composite(CompositeKind::ReferenceToken),
    ]
}

/// Returns the SQLite DDL for the whole schema.
pub fn sqlite_ddl() -> Vec<String> {
    let mut statements = Vec::new();

    for lookup in [
        LookupTable::SYSTEM,
        LookupTable::QUANTITY_CODE,
        LookupTable::RESOURCE_TYPE,
        LookupTable::SEARCH_PARAM,
    ] {
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY, {} TEXT NOT NULL UNIQUE)",
            lookup.table.name, lookup.id_column.name, lookup.value_column.name
        ));
    }

    statements.push(
        "CREATE TABLE IF NOT EXISTS Resource (
            ResourceSurrogateId INTEGER PRIMARY KEY,
            ResourceTypeId INTEGER NOT NULL,
            ResourceId TEXT NOT NULL,
            Version INTEGER NOT NULL,
            IsHistory INTEGER NOT NULL DEFAULT 0,
            IsDeleted INTEGER NOT NULL DEFAULT 0,
            LastUpdated TEXT NOT NULL,
            RequestMethod TEXT,
            RawResource TEXT NOT NULL
        )"
        .to_string(),
    );
    statements.push(
        "CREATE INDEX IF NOT EXISTS IX_Resource_ResourceTypeId_ResourceId
            ON Resource(ResourceTypeId, ResourceId)"
            .to_string(),
    );

    for kind in parameter_kinds() {
        let table = table_for(kind);
        let mut columns = vec![
            "ResourceSurrogateId INTEGER NOT NULL REFERENCES Resource(ResourceSurrogateId)"
                .to_string(),
            "SearchParamId INTEGER NOT NULL".to_string(),
        ];
        columns.extend(column_definitions(kind));

        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            table.name,
            columns.join(", ")
        ));
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS IX_{0}_ResourceSurrogateId ON {0}(ResourceSurrogateId, SearchParamId)",
            table.name
        ));
    }

    statements
}
