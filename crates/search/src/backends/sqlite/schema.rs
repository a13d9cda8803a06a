use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::catalog::{CatalogSnapshot, KeyNamespace};
use crate::error::SearchOutcome;
use crate::sql::schema::{LookupTable, sqlite_ddl};

const NAMESPACES: [KeyNamespace; 4] = [
    KeyNamespace::System,
    KeyNamespace::QuantityCode,
    KeyNamespace::ResourceType,
    KeyNamespace::SearchParam,
];

/// Creates every search table that does not exist yet.
pub fn create_schema(conn: &Connection) -> SearchOutcome<()> {
    let statements = sqlite_ddl();
    for statement in &statements {
        conn.execute(statement, [])?;
    }
    debug!(statements = statements.len(), "Initialized search schema");
    Ok(())
}

/// Returns the surrogate id of `value`, inserting it when missing.
pub fn ensure_lookup_value(
    conn: &Connection,
    namespace: KeyNamespace,
    value: &str,
) -> SearchOutcome<i64> {
    let lookup = LookupTable::for_namespace(namespace);
    let select = format!(
        "SELECT {} FROM {} WHERE {} = ?1",
        lookup.id_column.name, lookup.table.name, lookup.value_column.name
    );

    if let Some(id) = conn
        .query_row(&select, params![value], |row| row.get(0))
        .optional()?
    {
        return Ok(id);
    }

    conn.execute(
        &format!(
            "INSERT INTO {} ({}) VALUES (?1)",
            lookup.table.name, lookup.value_column.name
        ),
        params![value],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Reads every lookup table into a catalog snapshot.
pub fn load_catalog_snapshot(conn: &Connection) -> SearchOutcome<CatalogSnapshot> {
    let mut snapshot = CatalogSnapshot::new();

    for namespace in NAMESPACES {
        let lookup = LookupTable::for_namespace(namespace);
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, {} FROM {}",
            lookup.id_column.name, lookup.value_column.name, lookup.table.name
        ))?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let value: String = row.get(1)?;
            Ok((id, value))
        })?;
        for row in rows {
            let (id, value) = row?;
            snapshot.insert(namespace, value, id);
        }
    }

    debug!(
        systems = snapshot.len(KeyNamespace::System),
        quantity_codes = snapshot.len(KeyNamespace::QuantityCode),
        resource_types = snapshot.len(KeyNamespace::ResourceType),
        search_params = snapshot.len(KeyNamespace::SearchParam),
        "Loaded surrogate key catalog"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SurrogateKeyLookup;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        create_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'TokenQuantityCompositeSearchParam'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_lookup_values_round_trip_into_snapshot() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();

        let loinc = ensure_lookup_value(&conn, KeyNamespace::System, "http://loinc.org").unwrap();
        let again = ensure_lookup_value(&conn, KeyNamespace::System, "http://loinc.org").unwrap();
        assert_eq!(loinc, again);
        ensure_lookup_value(&conn, KeyNamespace::ResourceType, "Patient").unwrap();

        let snapshot = load_catalog_snapshot(&conn).unwrap();
        assert_eq!(
            snapshot.lookup(KeyNamespace::System, "http://loinc.org"),
            Some(loinc)
        );
        assert_eq!(snapshot.len(KeyNamespace::ResourceType), 1);
        assert_eq!(snapshot.lookup(KeyNamespace::QuantityCode, "mg"), None);
    }
}
