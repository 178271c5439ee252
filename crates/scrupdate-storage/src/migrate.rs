//! In-place migration between minor versions of the program table.
//!
//! The on-disk column set is compared with the expected [`TableSchema`]:
//! - equal sets need no column changes,
//! - a pure superset of the on-disk set adds the missing columns,
//! - a pure subset drops the extra columns (data in them is lost),
//! - anything else is refused.
//!
//! All changes and the version stamp run inside one transaction.

use std::collections::BTreeSet;

use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;
use crate::metadata;
use crate::schema::{ColumnDef, TableSchema};

/// Column changes needed to bring a table to its expected schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationPlan {
    Unchanged,
    AddColumns(Vec<&'static ColumnDef>),
    DropColumns(Vec<String>),
}

/// Names of the columns `table` currently has.
pub fn on_disk_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>, StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(names)
}

/// Decides how to migrate from `on_disk` to `expected`.
pub fn plan(
    on_disk: &BTreeSet<String>,
    expected: &'static TableSchema,
) -> Result<MigrationPlan, StoreError> {
    let missing: Vec<&'static ColumnDef> = expected
        .columns
        .iter()
        .filter(|column| !on_disk.contains(column.name))
        .collect();
    let extra: Vec<String> = on_disk
        .iter()
        .filter(|name| !expected.has_column(name))
        .cloned()
        .collect();

    match (missing.is_empty(), extra.is_empty()) {
        (true, true) => Ok(MigrationPlan::Unchanged),
        (false, true) => Ok(MigrationPlan::AddColumns(missing)),
        (true, false) => Ok(MigrationPlan::DropColumns(extra)),
        (false, false) => Err(StoreError::MigrationFailed {
            reason: format!(
                "table {} both gains {:?} and loses {:?}",
                expected.table,
                missing.iter().map(|column| column.name).collect::<Vec<_>>(),
                extra
            ),
        }),
    }
}

/// Brings the table to `expected` and stamps `expected.version`.
///
/// Either every change and the new version are committed, or none are.
pub fn migrate(
    conn: &mut Connection,
    expected: &'static TableSchema,
) -> Result<MigrationPlan, StoreError> {
    let from = metadata::read_version(conn)?;
    let plan = apply(conn, expected).map_err(|e| match e {
        StoreError::MigrationFailed { .. } => e,
        other => StoreError::MigrationFailed {
            reason: other.to_string(),
        },
    })?;

    info!(
        table = expected.table,
        from = %from,
        to = %expected.version,
        plan = ?plan,
        "migrated table"
    );
    Ok(plan)
}

fn apply(
    conn: &mut Connection,
    expected: &'static TableSchema,
) -> Result<MigrationPlan, StoreError> {
    let tx = conn.transaction()?;
    let on_disk = on_disk_columns(&tx, expected.table)?;
    if on_disk.is_empty() {
        return Err(StoreError::MigrationFailed {
            reason: format!("table {} does not exist", expected.table),
        });
    }

    let plan = plan(&on_disk, expected)?;
    match &plan {
        MigrationPlan::Unchanged => {}
        MigrationPlan::AddColumns(columns) => {
            for column in columns {
                tx.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    expected.table,
                    column.add_definition()
                ))?;
            }
        }
        MigrationPlan::DropColumns(names) => {
            for name in names {
                tx.execute_batch(&format!(
                    "ALTER TABLE {} DROP COLUMN {name}",
                    expected.table
                ))?;
            }
        }
    }
    metadata::write_version(&tx, expected.version)?;
    tx.commit()?;
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{columns, PROGRAMS_V1_0, PROGRAMS_V1_1};
    use scrupdate_core::VersionTag;

    fn database_at(schema: &TableSchema) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&schema.create_table_sql()).unwrap();
        metadata::write_version(&conn, schema.version).unwrap();
        conn
    }

    fn names(schema: &TableSchema) -> BTreeSet<String> {
        schema.column_names().into_iter().map(String::from).collect()
    }

    #[test]
    fn plan_classifies_column_differences() {
        assert_eq!(
            plan(&names(&PROGRAMS_V1_1), &PROGRAMS_V1_1).unwrap(),
            MigrationPlan::Unchanged
        );

        match plan(&names(&PROGRAMS_V1_0), &PROGRAMS_V1_1).unwrap() {
            MigrationPlan::AddColumns(added) => {
                let added: Vec<_> = added.iter().map(|column| column.name).collect();
                assert_eq!(added, vec![columns::SKIPPED_VERSION, columns::IS_NEW]);
            }
            other => panic!("expected AddColumns, got {other:?}"),
        }

        assert_eq!(
            plan(&names(&PROGRAMS_V1_1), &PROGRAMS_V1_0).unwrap(),
            MigrationPlan::DropColumns(vec!["is_new".into(), "skipped_version".into()])
        );
    }

    #[test]
    fn plan_refuses_mixed_changes() {
        let mut on_disk = names(&PROGRAMS_V1_0);
        on_disk.insert("legacy_notes".into());
        assert!(matches!(
            plan(&on_disk, &PROGRAMS_V1_1),
            Err(StoreError::MigrationFailed { .. })
        ));
    }

    #[test]
    fn additive_migration_keeps_rows_and_stamps_version() {
        let mut conn = database_at(&PROGRAMS_V1_0);
        conn.execute(
            "INSERT INTO programs (name, installed_version, latest_version, installation_scope, \
             is_update_check_configured, web_page_url, version_search_method, \
             version_search_method_argument_1, version_search_method_argument_2, \
             treat_a_standalone_number_as_a_version, version_search_behavior, \
             web_page_post_load_delay, web_page_element_click_instructions, \
             is_automatically_added, update_check_configuration_status, \
             update_check_configuration_error, is_hidden) \
             VALUES ('Git', '2.40', '', 1, 0, '', 0, '', '', 0, 0, 0, '[]', 1, 0, 0, 0)",
            [],
        )
        .unwrap();

        migrate(&mut conn, &PROGRAMS_V1_1).unwrap();

        assert_eq!(metadata::read_version(&conn).unwrap(), VersionTag::new(1, 1));
        assert_eq!(on_disk_columns(&conn, "programs").unwrap(), names(&PROGRAMS_V1_1));
        let (skipped, is_new): (String, i64) = conn
            .query_row(
                "SELECT skipped_version, is_new FROM programs WHERE name = 'Git'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(skipped, "");
        assert_eq!(is_new, 0);
    }

    #[test]
    fn destructive_migration_drops_columns() {
        let mut conn = database_at(&PROGRAMS_V1_1);
        migrate(&mut conn, &PROGRAMS_V1_0).unwrap();
        assert_eq!(on_disk_columns(&conn, "programs").unwrap(), names(&PROGRAMS_V1_0));
        assert_eq!(metadata::read_version(&conn).unwrap(), VersionTag::new(1, 0));
    }

    #[test]
    fn failed_migration_leaves_version_untouched() {
        let mut conn = database_at(&PROGRAMS_V1_0);
        conn.execute_batch("ALTER TABLE programs ADD COLUMN legacy_notes TEXT")
            .unwrap();

        let err = migrate(&mut conn, &PROGRAMS_V1_1).unwrap_err();
        assert!(matches!(err, StoreError::MigrationFailed { .. }));
        assert_eq!(metadata::read_version(&conn).unwrap(), VersionTag::new(1, 0));
        assert!(on_disk_columns(&conn, "programs")
            .unwrap()
            .contains("legacy_notes"));
    }

    #[test]
    fn missing_table_fails() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            migrate(&mut conn, &PROGRAMS_V1_1),
            Err(StoreError::MigrationFailed { .. })
        ));
    }
}
