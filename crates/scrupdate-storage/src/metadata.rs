//! Store format version kept in SQLite's `user_version` header slot.
//!
//! The slot lives inside the database file, so it is covered by the file's
//! checksum and changes atomically with the schema it describes.

use rusqlite::Connection;

use scrupdate_core::VersionTag;

use crate::error::StoreError;

/// Reads the packed [`VersionTag`] from `user_version`.
///
/// A negative value or one above `9999` cannot have been written by this
/// crate and is reported as [`StoreError::Corrupted`].
pub fn read_version(conn: &Connection) -> Result<VersionTag, StoreError> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(raw)
        .ok()
        .and_then(|packed| VersionTag::unpack(packed).ok())
        .ok_or_else(|| StoreError::Corrupted {
            reason: format!("stored format version {raw} is out of range"),
        })
}

pub fn write_version(conn: &Connection, version: VersionTag) -> Result<(), StoreError> {
    conn.pragma_update(None, "user_version", i64::from(version.pack()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reads_as_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_version(&conn).unwrap(), VersionTag::new(0, 0));
    }

    #[test]
    fn write_then_read() {
        let conn = Connection::open_in_memory().unwrap();
        write_version(&conn, VersionTag::new(1, 1)).unwrap();
        assert_eq!(read_version(&conn).unwrap(), VersionTag::new(1, 1));

        let raw: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(raw, 101);
    }

    #[test]
    fn out_of_range_is_corrupted() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 10_000i64).unwrap();
        assert!(matches!(
            read_version(&conn),
            Err(StoreError::Corrupted { .. })
        ));

        conn.pragma_update(None, "user_version", -5i64).unwrap();
        assert!(matches!(
            read_version(&conn),
            Err(StoreError::Corrupted { .. })
        ));
    }
}
