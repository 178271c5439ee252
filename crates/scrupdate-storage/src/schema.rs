//! Declared column lists for the program table and their version history.
//!
//! The schema is data, not introspection: the same [`TableSchema`] drives
//! table creation, the INSERT/UPDATE/SELECT statements, the codec's notion of
//! which fields are persisted, and the migrator's expected column set.
//!
//! History:
//! - 1.0: the first released column set.
//! - 1.1: adds `skipped_version` and `is_new`.

use std::collections::BTreeSet;

use scrupdate_core::VersionTag;

/// Column names of the `programs` table.
pub mod columns {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const INSTALLED_VERSION: &str = "installed_version";
    pub const LATEST_VERSION: &str = "latest_version";
    pub const INSTALLATION_SCOPE: &str = "installation_scope";
    pub const IS_UPDATE_CHECK_CONFIGURED: &str = "is_update_check_configured";
    pub const WEB_PAGE_URL: &str = "web_page_url";
    pub const VERSION_SEARCH_METHOD: &str = "version_search_method";
    pub const VERSION_SEARCH_METHOD_ARGUMENT_1: &str = "version_search_method_argument_1";
    pub const VERSION_SEARCH_METHOD_ARGUMENT_2: &str = "version_search_method_argument_2";
    pub const TREAT_A_STANDALONE_NUMBER_AS_A_VERSION: &str =
        "treat_a_standalone_number_as_a_version";
    pub const VERSION_SEARCH_BEHAVIOR: &str = "version_search_behavior";
    pub const WEB_PAGE_POST_LOAD_DELAY: &str = "web_page_post_load_delay";
    pub const CLICK_INSTRUCTIONS: &str = "web_page_element_click_instructions";
    pub const IS_AUTOMATICALLY_ADDED: &str = "is_automatically_added";
    pub const UPDATE_CHECK_CONFIGURATION_STATUS: &str = "update_check_configuration_status";
    pub const UPDATE_CHECK_CONFIGURATION_ERROR: &str = "update_check_configuration_error";
    pub const IS_HIDDEN: &str = "is_hidden";
    pub const SKIPPED_VERSION: &str = "skipped_version";
    pub const IS_NEW: &str = "is_new";
}

/// SQLite storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Text,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Value given to existing rows when a column is added by migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    None,
    Integer(i64),
    Text(&'static str),
}

/// One declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    /// Used only by `ALTER TABLE ... ADD COLUMN`.
    pub default: ColumnDefault,
}

impl ColumnDef {
    const fn key(name: &'static str) -> Self {
        ColumnDef {
            name,
            column_type: ColumnType::Integer,
            not_null: true,
            primary_key: true,
            unique: false,
            default: ColumnDefault::None,
        }
    }

    const fn text(name: &'static str) -> Self {
        ColumnDef {
            name,
            column_type: ColumnType::Text,
            not_null: true,
            primary_key: false,
            unique: false,
            default: ColumnDefault::Text(""),
        }
    }

    const fn integer(name: &'static str) -> Self {
        ColumnDef {
            name,
            column_type: ColumnType::Integer,
            not_null: true,
            primary_key: false,
            unique: false,
            default: ColumnDefault::Integer(0),
        }
    }

    const fn unique(self) -> Self {
        ColumnDef {
            unique: true,
            default: ColumnDefault::None,
            ..self
        }
    }

    /// Column definition as used inside `CREATE TABLE`.
    pub fn create_definition(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.column_type.sql());
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.primary_key {
            sql.push_str(" PRIMARY KEY AUTOINCREMENT");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        sql
    }

    /// Column definition as used by `ALTER TABLE ... ADD COLUMN`.
    pub fn add_definition(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.column_type.sql());
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        match self.default {
            ColumnDefault::None => {}
            ColumnDefault::Integer(value) => sql.push_str(&format!(" DEFAULT {value}")),
            ColumnDefault::Text(value) => {
                sql.push_str(&format!(" DEFAULT '{}'", value.replace('\'', "''")))
            }
        }
        sql
    }
}

/// A table's declared columns at one format version.
#[derive(Debug, PartialEq, Eq)]
pub struct TableSchema {
    pub table: &'static str,
    pub version: VersionTag,
    pub columns: &'static [ColumnDef],
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> BTreeSet<&'static str> {
        self.columns.iter().map(|column| column.name).collect()
    }

    /// Every column except the auto-assigned key, in declaration order.
    pub fn data_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|column| !column.primary_key)
    }

    pub fn create_table_sql(&self) -> String {
        let definitions: Vec<String> = self
            .columns
            .iter()
            .map(ColumnDef::create_definition)
            .collect();
        format!("CREATE TABLE {} ({})", self.table, definitions.join(", "))
    }

    /// `SELECT <data columns> FROM <table>`; callers append any WHERE clause.
    pub fn select_sql(&self) -> String {
        let names: Vec<&str> = self.data_columns().map(|column| column.name).collect();
        format!("SELECT {} FROM {}", names.join(", "), self.table)
    }

    /// Positional INSERT over the data columns.
    pub fn insert_sql(&self) -> String {
        let names: Vec<&str> = self.data_columns().map(|column| column.name).collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            names.join(", "),
            placeholders.join(", ")
        )
    }

    /// Positional UPDATE of every data column; the last parameter is the
    /// name of the row to replace.
    pub fn update_by_name_sql(&self) -> String {
        let assignments: Vec<String> = self
            .data_columns()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column.name, i + 1))
            .collect();
        format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            self.table,
            assignments.join(", "),
            columns::NAME,
            assignments.len() + 1
        )
    }
}

const PROGRAMS_TABLE: &str = "programs";

const ID: ColumnDef = ColumnDef::key(columns::ID);
const NAME: ColumnDef = ColumnDef::text(columns::NAME).unique();
const INSTALLED_VERSION: ColumnDef = ColumnDef::text(columns::INSTALLED_VERSION);
const LATEST_VERSION: ColumnDef = ColumnDef::text(columns::LATEST_VERSION);
const INSTALLATION_SCOPE: ColumnDef = ColumnDef::integer(columns::INSTALLATION_SCOPE);
const IS_UPDATE_CHECK_CONFIGURED: ColumnDef =
    ColumnDef::integer(columns::IS_UPDATE_CHECK_CONFIGURED);
const WEB_PAGE_URL: ColumnDef = ColumnDef::text(columns::WEB_PAGE_URL);
const VERSION_SEARCH_METHOD: ColumnDef = ColumnDef::integer(columns::VERSION_SEARCH_METHOD);
const VERSION_SEARCH_METHOD_ARGUMENT_1: ColumnDef =
    ColumnDef::text(columns::VERSION_SEARCH_METHOD_ARGUMENT_1);
const VERSION_SEARCH_METHOD_ARGUMENT_2: ColumnDef =
    ColumnDef::text(columns::VERSION_SEARCH_METHOD_ARGUMENT_2);
const TREAT_A_STANDALONE_NUMBER_AS_A_VERSION: ColumnDef =
    ColumnDef::integer(columns::TREAT_A_STANDALONE_NUMBER_AS_A_VERSION);
const VERSION_SEARCH_BEHAVIOR: ColumnDef = ColumnDef::integer(columns::VERSION_SEARCH_BEHAVIOR);
const WEB_PAGE_POST_LOAD_DELAY: ColumnDef = ColumnDef::integer(columns::WEB_PAGE_POST_LOAD_DELAY);
const CLICK_INSTRUCTIONS: ColumnDef = ColumnDef {
    default: ColumnDefault::Text("[]"),
    ..ColumnDef::text(columns::CLICK_INSTRUCTIONS)
};
const IS_AUTOMATICALLY_ADDED: ColumnDef = ColumnDef::integer(columns::IS_AUTOMATICALLY_ADDED);
const UPDATE_CHECK_CONFIGURATION_STATUS: ColumnDef =
    ColumnDef::integer(columns::UPDATE_CHECK_CONFIGURATION_STATUS);
const UPDATE_CHECK_CONFIGURATION_ERROR: ColumnDef =
    ColumnDef::integer(columns::UPDATE_CHECK_CONFIGURATION_ERROR);
const IS_HIDDEN: ColumnDef = ColumnDef::integer(columns::IS_HIDDEN);
const SKIPPED_VERSION: ColumnDef = ColumnDef::text(columns::SKIPPED_VERSION);
const IS_NEW: ColumnDef = ColumnDef::integer(columns::IS_NEW);

/// The first released program table.
pub static PROGRAMS_V1_0: TableSchema = TableSchema {
    table: PROGRAMS_TABLE,
    version: VersionTag::new(1, 0),
    columns: &[
        ID,
        NAME,
        INSTALLED_VERSION,
        LATEST_VERSION,
        INSTALLATION_SCOPE,
        IS_UPDATE_CHECK_CONFIGURED,
        WEB_PAGE_URL,
        VERSION_SEARCH_METHOD,
        VERSION_SEARCH_METHOD_ARGUMENT_1,
        VERSION_SEARCH_METHOD_ARGUMENT_2,
        TREAT_A_STANDALONE_NUMBER_AS_A_VERSION,
        VERSION_SEARCH_BEHAVIOR,
        WEB_PAGE_POST_LOAD_DELAY,
        CLICK_INSTRUCTIONS,
        IS_AUTOMATICALLY_ADDED,
        UPDATE_CHECK_CONFIGURATION_STATUS,
        UPDATE_CHECK_CONFIGURATION_ERROR,
        IS_HIDDEN,
    ],
};

/// Adds the skipped version and the "newly discovered" flag.
pub static PROGRAMS_V1_1: TableSchema = TableSchema {
    table: PROGRAMS_TABLE,
    version: VersionTag::new(1, 1),
    columns: &[
        ID,
        NAME,
        INSTALLED_VERSION,
        LATEST_VERSION,
        INSTALLATION_SCOPE,
        IS_UPDATE_CHECK_CONFIGURED,
        WEB_PAGE_URL,
        VERSION_SEARCH_METHOD,
        VERSION_SEARCH_METHOD_ARGUMENT_1,
        VERSION_SEARCH_METHOD_ARGUMENT_2,
        TREAT_A_STANDALONE_NUMBER_AS_A_VERSION,
        VERSION_SEARCH_BEHAVIOR,
        WEB_PAGE_POST_LOAD_DELAY,
        CLICK_INSTRUCTIONS,
        IS_AUTOMATICALLY_ADDED,
        UPDATE_CHECK_CONFIGURATION_STATUS,
        UPDATE_CHECK_CONFIGURATION_ERROR,
        IS_HIDDEN,
        SKIPPED_VERSION,
        IS_NEW,
    ],
};

/// The schema this build writes.
pub static PROGRAMS: &TableSchema = &PROGRAMS_V1_1;
