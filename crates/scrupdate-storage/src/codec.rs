//! Conversion between [`Program`] and flat database rows.
//!
//! A [`FlatRecord`] maps column names to SQLite values. Encoding always
//! produces every column the current domain type knows about; writing a
//! record only binds the columns the active [`TableSchema`] declares.
//! Decoding reads whatever columns are present and leaves the rest at their
//! [`Program::default`] values, so rows from an older minor version decode.
//!
//! Column encodings:
//! - strings: TEXT
//! - booleans: INTEGER `0` / `1`
//! - enums: INTEGER code ([`InstallationScope::code`] and friends)
//! - click instructions: compact JSON array, enums as variant names

use std::collections::BTreeMap;

use rusqlite::types::Value;
use rusqlite::Row;

use scrupdate_core::{
    CoreError, InstallationScope, Program, UpdateCheckConfigurationError,
    UpdateCheckConfigurationStatus, VersionSearchBehavior, VersionSearchMethod,
    WebpageElementLocatingInstruction, WebpagePostLoadDelay,
};

use crate::error::StoreError;
use crate::schema::{columns, ColumnDefault, TableSchema};

/// One row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRecord {
    values: BTreeMap<&'static str, Value>,
}

impl FlatRecord {
    pub fn new() -> Self {
        FlatRecord::default()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<Value>) {
        self.values.insert(column, value.into());
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reads the data columns of `schema` from a row produced by
    /// [`TableSchema::select_sql`].
    pub(crate) fn from_row(row: &Row<'_>, schema: &TableSchema) -> rusqlite::Result<Self> {
        let mut record = FlatRecord::new();
        for (index, column) in schema.data_columns().enumerate() {
            let value: Value = row.get(index)?;
            record.values.insert(column.name, value);
        }
        Ok(record)
    }

    /// Values for the data columns of `schema`, in declaration order.
    ///
    /// A column the record lacks is bound to its declared default.
    pub(crate) fn bind_values(&self, schema: &TableSchema) -> Vec<Value> {
        schema
            .data_columns()
            .map(|column| match self.values.get(column.name) {
                Some(value) => value.clone(),
                None => match column.default {
                    ColumnDefault::None => Value::Null,
                    ColumnDefault::Integer(value) => Value::Integer(value),
                    ColumnDefault::Text(value) => Value::Text(value.to_string()),
                },
            })
            .collect()
    }

    fn text(&self, column: &'static str) -> Result<Option<String>, StoreError> {
        match self.values.get(column) {
            None => Ok(None),
            Some(Value::Text(text)) => Ok(Some(text.clone())),
            Some(other) => Err(type_mismatch(column, "TEXT", other)),
        }
    }

    fn integer(&self, column: &'static str) -> Result<Option<i64>, StoreError> {
        match self.values.get(column) {
            None => Ok(None),
            Some(Value::Integer(value)) => Ok(Some(*value)),
            Some(other) => Err(type_mismatch(column, "INTEGER", other)),
        }
    }

    fn flag(&self, column: &'static str) -> Result<Option<bool>, StoreError> {
        Ok(self.integer(column)?.map(|value| value != 0))
    }

    fn coded<T>(
        &self,
        column: &'static str,
        from_code: fn(i64) -> Result<T, CoreError>,
    ) -> Result<Option<T>, StoreError> {
        match self.integer(column)? {
            Some(code) => Ok(Some(from_code(code)?)),
            None => Ok(None),
        }
    }
}

fn type_mismatch(column: &str, expected: &str, found: &Value) -> StoreError {
    StoreError::Corrupted {
        reason: format!(
            "column {column} holds {:?}, expected {expected}",
            found.data_type()
        ),
    }
}

fn flag_value(flag: bool) -> i64 {
    i64::from(flag)
}

/// Compact JSON for a click-instruction list.
pub fn encode_click_instructions(
    instructions: &[WebpageElementLocatingInstruction],
) -> Result<String, StoreError> {
    Ok(serde_json::to_string(instructions)?)
}

pub fn decode_click_instructions(
    json: &str,
) -> Result<Vec<WebpageElementLocatingInstruction>, StoreError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(json)?)
}

/// Flattens `program` into one value per known column.
pub fn encode(program: &Program) -> Result<FlatRecord, StoreError> {
    let mut record = FlatRecord::new();
    record.set(columns::NAME, program.name.clone());
    record.set(columns::INSTALLED_VERSION, program.installed_version.clone());
    record.set(columns::LATEST_VERSION, program.latest_version.clone());
    record.set(columns::INSTALLATION_SCOPE, program.installation_scope.code());
    record.set(
        columns::IS_UPDATE_CHECK_CONFIGURED,
        flag_value(program.is_update_check_configured),
    );
    record.set(columns::WEB_PAGE_URL, program.webpage_url.clone());
    record.set(
        columns::VERSION_SEARCH_METHOD,
        program.version_search_method.code(),
    );
    record.set(
        columns::VERSION_SEARCH_METHOD_ARGUMENT_1,
        program.version_search_method_argument_1.clone(),
    );
    record.set(
        columns::VERSION_SEARCH_METHOD_ARGUMENT_2,
        program.version_search_method_argument_2.clone(),
    );
    record.set(
        columns::TREAT_A_STANDALONE_NUMBER_AS_A_VERSION,
        flag_value(program.treat_a_standalone_number_as_a_version),
    );
    record.set(
        columns::VERSION_SEARCH_BEHAVIOR,
        program.version_search_behavior.code(),
    );
    record.set(
        columns::WEB_PAGE_POST_LOAD_DELAY,
        program.webpage_post_load_delay.code(),
    );
    record.set(
        columns::CLICK_INSTRUCTIONS,
        encode_click_instructions(&program.click_instructions)?,
    );
    record.set(
        columns::IS_AUTOMATICALLY_ADDED,
        flag_value(program.is_automatically_added),
    );
    record.set(
        columns::UPDATE_CHECK_CONFIGURATION_STATUS,
        program.update_check_configuration_status.code(),
    );
    record.set(
        columns::UPDATE_CHECK_CONFIGURATION_ERROR,
        program.update_check_configuration_error.code(),
    );
    record.set(columns::SKIPPED_VERSION, program.skipped_version.clone());
    record.set(columns::IS_HIDDEN, flag_value(program.is_hidden));
    record.set(columns::IS_NEW, flag_value(program.is_new));
    Ok(record)
}

/// Rebuilds a program from `record`; absent columns take defaults.
pub fn decode(record: &FlatRecord) -> Result<Program, StoreError> {
    let defaults = Program::default();
    let click_instructions = match record.text(columns::CLICK_INSTRUCTIONS)? {
        Some(json) => decode_click_instructions(&json)?,
        None => defaults.click_instructions,
    };

    Ok(Program {
        name: record.text(columns::NAME)?.unwrap_or(defaults.name),
        installed_version: record
            .text(columns::INSTALLED_VERSION)?
            .unwrap_or(defaults.installed_version),
        latest_version: record
            .text(columns::LATEST_VERSION)?
            .unwrap_or(defaults.latest_version),
        installation_scope: record
            .coded(columns::INSTALLATION_SCOPE, InstallationScope::from_code)?
            .unwrap_or(defaults.installation_scope),
        is_update_check_configured: record
            .flag(columns::IS_UPDATE_CHECK_CONFIGURED)?
            .unwrap_or(defaults.is_update_check_configured),
        webpage_url: record
            .text(columns::WEB_PAGE_URL)?
            .unwrap_or(defaults.webpage_url),
        version_search_method: record
            .coded(columns::VERSION_SEARCH_METHOD, VersionSearchMethod::from_code)?
            .unwrap_or(defaults.version_search_method),
        version_search_method_argument_1: record
            .text(columns::VERSION_SEARCH_METHOD_ARGUMENT_1)?
            .unwrap_or(defaults.version_search_method_argument_1),
        version_search_method_argument_2: record
            .text(columns::VERSION_SEARCH_METHOD_ARGUMENT_2)?
            .unwrap_or(defaults.version_search_method_argument_2),
        treat_a_standalone_number_as_a_version: record
            .flag(columns::TREAT_A_STANDALONE_NUMBER_AS_A_VERSION)?
            .unwrap_or(defaults.treat_a_standalone_number_as_a_version),
        version_search_behavior: record
            .coded(
                columns::VERSION_SEARCH_BEHAVIOR,
                VersionSearchBehavior::from_code,
            )?
            .unwrap_or(defaults.version_search_behavior),
        webpage_post_load_delay: record
            .coded(
                columns::WEB_PAGE_POST_LOAD_DELAY,
                WebpagePostLoadDelay::from_code,
            )?
            .unwrap_or(defaults.webpage_post_load_delay),
        click_instructions,
        is_automatically_added: record
            .flag(columns::IS_AUTOMATICALLY_ADDED)?
            .unwrap_or(defaults.is_automatically_added),
        update_check_configuration_status: record
            .coded(
                columns::UPDATE_CHECK_CONFIGURATION_STATUS,
                UpdateCheckConfigurationStatus::from_code,
            )?
            .unwrap_or(defaults.update_check_configuration_status),
        update_check_configuration_error: record
            .coded(
                columns::UPDATE_CHECK_CONFIGURATION_ERROR,
                UpdateCheckConfigurationError::from_code,
            )?
            .unwrap_or(defaults.update_check_configuration_error),
        skipped_version: record
            .text(columns::SKIPPED_VERSION)?
            .unwrap_or(defaults.skipped_version),
        is_hidden: record
            .flag(columns::IS_HIDDEN)?
            .unwrap_or(defaults.is_hidden),
        is_new: record.flag(columns::IS_NEW)?.unwrap_or(defaults.is_new),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PROGRAMS, PROGRAMS_V1_0};
    use proptest::prelude::*;
    use proptest::sample::select;
    use scrupdate_core::{LocatingInterval, LocatingMethod};

    fn configured_program() -> Program {
        Program {
            name: "Notepad++".into(),
            installed_version: "8.5.1".into(),
            latest_version: "8.6".into(),
            installation_scope: InstallationScope::Everyone,
            is_update_check_configured: true,
            webpage_url: "https://notepad-plus-plus.org/downloads/".into(),
            version_search_method: VersionSearchMethod::SearchGloballyFromTextWithinWebpage,
            version_search_method_argument_1: "Current Version".into(),
            treat_a_standalone_number_as_a_version: true,
            version_search_behavior: VersionSearchBehavior::GetTheFirstVersionThatIsFound,
            webpage_post_load_delay: WebpagePostLoadDelay::Ms500,
            click_instructions: vec![WebpageElementLocatingInstruction::new(
                LocatingMethod::ByInnerText,
                "Accept cookies",
                true,
                LocatingInterval::Ms250,
            )],
            is_automatically_added: true,
            update_check_configuration_status: UpdateCheckConfigurationStatus::Valid,
            skipped_version: "8.5.9".into(),
            is_new: true,
            ..Program::default()
        }
    }

    #[test]
    fn encode_uses_integer_codes_and_flags() {
        let record = encode(&configured_program()).unwrap();
        assert_eq!(
            record.get(columns::INSTALLATION_SCOPE),
            Some(&Value::Integer(1))
        );
        assert_eq!(
            record.get(columns::VERSION_SEARCH_METHOD),
            Some(&Value::Integer(4))
        );
        assert_eq!(record.get(columns::IS_HIDDEN), Some(&Value::Integer(0)));
        assert_eq!(record.get(columns::IS_NEW), Some(&Value::Integer(1)));
        assert_eq!(record.len(), PROGRAMS.data_columns().count());
    }

    #[test]
    fn click_instructions_are_compact_json() {
        let json = encode_click_instructions(&configured_program().click_instructions).unwrap();
        insta::assert_snapshot!(json, @r###"[{"locating_method":"ByInnerText","method_argument":"Accept cookies","match_exact_text":true,"locating_interval":"Ms250"}]"###);
    }

    #[test]
    fn empty_click_instruction_text_decodes_to_empty_list() {
        assert!(decode_click_instructions("").unwrap().is_empty());
        assert!(decode_click_instructions("[]").unwrap().is_empty());
        assert!(decode_click_instructions("{not json").is_err());
    }

    #[test]
    fn missing_columns_take_defaults() {
        let mut record = encode(&configured_program()).unwrap();
        record.remove(columns::SKIPPED_VERSION);
        record.remove(columns::IS_NEW);

        let program = decode(&record).unwrap();
        assert_eq!(program.skipped_version, "");
        assert!(!program.is_new);
        assert_eq!(program.latest_version, "8.6");
    }

    #[test]
    fn unknown_enum_code_is_rejected() {
        let mut record = encode(&configured_program()).unwrap();
        record.set(columns::VERSION_SEARCH_BEHAVIOR, 42i64);
        assert!(matches!(
            decode(&record),
            Err(StoreError::InvalidValue(CoreError::UnknownEnumCode { code: 42, .. }))
        ));
    }

    #[test]
    fn wrong_storage_class_is_corruption() {
        let mut record = encode(&configured_program()).unwrap();
        record.set(columns::IS_HIDDEN, "yes".to_string());
        assert!(matches!(
            decode(&record),
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn bind_values_follow_the_active_schema() {
        let record = encode(&configured_program()).unwrap();
        let values = record.bind_values(&PROGRAMS_V1_0);
        assert_eq!(values.len(), PROGRAMS_V1_0.data_columns().count());
        assert_eq!(values[0], Value::Text("Notepad++".into()));

        let values = FlatRecord::new().bind_values(&PROGRAMS);
        assert_eq!(values.last(), Some(&Value::Integer(0)));
    }

    fn instruction() -> impl Strategy<Value = WebpageElementLocatingInstruction> {
        (
            select(LocatingMethod::ALL),
            ".{0,16}",
            any::<bool>(),
            select(LocatingInterval::ALL),
        )
            .prop_map(|(method, argument, exact, interval)| {
                WebpageElementLocatingInstruction::new(method, argument, exact, interval)
            })
    }

    fn program() -> impl Strategy<Value = Program> {
        let identity = (
            "[a-zA-Z0-9 .+-]{1,24}",
            ".{0,12}",
            ".{0,12}",
            select(InstallationScope::ALL),
            any::<bool>(),
            ".{0,32}",
        );
        let search = (
            select(VersionSearchMethod::ALL),
            ".{0,16}",
            ".{0,16}",
            any::<bool>(),
            select(VersionSearchBehavior::ALL),
            select(WebpagePostLoadDelay::ALL),
            prop::collection::vec(instruction(), 0..4),
        );
        let state = (
            any::<bool>(),
            select(UpdateCheckConfigurationStatus::ALL),
            select(UpdateCheckConfigurationError::ALL),
            ".{0,12}",
            any::<bool>(),
            any::<bool>(),
        );
        (identity, search, state).prop_map(
            |(
                (name, installed, latest, scope, configured, url),
                (method, arg1, arg2, standalone, behavior, delay, clicks),
                (auto, status, error, skipped, hidden, new),
            )| Program {
                name,
                installed_version: installed,
                latest_version: latest,
                installation_scope: scope,
                is_update_check_configured: configured,
                webpage_url: url,
                version_search_method: method,
                version_search_method_argument_1: arg1,
                version_search_method_argument_2: arg2,
                treat_a_standalone_number_as_a_version: standalone,
                version_search_behavior: behavior,
                webpage_post_load_delay: delay,
                click_instructions: clicks,
                is_automatically_added: auto,
                update_check_configuration_status: status,
                update_check_configuration_error: error,
                skipped_version: skipped,
                is_hidden: hidden,
                is_new: new,
            },
        )
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(program in program()) {
            let record = encode(&program).unwrap();
            prop_assert_eq!(decode(&record).unwrap(), program);
        }
    }
}
