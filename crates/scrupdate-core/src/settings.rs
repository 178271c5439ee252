//! Application settings persisted by the settings store.
//!
//! Every section is `#[serde(default)]` so a settings file written by an
//! older minor version (missing fields) still decodes, and fields removed in
//! a newer minor version are ignored on read.

use serde::{Deserialize, Serialize};

/// All persisted settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cached: CachedSettings,
    pub general: GeneralSettings,
    pub appearance: AppearanceSettings,
    pub chromedriver: ChromeDriverSettings,
}

/// State remembered between runs rather than chosen by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachedSettings {
    pub last_window_state: Option<WindowState>,
    pub last_window_size: Option<WindowSize>,
    pub last_window_location: Option<WindowLocation>,
    pub last_hash_of_all_installed_programs: String,
    pub last_program_filtering_state: bool,
    pub last_program_filtering_option: ProgramFilteringOption,
    pub last_show_hidden_programs_state: bool,
    /// Seconds since the Unix epoch.
    pub last_program_updates_check_time: Option<u64>,
    /// Seconds since the Unix epoch.
    pub last_program_updates_scheduled_check_attempt_time: Option<u64>,
    pub last_checksum_of_installed_chrome_executable: String,
    pub last_default_chromedriver_user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowState {
    Normal,
    Minimized,
    Maximized,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowLocation {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgramFilteringOption {
    #[default]
    Unknown,
    All,
    OnlyUpdates,
    OnlyUpToDate,
    OnlyAutomaticallyAdded,
    OnlyManuallyAdded,
    OnlyInstalled,
    OnlyUninstalled,
    OnlyValid,
    OnlyInvalid,
    OnlyNotChecked,
    OnlyNotConfigured,
}

/// Set of week days, one bit per day starting with Sunday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekDays(pub u8);

impl WeekDays {
    pub const NONE: WeekDays = WeekDays(0);
    pub const SUNDAY: WeekDays = WeekDays(1);
    pub const MONDAY: WeekDays = WeekDays(1 << 1);
    pub const TUESDAY: WeekDays = WeekDays(1 << 2);
    pub const WEDNESDAY: WeekDays = WeekDays(1 << 3);
    pub const THURSDAY: WeekDays = WeekDays(1 << 4);
    pub const FRIDAY: WeekDays = WeekDays(1 << 5);
    pub const SATURDAY: WeekDays = WeekDays(1 << 6);

    pub const fn union(self, other: WeekDays) -> WeekDays {
        WeekDays(self.0 | other.0)
    }

    pub const fn contains(self, other: WeekDays) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Behaviour the user configures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub enable_scanning_for_installed_programs: bool,
    pub scan_for_installed_programs_automatically_on_start: bool,
    pub remember_last_program_list_options: bool,
    pub enable_scheduled_check_for_program_updates: bool,
    pub program_updates_scheduled_check_days: WeekDays,
    /// Hour of day, `0..=23`.
    pub program_updates_scheduled_check_hour: u8,
    pub include_hidden_programs_in_scheduled_check_results: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        GeneralSettings {
            enable_scanning_for_installed_programs: true,
            scan_for_installed_programs_automatically_on_start: true,
            remember_last_program_list_options: false,
            enable_scheduled_check_for_program_updates: false,
            program_updates_scheduled_check_days: WeekDays::NONE,
            program_updates_scheduled_check_hour: 0,
            include_hidden_programs_in_scheduled_check_results: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceSettings {
    /// `0.0` means "use the system scaling factor".
    pub windows_scaling_factor: f64,
    pub minimum_version_segments: u8,
    pub maximum_version_segments: u8,
    pub remove_trailing_zero_segments_of_versions: bool,
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        AppearanceSettings {
            windows_scaling_factor: 0.0,
            minimum_version_segments: 2,
            maximum_version_segments: 4,
            remove_trailing_zero_segments_of_versions: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageLoadTimeout {
    NoTimeout,
    After1Seconds,
    After3Seconds,
    After5Seconds,
    After10Seconds,
    #[default]
    After15Seconds,
    After30Seconds,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeDriverSettings {
    pub page_load_timeout: PageLoadTimeout,
    pub use_custom_user_agent_string: bool,
    pub custom_user_agent_string: String,
}
