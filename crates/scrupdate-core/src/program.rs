//! The tracked-program entity and its configuration enums.
//!
//! A [`Program`] is identified by its `name`. Everything else describes what
//! is installed, where to look for the latest version on the vendor's
//! webpage, and what the last update check concluded.
//!
//! Enums carry stable integer codes (their declaration order) because the
//! program store persists them as INTEGER columns. The codes must never be
//! reordered; new variants go at the end.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Declares a fieldless enum with stable integer codes and a `Default`.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident default $default:ident {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// All variants in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The integer code persisted for this variant.
            pub const fn code(self) -> i64 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            /// Looks up a variant by its persisted code.
            pub fn from_code(code: i64) -> Result<Self, CoreError> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err(CoreError::UnknownEnumCode {
                        enum_name: stringify!($name),
                        code,
                    }),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }
    };
}

coded_enum! {
    /// Who the program was installed for.
    InstallationScope default None {
        None = 0,
        Everyone = 1,
        User = 2,
    }
}

coded_enum! {
    /// Where on the webpage the version string is searched for.
    VersionSearchMethod default Unknown {
        Unknown = 0,
        SearchInTheContentOfHtmlElementWithId = 1,
        SearchInTheContentOfHtmlElementsMatchingXPath = 2,
        SearchGloballyInTheWebpage = 3,
        SearchGloballyFromTextWithinWebpage = 4,
        SearchGloballyUntilTextWithinWebpage = 5,
        SearchGloballyFromTextUntilTextWithinWebpage = 6,
    }
}

coded_enum! {
    /// Which of the versions found on the page is reported.
    VersionSearchBehavior default Unknown {
        Unknown = 0,
        GetTheFirstVersionThatIsFound = 1,
        GetTheFirstVersionThatIsFoundFromTheEnd = 2,
        GetTheLatestVersionFromAllTheVersionsThatAreFound = 3,
    }
}

coded_enum! {
    /// Extra wait after the webpage finished loading.
    WebpagePostLoadDelay default None {
        None = 0,
        Ms100 = 1,
        Ms250 = 2,
        Ms500 = 3,
        Ms1000 = 4,
        Ms2000 = 5,
        Ms3000 = 6,
        Ms4000 = 7,
        Ms5000 = 8,
    }
}

coded_enum! {
    /// Outcome of the last update-check configuration check.
    UpdateCheckConfigurationStatus default Unknown {
        Unknown = 0,
        Invalid = 1,
        Valid = 2,
    }
}

coded_enum! {
    /// Why the last update check failed, if it did.
    UpdateCheckConfigurationError default None {
        None = 0,
        GeneralFailure = 1,
        WebPageDidNotRespond = 2,
        HtmlElementWasNotFound = 3,
        TextWasNotFoundWithinWebPage = 4,
        NoVersionWasFound = 5,
    }
}

coded_enum! {
    /// How a webpage element to click on is located.
    LocatingMethod default Unspecified {
        Unspecified = 0,
        ByHtmlElementId = 1,
        ByXPath = 2,
        ByInnerText = 3,
    }
}

coded_enum! {
    /// Wait after clicking a located element.
    LocatingInterval default Unspecified {
        Unspecified = 0,
        Ms1 = 1,
        Ms10 = 2,
        Ms100 = 3,
        Ms250 = 4,
        Ms500 = 5,
        Ms1000 = 6,
    }
}

impl WebpagePostLoadDelay {
    pub fn as_duration(self) -> Duration {
        let millis = match self {
            WebpagePostLoadDelay::None => 0,
            WebpagePostLoadDelay::Ms100 => 100,
            WebpagePostLoadDelay::Ms250 => 250,
            WebpagePostLoadDelay::Ms500 => 500,
            WebpagePostLoadDelay::Ms1000 => 1000,
            WebpagePostLoadDelay::Ms2000 => 2000,
            WebpagePostLoadDelay::Ms3000 => 3000,
            WebpagePostLoadDelay::Ms4000 => 4000,
            WebpagePostLoadDelay::Ms5000 => 5000,
        };
        Duration::from_millis(millis)
    }
}

impl LocatingInterval {
    /// `Unspecified` maps to zero.
    pub fn as_duration(self) -> Duration {
        let millis = match self {
            LocatingInterval::Unspecified => 0,
            LocatingInterval::Ms1 => 1,
            LocatingInterval::Ms10 => 10,
            LocatingInterval::Ms100 => 100,
            LocatingInterval::Ms250 => 250,
            LocatingInterval::Ms500 => 500,
            LocatingInterval::Ms1000 => 1000,
        };
        Duration::from_millis(millis)
    }
}

/// One click to simulate on the webpage before searching for the version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WebpageElementLocatingInstruction {
    pub locating_method: LocatingMethod,
    pub method_argument: String,
    pub match_exact_text: bool,
    pub locating_interval: LocatingInterval,
}

impl WebpageElementLocatingInstruction {
    pub fn new(
        locating_method: LocatingMethod,
        method_argument: impl Into<String>,
        match_exact_text: bool,
        locating_interval: LocatingInterval,
    ) -> Self {
        WebpageElementLocatingInstruction {
            locating_method,
            method_argument: method_argument.into(),
            match_exact_text,
            locating_interval,
        }
    }
}

/// A tracked program.
///
/// Equality is field-wise, including the click instructions in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Identity key; unique within a program store.
    pub name: String,
    pub installed_version: String,
    pub latest_version: String,
    pub installation_scope: InstallationScope,
    pub is_update_check_configured: bool,
    pub webpage_url: String,
    pub version_search_method: VersionSearchMethod,
    pub version_search_method_argument_1: String,
    pub version_search_method_argument_2: String,
    pub treat_a_standalone_number_as_a_version: bool,
    pub version_search_behavior: VersionSearchBehavior,
    pub webpage_post_load_delay: WebpagePostLoadDelay,
    /// Elements to click, in order, before the version search runs.
    pub click_instructions: Vec<WebpageElementLocatingInstruction>,
    /// Found by the installed-programs scan rather than added by the user.
    pub is_automatically_added: bool,
    pub update_check_configuration_status: UpdateCheckConfigurationStatus,
    pub update_check_configuration_error: UpdateCheckConfigurationError,
    /// A latest version the user chose to ignore. Empty when none.
    pub skipped_version: String,
    pub is_hidden: bool,
    /// Discovered by the most recent scan and not yet seen by the user.
    pub is_new: bool,
}

impl Program {
    /// A manually added program with the given name and defaults elsewhere.
    pub fn named(name: impl Into<String>) -> Self {
        Program {
            name: name.into(),
            ..Program::default()
        }
    }

    /// True when a latest version is known, differs from the installed one,
    /// and has not been skipped.
    pub fn has_pending_update(&self) -> bool {
        !self.latest_version.is_empty()
            && self.latest_version != self.installed_version
            && self.latest_version != self.skipped_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_declaration_order() {
        for (index, method) in VersionSearchMethod::ALL.iter().enumerate() {
            assert_eq!(method.code(), index as i64);
            assert_eq!(VersionSearchMethod::from_code(index as i64), Ok(*method));
        }
        assert_eq!(VersionSearchMethod::ALL.len(), 7);
        assert_eq!(WebpagePostLoadDelay::ALL.len(), 9);
        assert_eq!(UpdateCheckConfigurationError::ALL.len(), 6);
    }

    #[test]
    fn unknown_code_is_reported() {
        assert_eq!(
            InstallationScope::from_code(7),
            Err(CoreError::UnknownEnumCode {
                enum_name: "InstallationScope",
                code: 7
            })
        );
        assert!(LocatingMethod::from_code(-1).is_err());
    }

    #[test]
    fn defaults_are_first_variants() {
        let program = Program::default();
        assert_eq!(program.installation_scope, InstallationScope::None);
        assert_eq!(program.version_search_method, VersionSearchMethod::Unknown);
        assert_eq!(
            program.update_check_configuration_status,
            UpdateCheckConfigurationStatus::Unknown
        );
        assert!(program.click_instructions.is_empty());
        assert!(!program.is_new);
    }

    #[test]
    fn equality_compares_click_instructions_in_order() {
        let first = WebpageElementLocatingInstruction::new(
            LocatingMethod::ByXPath,
            "//a[@id='download']",
            false,
            LocatingInterval::Ms100,
        );
        let second = WebpageElementLocatingInstruction::new(
            LocatingMethod::ByInnerText,
            "Download",
            true,
            LocatingInterval::Ms1000,
        );

        let mut a = Program::named("7-Zip");
        a.click_instructions = vec![first.clone(), second.clone()];
        let mut b = a.clone();
        assert_eq!(a, b);

        b.click_instructions = vec![second, first];
        assert_ne!(a, b);
    }

    #[test]
    fn pending_update_respects_skipped_version() {
        let mut program = Program::named("Git");
        program.installed_version = "2.40".into();
        assert!(!program.has_pending_update());

        program.latest_version = "2.41".into();
        assert!(program.has_pending_update());

        program.skipped_version = "2.41".into();
        assert!(!program.has_pending_update());
    }

    #[test]
    fn durations() {
        assert_eq!(WebpagePostLoadDelay::Ms2000.as_duration(), Duration::from_secs(2));
        assert_eq!(LocatingInterval::Unspecified.as_duration(), Duration::ZERO);
        assert_eq!(LocatingInterval::Ms250.as_duration(), Duration::from_millis(250));
    }

    #[test]
    fn click_instruction_json_shape() {
        let instruction = WebpageElementLocatingInstruction::new(
            LocatingMethod::ByHtmlElementId,
            "dl-button",
            true,
            LocatingInterval::Ms500,
        );
        insta::assert_json_snapshot!(instruction, @r###"
        {
          "locating_method": "ByHtmlElementId",
          "method_argument": "dl-button",
          "match_exact_text": true,
          "locating_interval": "Ms500"
        }
        "###);
    }
}
