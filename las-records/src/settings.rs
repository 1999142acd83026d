use crate::header::date::LeapYearRule;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// What header setters do.
///
/// Writing header fields back requires rewriting the surrounding file,
/// which is up to the owner of the byte stream. So the setters never modify
/// anything - they either accept the value silently, or fail.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum SetterPolicy {
    #[default]
    Ignore,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    pub setter_policy: SetterPolicy,
    pub leap_year_rule: LeapYearRule,

    /// Fail on files, that do not start with "LASF".
    pub verify_signature: bool,
}

impl Default for CodecSettings {
    fn default() -> Self {
        CodecSettings {
            setter_policy: SetterPolicy::Ignore,
            leap_year_rule: LeapYearRule::Compatible,
            verify_signature: true,
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerDe(#[from] serde_json::Error),
}

impl CodecSettings {
    pub fn load_from_file(file_name: &Path) -> Result<Self, SettingsIoError> {
        let file = File::open(file_name)?;
        let settings = serde_json::from_reader(file)?;
        Ok(settings)
    }

    pub fn save_to_file(&self, file_name: &Path) -> Result<(), SettingsIoError> {
        let file = File::create(file_name)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CodecSettings, SetterPolicy};
    use crate::header::date::LeapYearRule;

    #[test]
    fn test_settings_file_roundtrip() {
        let settings = CodecSettings {
            setter_policy: SetterPolicy::Reject,
            leap_year_rule: LeapYearRule::Gregorian,
            verify_signature: false,
        };
        let mut path = std::env::temp_dir();
        path.push(format!("las-records-settings-{}.json", std::process::id()));
        settings.save_to_file(&path).unwrap();
        let read_back = CodecSettings::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(settings, read_back);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let settings: CodecSettings =
            serde_json::from_str(r#"{ "setter_policy": "Reject" }"#).unwrap();
        assert_eq!(settings.setter_policy, SetterPolicy::Reject);
        assert_eq!(settings.leap_year_rule, LeapYearRule::Compatible);
        assert!(settings.verify_signature);
    }
}
