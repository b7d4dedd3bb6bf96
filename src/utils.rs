use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

/// Get the configuration directory path for OMC
/// If profile is Dev, uses "omc-dev" instead of "omc"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    let app_name = match profile {
        Profile::Dev => "omc-dev",
        Profile::Prod => "omc",
    };
    ProjectDirs::from("com", "omc", app_name).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path for OMC
/// If profile is Dev, uses "omc-dev" instead of "omc"
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    let app_name = match profile {
        Profile::Dev => "omc-dev",
        Profile::Prod => "omc",
    };
    ProjectDirs::from("com", "omc", app_name).map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<chrono::NaiveDate, chrono::ParseError> {
    chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
}

/// Get the current date as an ISO 8601 string (YYYY-MM-DD)
pub fn get_current_date_string() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Current timestamp string used on every created record
pub fn timestamp_now() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse a 24-hour "HH:MM" string into minutes since midnight.
/// Returns None for anything that is not a valid time of day.
pub fn parse_time(time_str: &str) -> Option<u32> {
    let (hours, minutes) = time_str.trim().split_once(':')?;
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours < 24 && minutes < 60 {
        Some(hours * 60 + minutes)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_time_accepts_valid_times() {
        assert_eq!(parse_time("00:00"), Some(0));
        assert_eq!(parse_time("08:30"), Some(510));
        assert_eq!(parse_time("23:59"), Some(1439));
        assert_eq!(parse_time(" 9:05 "), Some(545));
    }

    #[test]
    fn parse_time_rejects_garbage() {
        assert_eq!(parse_time("24:00"), None);
        assert_eq!(parse_time("12:60"), None);
        assert_eq!(parse_time("noon"), None);
        assert_eq!(parse_time(""), None);
    }

    #[test]
    fn parse_date_accepts_iso_dates() {
        assert!(parse_date("2026-08-06").is_ok());
        assert!(parse_date("08/06/2026").is_err());
    }
}
