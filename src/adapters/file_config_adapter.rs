//! INI file configuration adapter.

use crate::domain::error::TraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TraderError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(TraderError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("config file not found: {}", path.display()),
            )));
        }
        let mut ini = Ini::new();
        let loaded = ini.load(path).map(drop);
        Self::finish(ini, loaded, &path.display().to_string())
    }

    pub fn from_string(content: &str) -> Result<Self, TraderError> {
        let mut ini = Ini::new();
        let loaded = ini.read(content.to_owned()).map(drop);
        Self::finish(ini, loaded, "<string>")
    }

    fn finish(config: Ini, loaded: Result<(), String>, file: &str) -> Result<Self, TraderError> {
        loaded.map_err(|reason| TraderError::ConfigParse {
            file: file.to_owned(),
            reason,
        })?;
        Ok(Self { config })
    }
}

/// Accepts the usual INI spellings of a flag, case-insensitively.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(parse_flag)
            .unwrap_or(default)
    }
}
