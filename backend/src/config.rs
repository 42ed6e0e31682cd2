//! # Runtime Configuration
//!
//! Settings are read once at start-up from the process environment. A `.env`
//! file in the working directory is loaded first (see `main`), so local
//! development does not need exported variables.
//!
//! | Variable             | Default          | Meaning                                   |
//! |----------------------|------------------|-------------------------------------------|
//! | `HOST`               | `127.0.0.1`      | Bind address                              |
//! | `PORT`               | `8080`           | Bind port                                 |
//! | `DATA_MODE`          | unset            | `json` forces the file backend            |
//! | `DATABASE_URL`       | unset            | SQLite database path (or `sqlite:` URL)   |
//! | `DATA_DIR`           | `./data`         | Directory holding `db.json`               |
//! | `PDF_ENGINE`         | `chromium`       | `chromium` or `builtin`                   |
//! | `CHROME_PATH`        | unset            | Explicit Chromium executable              |
//! | `PDF_TIMEOUT_SECS`   | `60`             | Upper bound for one PDF render            |
//! | `FONT_DIR`           | `./fonts`        | Font directory for the builtin engine     |
//! | `FONT_FAMILY`        | `LiberationSans` | Font family for the builtin engine        |
//! | `JSON_LIMIT_BYTES`   | 2 MiB            | Maximum JSON request body                 |
//! | `UPLOAD_LIMIT_BYTES` | 5 MiB            | Maximum template upload                   |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_JSON_LIMIT: usize = 2 * 1024 * 1024;
const DEFAULT_UPLOAD_LIMIT: usize = 5 * 1024 * 1024;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("PDF_ENGINE must be 'chromium' or 'builtin', got '{0}'")]
    InvalidEngine(String),
}

/// Which persistence backend serves the process.
#[derive(Debug, Clone, PartialEq)]
pub enum DataMode {
    JsonFile { path: PathBuf },
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfEngineKind {
    Chromium,
    Builtin,
}

impl FromStr for PdfEngineKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(PdfEngineKind::Chromium),
            "builtin" | "genpdf" => Ok(PdfEngineKind::Builtin),
            _ => Err(ConfigError::InvalidEngine(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_mode: DataMode,
    pub pdf_engine: PdfEngineKind,
    pub chrome_path: Option<PathBuf>,
    pub pdf_timeout: Duration,
    pub font_dir: PathBuf,
    pub font_family: String,
    pub json_limit: usize,
    pub upload_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_mode = match (var("DATA_MODE"), var("DATABASE_URL")) {
            (Some(mode), _) if mode.eq_ignore_ascii_case("json") => json_mode(var("DATA_DIR")),
            (_, Some(url)) => DataMode::Sqlite {
                path: sqlite_path(&url),
            },
            _ => json_mode(var("DATA_DIR")),
        };

        let pdf_engine = match var("PDF_ENGINE") {
            Some(name) => name.parse()?,
            None => PdfEngineKind::Chromium,
        };

        Ok(Config {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: number("PORT", var("PORT"), 8080)?,
            data_mode,
            pdf_engine,
            chrome_path: var("CHROME_PATH").map(PathBuf::from),
            pdf_timeout: Duration::from_secs(number("PDF_TIMEOUT_SECS", var("PDF_TIMEOUT_SECS"), 60)?),
            font_dir: PathBuf::from(var("FONT_DIR").unwrap_or_else(|| "./fonts".to_string())),
            font_family: var("FONT_FAMILY").unwrap_or_else(|| "LiberationSans".to_string()),
            json_limit: number("JSON_LIMIT_BYTES", var("JSON_LIMIT_BYTES"), DEFAULT_JSON_LIMIT)?,
            upload_limit: number("UPLOAD_LIMIT_BYTES", var("UPLOAD_LIMIT_BYTES"), DEFAULT_UPLOAD_LIMIT)?,
        })
    }
}

fn json_mode(data_dir: Option<String>) -> DataMode {
    let dir = PathBuf::from(data_dir.unwrap_or_else(|| "./data".to_string()));
    DataMode::JsonFile {
        path: dir.join("db.json"),
    }
}

/// Accepts a bare path as well as `sqlite:` and `sqlite://` URLs.
fn sqlite_path(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

fn number<T: FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_use_json_file_in_data_dir() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 8080);
        assert_eq!(
            cfg.data_mode,
            DataMode::JsonFile {
                path: PathBuf::from("./data/db.json")
            }
        );
        assert_eq!(cfg.pdf_engine, PdfEngineKind::Chromium);
        assert_eq!(cfg.pdf_timeout, Duration::from_secs(60));
        assert_eq!(cfg.upload_limit, 5 * 1024 * 1024);
    }

    #[test]
    fn database_url_selects_sqlite_unless_json_forced() {
        let cfg = config(&[("DATABASE_URL", "sqlite:///var/lib/letters.db")]).unwrap();
        assert_eq!(
            cfg.data_mode,
            DataMode::Sqlite {
                path: PathBuf::from("/var/lib/letters.db")
            }
        );

        let cfg = config(&[
            ("DATABASE_URL", "letters.db"),
            ("DATA_MODE", "JSON"),
            ("DATA_DIR", "/tmp/x"),
        ])
        .unwrap();
        assert_eq!(
            cfg.data_mode,
            DataMode::JsonFile {
                path: PathBuf::from("/tmp/x/db.json")
            }
        );
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config(&[("PORT", "  "), ("DATABASE_URL", "")]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(matches!(cfg.data_mode, DataMode::JsonFile { .. }));
    }

    #[test]
    fn malformed_numbers_are_errors() {
        let err = config(&[("PDF_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                name: "PDF_TIMEOUT_SECS",
                value: "soon".into()
            }
        );
        assert!(config(&[("PORT", "70000")]).is_err());
    }

    #[test]
    fn engine_names() {
        assert_eq!(config(&[("PDF_ENGINE", "Builtin")]).unwrap().pdf_engine, PdfEngineKind::Builtin);
        assert!(matches!(
            config(&[("PDF_ENGINE", "wkhtml")]),
            Err(ConfigError::InvalidEngine(_))
        ));
    }
}
