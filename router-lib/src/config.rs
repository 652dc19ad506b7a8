//! Router configuration file.
//!
//! ```yaml
//! logging:
//!   debug: uav_router::routing
//!   warning: [uav_router::filters]
//! routes:
//!   gps:
//!     src: uart0
//!     dst: { type: nmea, dst: log, rest: ${JUNK_ENDPOINT:-junk} }
//! stats:
//!   endpoint: log
//! endpoints:
//!   file:
//!     log: { path: /var/log/gps.nmea, append: true }
//! ```
//!
//! `${VAR}` and `${VAR:-default}` are replaced from the environment before the document is
//! parsed.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{error, warn};

use crate::routing::RouteTable;
use crate::{Error, Result};

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env reference regex to compile")
});

/// Substitute `${VAR}` and `${VAR:-default}` references. An unset variable without a default
/// expands to nothing.
///
/// Expansion is a single pass: a reference inside a variable's value or a default is left as
/// written, nested references are not expanded.
pub fn expand_env(text: &str) -> String {
    expand_with(text, |name| std::env::var(name).ok())
}

fn expand_with<F: Fn(&str) -> Option<String>>(text: &str, lookup: F) -> String {
    let expanded = ENV_REFERENCE.replace_all(text, |caps: &Captures| {
        lookup(&caps[1]).unwrap_or_else(|| {
            caps.get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        })
    });
    expanded.into_owned()
}

/// Read a configuration file and parse it into a YAML document after environment expansion.
///
/// # Errors
/// [Error::Io] if the file cannot be read, [Error::Yaml] if it is not YAML.
pub fn load_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    parse_document(&text)
}

/// # Errors
/// [Error::Yaml] if the expanded text is not YAML.
pub fn parse_document(text: &str) -> Result<Value> {
    Ok(serde_yaml::from_str(&expand_env(text))?)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum Targets {
    One(String),
    Many(Vec<String>),
}

impl Targets {
    fn iter(&self) -> impl Iterator<Item = &str> {
        let items = match self {
            Targets::One(one) => std::slice::from_ref(one),
            Targets::Many(many) => many.as_slice(),
        };
        items.iter().map(String::as_str)
    }
}

/// `logging` section: level name to one or more log targets.
///
/// The target `*` sets the default level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LoggingConfig {
    levels: BTreeMap<String, Targets>,
}

impl LoggingConfig {
    /// Level names, least verbose first, with the `tracing` level each maps to.
    pub const LEVELS: [(&'static str, &'static str); 7] = [
        ("disable", "off"),
        ("error", "error"),
        ("warning", "warn"),
        ("notice", "info"),
        ("info", "info"),
        ("debug", "debug"),
        ("trace", "trace"),
    ];

    /// # Errors
    /// [Error::Yaml] if the section is not a map of level to target names.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(serde_yaml::from_value(value.clone())?)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Filter directives, least verbose level first, e.g. `uav_router::filters=debug`.
    pub fn directives(&self) -> Vec<String> {
        for level in self.levels.keys() {
            if !Self::LEVELS.iter().any(|(name, _)| *name == level.as_str()) {
                warn!(level = %level, "unknown log level ignored");
            }
        }
        let mut out = Vec::new();
        for (name, level) in Self::LEVELS {
            let Some(targets) = self.levels.get(name) else {
                continue;
            };
            for target in targets.iter() {
                out.push(match target {
                    "*" => level.to_string(),
                    target => format!("{target}={level}"),
                });
            }
        }
        out
    }
}

/// `stats` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Endpoint counters are reported to.
    pub endpoint: String,
}

/// An entry of `endpoints.file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEndpoint {
    pub path: PathBuf,
    /// Append to an existing file instead of truncating it.
    #[serde(default)]
    pub append: bool,
}

/// A parsed configuration file.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub routes: RouteTable,
    pub logging: LoggingConfig,
    pub stats: Option<StatsConfig>,
    /// Transport definitions, interpreted by whoever creates the endpoints.
    pub endpoints: Value,
}

impl RouterConfig {
    /// # Errors
    /// See [load_document] and [RouterConfig::from_value].
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_value(&load_document(path)?)
    }

    /// # Errors
    /// See [parse_document] and [RouterConfig::from_value].
    pub fn from_yaml(text: &str) -> Result<Self> {
        Self::from_value(&parse_document(text)?)
    }

    /// Build from an expanded document. Malformed routes are logged and skipped.
    ///
    /// # Errors
    /// [Error::Config] if the document or its `routes` section is not a map,
    /// [Error::Yaml] if `logging` or `stats` are malformed.
    pub fn from_value(doc: &Value) -> Result<Self> {
        let Value::Mapping(doc) = doc else {
            return Err(Error::Config("configuration must be a map".to_string()));
        };
        let routes = doc
            .get("routes")
            .ok_or_else(|| Error::Config("missing routes section".to_string()))?;
        let logging = match doc.get("logging") {
            Some(section) => LoggingConfig::from_value(section)?,
            None => LoggingConfig::default(),
        };
        let stats = doc
            .get("stats")
            .map(|v| serde_yaml::from_value::<StatsConfig>(v.clone()))
            .transpose()?;
        Ok(RouterConfig {
            routes: RouteTable::from_value(routes)?,
            logging,
            stats,
            endpoints: doc.get("endpoints").cloned().unwrap_or(Value::Null),
        })
    }

    /// Entries of `endpoints.file`, by name. Malformed entries are logged and skipped.
    pub fn file_endpoints(&self) -> Vec<(String, FileEndpoint)> {
        let Some(Value::Mapping(files)) = self.endpoints.get("file") else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(files.len());
        for (key, value) in files {
            let Some(name) = key.as_str() else {
                error!(endpoint = ?key, "file endpoint name must be a string");
                continue;
            };
            match serde_yaml::from_value::<FileEndpoint>(value.clone()) {
                Ok(file) => out.push((name.to_string(), file)),
                Err(err) => error!(endpoint = name, "invalid file endpoint: {err}"),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "HOST" => Some("gcs".to_string()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn env_references() {
        assert_eq!(expand_with("dst: ${HOST}", lookup), "dst: gcs");
        assert_eq!(expand_with("${HOST:-x}/${PORT:-14550}", lookup), "gcs/14550");
        assert_eq!(expand_with("[${MISSING}]", lookup), "[]");
        assert_eq!(expand_with("[${EMPTY:-x}]", lookup), "[]");
        assert_eq!(expand_with("$HOST ${ HOST", lookup), "$HOST ${ HOST");
    }

    #[test]
    fn expansion_is_single_pass() {
        let lookup = |name: &str| (name == "OUTER").then(|| "${INNER}".to_string());
        assert_eq!(expand_with("dst: ${OUTER}", lookup), "dst: ${INNER}");
    }

    #[test]
    fn logging_directives() {
        let logging = LoggingConfig::from_value(
            &serde_yaml::from_str("{ debug: [a, b], warning: '*', notice: c, loud: d }").unwrap(),
        )
        .unwrap();
        assert_eq!(logging.directives(), vec!["warn", "c=info", "a=debug", "b=debug"]);
    }

    #[test]
    fn full_document() {
        let cfg = RouterConfig::from_yaml(
            r"
routes:
  r1: { src: uart0, dst: gcs }
  broken: { src: uart0 }
stats: { endpoint: gcs }
endpoints:
  file:
    gcs: { path: /tmp/gcs.bin }
    bad: { append: true }
",
        )
        .unwrap();
        assert_eq!(cfg.routes.len(), 1);
        assert_eq!(cfg.stats.as_ref().unwrap().endpoint, "gcs");
        assert!(cfg.logging.is_empty());
        let files = cfg.file_endpoints();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "gcs");
        assert!(!files[0].1.append);
    }

    #[test]
    fn routes_are_required() {
        assert!(matches!(
            RouterConfig::from_yaml("logging: {}"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RouterConfig::from_yaml("- a"),
            Err(Error::Config(_))
        ));
    }
}
