#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An endpoint name with the pattern prefix that is not a valid regular expression.
    #[error("invalid endpoint pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A route entry that cannot be used.
    #[error("route {route:?}: {reason}")]
    Route { route: String, reason: String },

    /// Filter options that cannot be applied.
    #[error("filter {filter:?}: {reason}")]
    Filter { filter: String, reason: String },

    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
