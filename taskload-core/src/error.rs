use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid duration `{0}`")]
    Duration(String),

    #[error("Invalid stage `{0}`, expected `<target>:<duration>`")]
    Stage(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid threshold: {0}")]
    Threshold(#[from] ThresholdError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("unsupported tag `{0}` (expected `name:<request>` or, on group_duration, `group:<path>`)")]
    UnknownTag(String),

    #[error("unknown request name `{0}`")]
    UnknownRequest(String),

    #[error("unknown group `{0}`")]
    UnknownGroup(String),

    #[error("malformed expression `{0}`")]
    Malformed(String),

    #[error("aggregation `{aggregation}` does not apply to `{metric}`")]
    Aggregation { metric: String, aggregation: String },

    #[error("no expressions given for `{0}`")]
    Empty(String),
}
