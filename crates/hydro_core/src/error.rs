use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o failed for key `{key}`")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode payload for key `{key}`")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("failed to fetch plants")]
    PlantFetch(#[source] anyhow::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid email address `{0}`")]
    InvalidEmail(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
