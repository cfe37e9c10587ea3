/// Client-side failure taxonomy.
///
/// Transport problems are recoverable by design: the feed and tracker degrade
/// to empty/default state, the connector retries within its budget. `Api`
/// means the backend was reached and said no.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// REST transport failure: backend unreachable, DNS, timeout.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] reqwest::Error),

    /// WebSocket connect/read/write failure.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server answered with `success: false`.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
}

pub type ClientResult<T> = Result<T, ClientError>;
