//! Error types for Setu

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Setu error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Local I/O error (artifact files, listener configuration)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Read or write failure on the client socket
    #[error("Transport error: {0}")]
    Transport(std::io::Error),

    /// Peer closed the connection
    #[error("Client disconnected")]
    Disconnected,

    /// Listener could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Requested `address:port`
        address: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Command id with no entry in the payload table
    #[error("Unknown command id: {0}")]
    UnknownCommand(i32),

    /// Offscreen render target could not be allocated or read back
    #[error("Render target error: {0}")]
    RenderTarget(String),

    /// Simulation engine rejected a call
    #[error("Engine error: {0}")]
    Engine(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pixel buffer length does not match the frame dimensions
    #[error("Frame of {len} bytes does not fit {width}x{height}")]
    FrameSize { len: usize, width: u32, height: u32 },

    /// Snapshot encoding failure
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Other errors (signal handler setup and the like)
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors that end the current session but not the process.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Disconnected)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
