use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiteError {
    #[error("transport: {0}")]
    Adnl(#[from] tonlite_adnl::AdnlError),

    #[error("tl: {0}")]
    Tl(#[from] tonlite_tl::TlError),

    #[error("cell: {0}")]
    Cell(#[from] tonlite_cell::CellError),

    #[error("liteserver error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("unexpected answer constructor 0x{0:08x}")]
    UnexpectedAnswer(u32),

    #[error("proof rejected: {0}")]
    Proof(String),

    #[error("get method failed with exit code {0}")]
    ExitCode(i32),

    #[error("config: {0}")]
    Config(String),

    #[error("block store: {0}")]
    Store(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("no alive peers")]
    NoPeers,
}

impl LiteError {
    /// True for failures the balancer may retry on another peer.
    /// Proof and server errors are deterministic and never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Adnl(tonlite_adnl::AdnlError::QueryTimeout)
                | Self::Adnl(tonlite_adnl::AdnlError::ConnectionClosed)
                | Self::Adnl(tonlite_adnl::AdnlError::Io(_))
        )
    }
}

pub type LiteResult<T> = Result<T, LiteError>;
