use thiserror::Error;

#[derive(Debug, Error)]
pub enum DhtError {
    #[error("adnl error: {0}")]
    Adnl(#[from] tonlite_adnl::AdnlError),

    #[error("tl error: {0}")]
    Tl(#[from] tonlite_tl::TlError),

    #[error("invalid dht key: {0}")]
    InvalidKey(String),

    #[error("invalid dht node: {0}")]
    InvalidNode(String),

    #[error("signature rejected")]
    SignatureRejected,

    #[error("value expired (ttl {0})")]
    ValueExpired(i32),

    #[error("value not found")]
    ValueNotFound,

    #[error("unexpected answer 0x{0:08x}")]
    UnexpectedAnswer(u32),
}

pub type DhtResult<T> = Result<T, DhtError>;
