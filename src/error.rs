//! Crate-wide error type with POSIX errno reporting for the admin surface.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("already exists")]
    AlreadyExists,
    #[error("interface already attached")]
    Busy,
    #[error("all port slots occupied")]
    Exhausted,
    #[error("out of memory")]
    OutOfMemory,
    #[error("packet too large: {len} > {limit}")]
    PacketTooLarge { len: usize, limit: usize },
    #[error("unreachable output port {0:#06x}")]
    UnreachableOutput(u16),
    #[error("frame has no ingress device")]
    NoIngressDevice,
    #[error("stale port modify")]
    StaleModify,
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("peer protocol version {0:#04x} not supported")]
    VersionMismatch(u8),
    #[error("control queue full")]
    QueueFull,
}

impl Error {
    /// Errno equivalent reported to administrative callers.
    pub fn errno(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => libc::EINVAL,
            Error::NotFound(_) => libc::ENOENT,
            Error::AlreadyExists => libc::EEXIST,
            Error::Busy => libc::EBUSY,
            Error::Exhausted => libc::EXFULL,
            Error::OutOfMemory => libc::ENOMEM,
            Error::PacketTooLarge { .. } => libc::E2BIG,
            Error::UnreachableOutput(_) => libc::ENOENT,
            Error::NoIngressDevice => libc::ESRCH,
            Error::StaleModify => libc::EINVAL,
            Error::Unsupported(_) => libc::EOPNOTSUPP,
            Error::VersionMismatch(_) => libc::EINVAL,
            Error::QueueFull => libc::ENOBUFS,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
