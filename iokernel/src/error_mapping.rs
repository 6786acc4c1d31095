//! Error mapping utilities for converting between error types.
//!
//! Transport failures reach handlers as `std::io::ErrorKind` plus a POSIX
//! errno (Linux numbering), so scripts can match on `err.code`.

use std::io::ErrorKind;

pub const EPERM: i32 = 1;
pub const ENOENT: i32 = 2;
pub const EIO: i32 = 5;
pub const EBADF: i32 = 9;
pub const EAGAIN: i32 = 11;
pub const ENOMEM: i32 = 12;
pub const EACCES: i32 = 13;
pub const EEXIST: i32 = 17;
pub const EINVAL: i32 = 22;
pub const ENOSPC: i32 = 28;
pub const EPIPE: i32 = 32;
pub const EILSEQ: i32 = 84;
pub const ENOTSUP: i32 = 95;
pub const EADDRINUSE: i32 = 98;
pub const EADDRNOTAVAIL: i32 = 99;
pub const ECONNABORTED: i32 = 103;
pub const ECONNRESET: i32 = 104;
pub const ENOTCONN: i32 = 107;
pub const ETIMEDOUT: i32 = 110;
pub const ECONNREFUSED: i32 = 111;
pub const ECANCELED: i32 = 125;

/// Convert errno to `std::io::ErrorKind`
#[must_use]
#[allow(clippy::match_same_arms)]
pub fn errno_to_error_kind(errno: i32) -> ErrorKind {
    match errno {
        EPERM | EACCES => ErrorKind::PermissionDenied,
        ENOENT => ErrorKind::NotFound,
        EBADF | EINVAL | EILSEQ => ErrorKind::InvalidInput,
        ENOMEM | ENOSPC => ErrorKind::OutOfMemory,
        EAGAIN => ErrorKind::WouldBlock,
        EEXIST => ErrorKind::AlreadyExists,
        EPIPE => ErrorKind::BrokenPipe,
        ECONNRESET => ErrorKind::ConnectionReset,
        ECONNABORTED => ErrorKind::ConnectionAborted,
        ECONNREFUSED => ErrorKind::ConnectionRefused,
        ENOTCONN => ErrorKind::NotConnected,
        EADDRINUSE => ErrorKind::AddrInUse,
        EADDRNOTAVAIL => ErrorKind::AddrNotAvailable,
        ETIMEDOUT => ErrorKind::TimedOut,
        ENOTSUP => ErrorKind::Unsupported,
        _ => ErrorKind::Other,
    }
}

/// Convert an error kind to errno, `EIO` when there is no closer match
#[must_use]
pub fn error_kind_to_errno(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::NotFound => ENOENT,
        ErrorKind::PermissionDenied => EACCES,
        ErrorKind::ConnectionRefused => ECONNREFUSED,
        ErrorKind::ConnectionReset => ECONNRESET,
        ErrorKind::ConnectionAborted => ECONNABORTED,
        ErrorKind::NotConnected => ENOTCONN,
        ErrorKind::AddrInUse => EADDRINUSE,
        ErrorKind::AddrNotAvailable => EADDRNOTAVAIL,
        ErrorKind::BrokenPipe => EPIPE,
        ErrorKind::AlreadyExists => EEXIST,
        ErrorKind::WouldBlock => EAGAIN,
        ErrorKind::InvalidInput => EINVAL,
        ErrorKind::InvalidData => EILSEQ,
        ErrorKind::TimedOut => ETIMEDOUT,
        ErrorKind::Unsupported => ENOTSUP,
        ErrorKind::OutOfMemory => ENOMEM,
        _ => EIO,
    }
}

/// Errno of an `std::io::Error`, preferring the OS code on Linux
#[must_use]
pub fn io_error_to_errno(err: &std::io::Error) -> i32 {
    if cfg!(target_os = "linux") {
        if let Some(code) = err.raw_os_error() {
            return code;
        }
    }
    error_kind_to_errno(err.kind())
}

/// Symbolic name of an errno, as shown in `err.code`
#[must_use]
pub fn errno_name(errno: i32) -> &'static str {
    match errno {
        EPERM => "EPERM",
        ENOENT => "ENOENT",
        EIO => "EIO",
        EBADF => "EBADF",
        EAGAIN => "EAGAIN",
        ENOMEM => "ENOMEM",
        EACCES => "EACCES",
        EEXIST => "EEXIST",
        EINVAL => "EINVAL",
        ENOSPC => "ENOSPC",
        EPIPE => "EPIPE",
        EILSEQ => "EILSEQ",
        ENOTSUP => "ENOTSUP",
        EADDRINUSE => "EADDRINUSE",
        EADDRNOTAVAIL => "EADDRNOTAVAIL",
        ECONNABORTED => "ECONNABORTED",
        ECONNRESET => "ECONNRESET",
        ENOTCONN => "ENOTCONN",
        ETIMEDOUT => "ETIMEDOUT",
        ECONNREFUSED => "ECONNREFUSED",
        ECANCELED => "ECANCELED",
        _ => "EUNKNOWN",
    }
}

/// Convert error kind to a static string description
#[must_use]
pub fn error_kind_to_str(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "not found",
        ErrorKind::PermissionDenied => "permission denied",
        ErrorKind::ConnectionRefused => "connection refused",
        ErrorKind::ConnectionReset => "connection reset",
        ErrorKind::ConnectionAborted => "connection aborted",
        ErrorKind::NotConnected => "not connected",
        ErrorKind::AddrInUse => "address in use",
        ErrorKind::AddrNotAvailable => "address not available",
        ErrorKind::BrokenPipe => "broken pipe",
        ErrorKind::AlreadyExists => "already exists",
        ErrorKind::WouldBlock => "operation would block",
        ErrorKind::InvalidInput => "invalid input",
        ErrorKind::InvalidData => "invalid data",
        ErrorKind::TimedOut => "timed out",
        ErrorKind::Interrupted => "interrupted",
        ErrorKind::Unsupported => "unsupported",
        ErrorKind::OutOfMemory => "out of memory",
        ErrorKind::UnexpectedEof => "unexpected end of file",
        _ => "other error",
    }
}
