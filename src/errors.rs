//! Errors returned by chip, request and line operations.

use std::fmt;

use nix::errno::Errno;

use crate::fixed_str::FixedStrErr;

pub type Result<T> = std::result::Result<T, Error>;

/// Identifies the uAPI call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlKind {
    ChipInfo,
    LineInfo,
    WatchLineInfo,
    UnwatchLineInfo,
    GetLine,
    SetLineConfig,
    GetLineValues,
    SetLineValues,
    Read,
    Poll,
    Close,
}

impl fmt::Display for IoctlKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            IoctlKind::ChipInfo => write!(f, "get chip info"),
            IoctlKind::LineInfo => write!(f, "get line info"),
            IoctlKind::WatchLineInfo => write!(f, "watch line info"),
            IoctlKind::UnwatchLineInfo => write!(f, "unwatch line info"),
            IoctlKind::GetLine => write!(f, "get line"),
            IoctlKind::SetLineConfig => write!(f, "set line config"),
            IoctlKind::GetLineValues => write!(f, "get line values"),
            IoctlKind::SetLineValues => write!(f, "set line values"),
            IoctlKind::Read => write!(f, "read event"),
            IoctlKind::Poll => write!(f, "poll"),
            IoctlKind::Close => write!(f, "close"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A requested line is already owned by another consumer.
    #[error("Requested line is busy")]
    LineBusy,
    /// Insufficient privilege to access the chip.
    #[error("Permission denied")]
    PermissionDenied,
    /// Malformed line numbers, names or configuration, or a configuration the
    /// kernel rejected.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The request has no open line stream.
    #[error("Request is not open")]
    NotOpen,
    /// The line is not part of the request.
    #[error("Line {0} is not part of the request")]
    NotRequested(u32),
    /// The line number cannot be held by a line set.
    #[error("Line {0} is out of range")]
    OutOfRange(u32),
    #[error("Too many line attributes: {required} required but at most {capacity} supported", capacity = crate::uapi::v2::GPIO_LINE_NUM_ATTRS_MAX)]
    TooManyAttributes { required: usize },
    #[error("Wrong number of values: {values} values provided for {lines} lines")]
    WrongNumberOfValues { lines: usize, values: usize },
    /// A read returned a byte count that is not a whole number of events.
    #[error("Partial event read: {read} bytes is not a multiple of {expected}")]
    PartialEvent { expected: usize, read: usize },
    #[error("Unknown event type: {0}")]
    UnknownEvent(u32),
    #[error("Ioctl to {kind} failed: {cause}")]
    Ioctl {
        kind: IoctlKind,
        #[source]
        cause: Errno,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Name(#[from] FixedStrErr),
}

/// Classify the errno returned by a uAPI call.
///
/// Only the errnos with a meaning for the caller are mapped; everything else
/// is wrapped with the failing call.
pub(crate) fn ioctl_err(kind: IoctlKind, cause: Errno) -> Error {
    match cause {
        Errno::EBUSY => Error::LineBusy,
        Errno::EPERM | Errno::EACCES => Error::PermissionDenied,
        Errno::EINVAL => Error::InvalidRequest(format!("{kind} rejected by the kernel")),
        cause => Error::Ioctl { kind, cause },
    }
}

pub(crate) fn invalid_err(msg: impl Into<String>) -> Error {
    Error::InvalidRequest(msg.into())
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;

        let kind = match &err {
            Error::Io(e) => e.kind(),
            Error::PermissionDenied => ErrorKind::PermissionDenied,
            Error::NotRequested(_) | Error::OutOfRange(_) => ErrorKind::NotFound,
            Error::InvalidRequest(_)
            | Error::TooManyAttributes { .. }
            | Error::WrongNumberOfValues { .. } => ErrorKind::InvalidInput,
            Error::PartialEvent { .. } | Error::UnknownEvent(_) | Error::Name(_) => {
                ErrorKind::InvalidData
            }
            Error::LineBusy | Error::NotOpen | Error::Ioctl { .. } => ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_errnos() {
        assert!(matches!(
            ioctl_err(IoctlKind::GetLine, Errno::EBUSY),
            Error::LineBusy
        ));
        assert!(matches!(
            ioctl_err(IoctlKind::GetLine, Errno::EACCES),
            Error::PermissionDenied
        ));
        assert!(matches!(
            ioctl_err(IoctlKind::GetLine, Errno::EPERM),
            Error::PermissionDenied
        ));
        assert!(matches!(
            ioctl_err(IoctlKind::SetLineConfig, Errno::EINVAL),
            Error::InvalidRequest(_)
        ));
        assert!(matches!(
            ioctl_err(IoctlKind::GetLineValues, Errno::EIO),
            Error::Ioctl {
                kind: IoctlKind::GetLineValues,
                cause: Errno::EIO
            }
        ));
    }

    #[test]
    fn display_names_the_call() {
        let err = ioctl_err(IoctlKind::SetLineValues, Errno::ENODEV);
        assert_eq!(
            err.to_string(),
            format!("Ioctl to set line values failed: {}", Errno::ENODEV)
        );
    }
}
