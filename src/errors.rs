//! Error type used throughout the tracer.
//!
//! Modeled on a small `anyhow`-like wrapper: every error carries an
//! optional `errno` (useful when the error should eventually be reported
//! or reproduced as a kernel error code) plus an optional message and an
//! optional boxed source.

pub use nix::errno::Errno;
use std::fmt::{self, Display};
use std::io::Error as IOError;
use std::result;

pub type Result<T> = result::Result<T, Error>;

pub struct Error {
    errno: Option<Errno>,
    msg: Option<String>,
    source: Option<Box<dyn std::error::Error>>,
}

impl Error {
    pub fn msg<M: Into<String>>(msg: M) -> Self {
        Error {
            errno: None,
            msg: Some(msg.into()),
            source: None,
        }
    }

    pub fn errno(errno: Errno) -> Self {
        Error {
            errno: Some(errno),
            msg: None,
            source: None,
        }
    }

    pub fn errno_with_msg<M: Into<String>>(errno: Errno, msg: M) -> Self {
        Error {
            errno: Some(errno),
            msg: Some(msg.into()),
            source: None,
        }
    }

    pub fn with_msg<M: Into<String>>(mut self, msg: M) -> Self {
        self.msg = Some(msg.into());
        self
    }

    pub fn get_errno(&self) -> Option<Errno> {
        self.errno
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.errno, &self.msg) {
            (Some(errno), Some(msg)) => write!(f, "{} ({})", msg, errno),
            (Some(errno), None) => write!(f, "{}", errno),
            (None, Some(msg)) => write!(f, "{}", msg),
            (None, None) => write!(f, "unknown error"),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Error");
        d.field("errno", &self.errno);
        d.field("msg", &self.msg);
        d.field("source", &self.source.as_ref().map(|_| "..."));
        d.finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref()
    }
}

impl From<nix::Error> for Error {
    fn from(error: nix::Error) -> Error {
        Error {
            errno: error.as_errno(),
            msg: None,
            source: Some(Box::new(error)),
        }
    }
}

impl From<IOError> for Error {
    fn from(error: IOError) -> Error {
        Error {
            errno: error.raw_os_error().map(Errno::from_i32),
            msg: None,
            source: Some(Box::new(error)),
        }
    }
}
