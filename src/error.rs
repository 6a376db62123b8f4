use std::error;
use std::ffi::OsString;
use std::fmt;

/// An environment variable was set, but to something unusable.
#[derive(Debug)]
pub(crate) struct InvalidVarError {
    pub(crate) key: &'static str,
    pub(crate) val: OsString,
    pub(crate) reason: InvalidVarReason,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum InvalidVarReason {
    InvalidUtf8,
    ParseError,
}

impl InvalidVarError {
    pub(crate) const fn invalid_utf8(key: &'static str, val: OsString) -> Self {
        Self {
            key,
            val,
            reason: InvalidVarReason::InvalidUtf8,
        }
    }

    pub(crate) const fn parse_error(key: &'static str, val: OsString) -> Self {
        Self {
            key,
            val,
            reason: InvalidVarReason::ParseError,
        }
    }
}

impl fmt::Display for InvalidVarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            InvalidVarReason::InvalidUtf8 => write!(f, "{}: invalid utf8: {:?}", self.key, self.val),
            InvalidVarReason::ParseError => write!(f, "{}: value could not be parsed: {:?}", self.key, self.val),
        }
    }
}

impl error::Error for InvalidVarError {}

/// A required setting was found neither in the environment nor in the config file.
#[derive(Debug)]
pub(crate) struct MissingVarError(pub &'static str);

impl fmt::Display for MissingVarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not set", self.0)
    }
}

impl error::Error for MissingVarError {}
