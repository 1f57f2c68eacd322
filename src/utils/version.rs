use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// API version taken from the `/v{version}/...` path segment.
///
/// Accepts `MAJOR`, `MAJOR.MINOR` or `MAJOR.MINOR.PATCH`; missing components
/// are zero, so `1`, `1.0` and `1.0.0` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VersionError {
    #[error("'{0}' is empty")]
    Empty(String),

    #[error("'{0}' has more than three components")]
    TooManyParts(String),

    #[error("'{input}' has a non-numeric component '{part}'")]
    NotNumeric { input: String, part: String },
}

impl ApiVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for ApiVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::Empty(s.to_string()));
        }

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() > 3 {
            return Err(VersionError::TooManyParts(s.to_string()));
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            // `u64::from_str` accepts a leading '+', which is not a version
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::NotNumeric {
                    input: s.to_string(),
                    part: part.to_string(),
                });
            }
            *slot = part.parse().map_err(|_| VersionError::NotNumeric {
                input: s.to_string(),
                part: part.to_string(),
            })?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
