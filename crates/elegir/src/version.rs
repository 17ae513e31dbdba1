//! Version ordering for implementation candidates.
//!
//! Candidates declare the minimum environment version they apply to;
//! resolvers pick the highest declared version not exceeding the live
//! one. Ordering is strictly numeric: major, then minor, then patch,
//! then build, each compared as an unsigned integer. Widget versions
//! are triples (build stays 0); platform versions use all four fields.

use crate::result::{ElegirError, ElegirResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A numeric version, ordered field by field
///
/// Field order matters: the derived `Ord` compares `major`, `minor`,
/// `patch`, `build` in declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Version {
    /// Major component
    pub major: u32,
    /// Minor component
    pub minor: u32,
    /// Patch component
    pub patch: u32,
    /// Build component (platform versions only, 0 for widget triples)
    pub build: u32,
}

impl Version {
    /// Create a triple version (build = 0)
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build: 0,
        }
    }

    /// Create a quad version (platform builds)
    #[must_use]
    pub const fn with_build(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// The zero version, lower than or equal to everything
    #[must_use]
    pub const fn zero() -> Self {
        Self::with_build(0, 0, 0, 0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.build == 0 {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        } else {
            write!(
                f,
                "{}.{}.{}.{}",
                self.major, self.minor, self.patch, self.build
            )
        }
    }
}

impl FromStr for Version {
    type Err = ElegirError;

    /// Parse `a.b.c` or `a.b.c.d`
    fn from_str(s: &str) -> ElegirResult<Self> {
        let parse_err = || ElegirError::VersionParse {
            input: s.to_string(),
        };
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(parse_err());
        }
        let mut fields = [0u32; 4];
        for (i, part) in parts.iter().enumerate() {
            fields[i] = part.parse::<u32>().map_err(|_| parse_err())?;
        }
        Ok(Self {
            major: fields[0],
            minor: fields[1],
            patch: fields[2],
            build: fields[3],
        })
    }
}
