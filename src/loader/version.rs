//! # Versions and version requirements for shared packages.
//!
//! Only the subset used by shared-dependency declarations is supported:
//! `*`, `x.y.z`, `=x.y.z`, `^x.y.z`, `~x.y.z`, `>=x.y.z`. Missing minor/patch
//! components default to `0`. A pre-release tag (`1.0.0-beta.1`) orders
//! before its release, and only satisfies a range whose own version is a
//! pre-release of the same `major.minor.patch`.
//!
//! ```
//! use tooldock::{Version, VersionReq};
//!
//! let req: VersionReq = "^18.2.0".parse().unwrap();
//! assert!(req.matches(&"18.3.1".parse::<Version>().unwrap()));
//! assert!(!req.matches(&"19.0.0".parse::<Version>().unwrap()));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::SharedScopeError;

/// A `major.minor.patch[-pre]` version.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
    /// Pre-release tag, if any.
    pub pre: Option<String>,
}

impl Version {
    /// Creates a release version.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = SharedScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SharedScopeError::InvalidVersion {
            input: s.to_string(),
        };
        let trimmed = s.trim().trim_start_matches('v');
        let (core, pre) = match trimmed.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return Err(invalid()),
            None => (trimmed, None),
        };

        let mut parts = core.split('.');
        let mut next = |required: bool| -> Result<u64, SharedScopeError> {
            match parts.next() {
                Some(p) => p.parse::<u64>().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };
        let major = next(true)?;
        let minor = next(false)?;
        let patch = next(false)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self {
            major,
            minor,
            patch,
            pre,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

/// Comparison operator of a [`VersionReq`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Op {
    Any,
    Exact,
    Caret,
    Tilde,
    AtLeast,
}

/// A version requirement.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VersionReq {
    op: Op,
    version: Version,
}

impl VersionReq {
    /// Requirement satisfied by every version.
    pub const ANY: VersionReq = VersionReq {
        op: Op::Any,
        version: Version::new(0, 0, 0),
    };

    /// True if `v` satisfies this requirement.
    pub fn matches(&self, v: &Version) -> bool {
        let r = &self.version;
        if self.op != Op::Any && v.pre.is_some() && !same_release_train(v, r) {
            return false;
        }
        match self.op {
            Op::Any => true,
            Op::Exact => v == r,
            Op::AtLeast => v >= r,
            Op::Tilde => v >= r && v.major == r.major && v.minor == r.minor,
            Op::Caret => {
                if v < r {
                    return false;
                }
                if r.major > 0 {
                    v.major == r.major
                } else if r.minor > 0 {
                    v.major == 0 && v.minor == r.minor
                } else {
                    v.major == 0 && v.minor == 0 && v.patch == r.patch
                }
            }
        }
    }
}

fn same_release_train(v: &Version, r: &Version) -> bool {
    r.pre.is_some() && (v.major, v.minor, v.patch) == (r.major, r.minor, r.patch)
}

impl FromStr for VersionReq {
    type Err = SharedScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::ANY);
        }
        let (op, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (Op::AtLeast, rest)
        } else if let Some(rest) = s.strip_prefix('^') {
            (Op::Caret, rest)
        } else if let Some(rest) = s.strip_prefix('~') {
            (Op::Tilde, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (Op::Exact, rest)
        } else {
            (Op::Exact, s)
        };
        Ok(Self {
            op,
            version: rest.parse()?,
        })
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Op::Any => f.write_str("*"),
            Op::Exact => write!(f, "={}", self.version),
            Op::Caret => write!(f, "^{}", self.version),
            Op::Tilde => write!(f, "~{}", self.version),
            Op::AtLeast => write!(f, ">={}", self.version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn req(s: &str) -> VersionReq {
        s.parse().unwrap()
    }

    #[test]
    fn parses_partial_and_prerelease() {
        assert_eq!(v("18"), Version::new(18, 0, 0));
        assert_eq!(v("v6.4"), Version::new(6, 4, 0));
        assert!(v("1.0.0-beta.1") < v("1.0.0"));
        assert!("1.x".parse::<Version>().is_err());
        assert!("1.2.3.4".parse::<Version>().is_err());
    }

    #[test]
    fn caret_rules() {
        assert!(req("^18.2.0").matches(&v("18.9.0")));
        assert!(!req("^18.2.0").matches(&v("18.1.9")));
        assert!(req("^0.3.1").matches(&v("0.3.9")));
        assert!(!req("^0.3.1").matches(&v("0.4.0")));
        assert!(!req("^0.0.3").matches(&v("0.0.4")));
    }

    #[test]
    fn tilde_exact_and_at_least() {
        assert!(req("~5.1.0").matches(&v("5.1.7")));
        assert!(!req("~5.1.0").matches(&v("5.2.0")));
        assert!(req("5.1.0").matches(&v("5.1.0")));
        assert!(!req("=5.1.0").matches(&v("5.1.1")));
        assert!(req(">=2.0.0").matches(&v("7.0.0")));
        assert!(req("*").matches(&v("0.0.1")));
        assert_eq!(req("^18.2.0").to_string(), "^18.2.0");
    }

    #[test]
    fn prereleases_only_match_their_own_release() {
        assert!(!req("^18.2.0").matches(&v("18.3.0-beta")));
        assert!(!req(">=1.0.0").matches(&v("2.0.0-rc.1")));
        assert!(!req("~5.1.0").matches(&v("5.1.4-alpha")));
        assert!(req("^18.3.0-beta.1").matches(&v("18.3.0-beta.2")));
        assert!(req("^18.3.0-beta.1").matches(&v("18.4.0")));
        assert!(!req("^18.3.0-beta.1").matches(&v("18.4.0-beta.1")));
        assert!(req("*").matches(&v("19.0.0-rc.0")));
    }
}
