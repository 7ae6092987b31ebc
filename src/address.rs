//! # Hierarchical service addresses.
//!
//! An [`Address`] names either an application instance on a host (a *host address*)
//! or one service of that instance:
//!
//! ```text
//! svc://host/instance              host address (empty service path)
//! svc://host/instance/cache        service "cache"
//! svc://host/instance/cache/warm   nested service path "cache/warm"
//! ```
//!
//! Addresses are compared, hashed and used as registry keys through their canonical
//! string form ([`Display`](std::fmt::Display)). Canonicalization lowercases the host
//! and drops leading, trailing and repeated `/` in service references, so
//! `"cache"`, `"/cache/"` and `"svc://HOST/instance/cache"` all resolve to the same address.
//!
//! ## Example
//! ```rust
//! use servicevisor::Address;
//!
//! let host = Address::parse("svc://localhost/app").unwrap();
//! assert!(host.is_host());
//!
//! let cache = host.resolve_service("/cache/").unwrap();
//! assert_eq!(cache.to_string(), "svc://localhost/app/cache");
//! assert_eq!(host.resolve_service("svc://LOCALHOST/app/cache").unwrap(), cache);
//! ```

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::AddressError;

/// Fixed scheme of every service address.
pub const SCHEME: &str = "svc";

/// Immutable service address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    host: String,
    instance: String,
    path: String,
}

impl Address {
    /// Parses `svc://host/instance[/service-path]`.
    ///
    /// Fails with [`AddressError`] on scheme mismatch, missing host or instance,
    /// credentials/port/query/fragment, empty inner segments, dot segments, or
    /// segments outside `[A-Za-z0-9._-]`.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let url = Url::parse(s).map_err(|e| malformed(s, e))?;
        if url.scheme() != SCHEME {
            return Err(AddressError::SchemeMismatch {
                input: s.to_string(),
                expected: SCHEME,
                found: url.scheme().to_string(),
            });
        }
        if !url.username().is_empty() || url.password().is_some() || url.port().is_some() {
            return Err(malformed(s, "credentials and ports are not allowed"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(malformed(s, "query and fragment are not allowed"));
        }

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
            _ => return Err(malformed(s, "missing host")),
        };
        validate_segment(s, &host)?;

        let mut segments = url
            .path_segments()
            .ok_or_else(|| malformed(s, "missing instance"))?
            .collect::<Vec<_>>();
        // A single trailing slash is tolerated.
        if segments.len() > 1 && segments.last() == Some(&"") {
            segments.pop();
        }
        let (instance, path) = match segments.split_first() {
            Some((instance, path)) if !instance.is_empty() => (*instance, path),
            _ => return Err(malformed(s, "missing instance")),
        };
        validate_segment(s, instance)?;
        for seg in path {
            if seg.is_empty() {
                return Err(malformed(s, "empty path segment"));
            }
            validate_segment(s, seg)?;
        }

        Ok(Self {
            host,
            instance: instance.to_string(),
            path: path.join("/"),
        })
    }

    /// Resolves a service reference against this address' host and instance.
    ///
    /// `reference` is either an absolute address (must share host and instance with
    /// `self`) or a relative service path such as `"cache"` or `"/cache/warm"`.
    /// Any service path already present on `self` is replaced, not extended.
    pub fn resolve_service(&self, reference: &str) -> Result<Self, AddressError> {
        if reference.contains("://") {
            let abs = Self::parse(reference)?;
            if abs.host != self.host || abs.instance != self.instance {
                return Err(AddressError::ForeignHost {
                    input: reference.to_string(),
                    host: self.host_address().to_string(),
                });
            }
            if abs.is_host() {
                return Err(malformed(reference, "missing service path"));
            }
            return Ok(abs);
        }

        let segments: Vec<&str> = reference.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(malformed(reference, "missing service path"));
        }
        for seg in &segments {
            validate_segment(reference, seg)?;
        }
        Ok(Self {
            host: self.host.clone(),
            instance: self.instance.clone(),
            path: segments.join("/"),
        })
    }

    /// Returns this address with the service path removed.
    pub fn host_address(&self) -> Self {
        Self {
            host: self.host.clone(),
            instance: self.instance.clone(),
            path: String::new(),
        }
    }

    #[inline]
    pub fn scheme(&self) -> &'static str {
        SCHEME
    }

    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Service path without leading slash; empty for a host address.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// True when the address names the instance itself rather than a service.
    #[inline]
    pub fn is_host(&self) -> bool {
        self.path.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}/{}", self.host, self.instance)?;
        if !self.path.is_empty() {
            write!(f, "/{}", self.path)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn malformed(input: &str, reason: impl fmt::Display) -> AddressError {
    AddressError::Malformed {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_segment(input: &str, segment: &str) -> Result<(), AddressError> {
    let valid = !matches!(segment, "" | "." | "..")
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if valid {
        Ok(())
    } else {
        Err(AddressError::InvalidSegment {
            input: input.to_string(),
            segment: segment.to_string(),
        })
    }
}
