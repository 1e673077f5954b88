// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::fmt::Display;

use url::Url;

use crate::Error;

/// Wildcard target origin, only accepted when explicitly enabled
pub const WILDCARD: &str = "*";

/// Origins a window transport posts to and accepts messages from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetOrigin {
    /// Single origin
    Exact(String),
    /// Any of a set of origins
    List(Vec<String>),
    /// Any origin, for controlled test contexts only
    Any,
}

impl TargetOrigin {
    /// Derive the target origin from a frame URL
    pub fn from_url(url: &str) -> Result<Self, Error> {
        Ok(Self::Exact(origin_of(url)?))
    }

    /// Parse a configured origin.
    ///
    /// `"*"` is rejected unless `allow_wildcard` is set.
    pub fn parse(s: &str, allow_wildcard: bool) -> Result<Self, Error> {
        match s.trim() {
            WILDCARD if allow_wildcard => Ok(Self::Any),
            WILDCARD => Err(Error::InvalidOrigin(
                "wildcard origin requires allow_wildcard".to_string(),
            )),
            s => Self::from_url(s),
        }
    }

    /// Build an origin list, each entry is normalised
    pub fn list<S: AsRef<str>>(origins: &[S]) -> Result<Self, Error> {
        let l = origins
            .iter()
            .map(|o| origin_of(o.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        match l.len() {
            0 => Err(Error::InvalidOrigin("empty origin list".to_string())),
            1 => Ok(Self::Exact(l[0].clone())),
            _ => Ok(Self::List(l)),
        }
    }

    /// Check whether an inbound message origin is accepted
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (Self::Any, _) => true,
            (Self::Exact(o), Some(s)) => o == s,
            (Self::List(l), Some(s)) => l.iter().any(|o| o == s),
            _ => false,
        }
    }

    /// Target origins for outbound `postMessage` calls
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Self::Exact(o) => vec![o.as_str()],
            Self::List(l) => l.iter().map(String::as_str).collect(),
            Self::Any => vec![WILDCARD],
        }
    }
}

impl Display for TargetOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(o) => write!(f, "{o}"),
            Self::List(l) => write!(f, "{}", l.join(", ")),
            Self::Any => write!(f, "{WILDCARD}"),
        }
    }
}

/// Serialized `scheme://host[:port]` origin of a URL
fn origin_of(url: &str) -> Result<String, Error> {
    let u = Url::parse(url).map_err(|e| Error::InvalidOrigin(format!("{url}: {e}")))?;

    let o = u.origin();
    if !o.is_tuple() {
        return Err(Error::InvalidOrigin(format!("{url}: opaque origin")));
    }

    Ok(o.ascii_serialization())
}
