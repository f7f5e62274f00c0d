//! Architecture tags
//!
//! An architecture is a dotted tag naming the environment a unibuild runs in.
//! `os` is the generic server, `os.linux.x86_64` a concrete server host, and
//! `web.browser` / `web.cordova` the client flavors. A more specific tag
//! matches every prefix of itself, so a unibuild built for `os` can be used
//! on `os.osx.arm64`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Architecture parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchError {
    #[error("Unknown architecture: {0}")]
    Unknown(String),

    #[error("Unknown architecture alias: {0}")]
    UnknownAlias(String),
}

/// A validated architecture tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Arch(String);

/// The generic server architecture
pub const OS: &str = "os";
/// The browser client architecture
pub const WEB_BROWSER: &str = "web.browser";
/// The hybrid mobile client architecture
pub const WEB_CORDOVA: &str = "web.cordova";

/// Every architecture a package can declare
pub const ALL_ARCHES: [&str; 3] = [OS, WEB_BROWSER, WEB_CORDOVA];

impl Arch {
    /// Parse an architecture tag
    pub fn parse(tag: &str) -> Result<Self, ArchError> {
        let mut parts = tag.split('.');
        let valid = match parts.next() {
            Some("os") => parts.all(|p| !p.is_empty()),
            Some("web") => {
                let mut rest = parts.peekable();
                rest.peek().is_some() && rest.all(|p| !p.is_empty())
            }
            _ => false,
        };

        if valid {
            Ok(Self(tag.to_string()))
        } else {
            Err(ArchError::Unknown(tag.to_string()))
        }
    }

    /// The generic server architecture
    pub fn os() -> Self {
        Self(OS.to_string())
    }

    /// The browser client architecture
    pub fn web_browser() -> Self {
        Self(WEB_BROWSER.to_string())
    }

    /// The hybrid mobile client architecture
    pub fn web_cordova() -> Self {
        Self(WEB_CORDOVA.to_string())
    }

    /// The concrete architecture of the machine running the build
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let cpu = match std::env::consts::ARCH {
            "aarch64" => "arm64",
            other => other,
        };
        Self(format!("os.{}.{}", os, cpu))
    }

    /// All declarable architectures
    pub fn all() -> Vec<Self> {
        ALL_ARCHES.iter().map(|a| Self(a.to_string())).collect()
    }

    /// The tag as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this architecture can run code built for `program`
    pub fn matches(&self, program: &str) -> bool {
        self.0 == program
            || (self.0.len() > program.len()
                && self.0.starts_with(program)
                && self.0.as_bytes()[program.len()] == b'.')
    }

    /// Whether this is a server-family architecture
    pub fn is_server(&self) -> bool {
        self.matches(OS)
    }

    /// Whether this is exactly the generic server tag
    pub fn is_generic_server(&self) -> bool {
        self.0 == OS
    }

    /// Whether this is the hybrid mobile client
    pub fn is_cordova(&self) -> bool {
        self.matches(WEB_CORDOVA)
    }

    /// Human label used in job titles
    pub fn label(&self) -> &'static str {
        if self.is_cordova() {
            "Cordova"
        } else if self.is_server() {
            "Server"
        } else {
            "Client"
        }
    }

    /// Expand a manifest alias (`server`, `client`, `web`) or a literal tag
    pub fn expand_alias(alias: &str) -> Result<Vec<Self>, ArchError> {
        match alias {
            "server" => Ok(vec![Self::os()]),
            "client" | "web" => Ok(vec![Self::web_browser(), Self::web_cordova()]),
            other => Self::parse(other)
                .map(|arch| vec![arch])
                .map_err(|_| ArchError::UnknownAlias(other.to_string())),
        }
    }
}

/// Pick the most specific candidate that `arch` can run
pub fn most_specific_match<'a, I>(arch: &Arch, candidates: I) -> Option<&'a Arch>
where
    I: IntoIterator<Item = &'a Arch>,
{
    candidates
        .into_iter()
        .filter(|candidate| arch.matches(candidate.as_str()))
        .max_by_key(|candidate| candidate.as_str().len())
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Arch {
    type Error = ArchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Arch> for String {
    fn from(arch: Arch) -> Self {
        arch.0
    }
}

impl std::str::FromStr for Arch {
    type Err = ArchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
