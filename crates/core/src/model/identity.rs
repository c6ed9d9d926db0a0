use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing identities from text (config files, CLI flags).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityParseError {
    #[error("Invalid assembly version '{0}': expected four dot-separated components in 0..=65535")]
    Version(String),
    #[error("Assembly identity '{0}' has no name")]
    MissingName(String),
    #[error("Assembly identity '{0}' has no Version component")]
    MissingVersion(String),
    #[error("Invalid public key token '{0}': expected 16 hex characters or 'null'")]
    PublicKeyToken(String),
    #[error("Unknown assembly identity component '{0}'")]
    UnknownComponent(String),
    #[error("Target platform identifier must not be empty")]
    EmptyTarget,
}

/// Four-part assembly version, ordered component by component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssemblyVersion {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl AssemblyVersion {
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self { major, minor, build, revision }
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
    }
}

impl FromStr for AssemblyVersion {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 4 {
            return Err(IdentityParseError::Version(s.to_string()));
        }
        let mut values = [0u16; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            // u16 parsing rejects signs, blanks and anything above 65535.
            *slot = part.parse().map_err(|_| IdentityParseError::Version(s.to_string()))?;
        }
        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }
}

impl TryFrom<String> for AssemblyVersion {
    type Error = IdentityParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssemblyVersion> for String {
    fn from(value: AssemblyVersion) -> Self {
        value.to_string()
    }
}

/// Culture value used for culture-invariant assemblies.
pub const NEUTRAL_CULTURE: &str = "neutral";

/// Identity of an assembly as recorded in an AssemblyRef or Assembly row.
///
/// Equality covers all four fields. The public key token is stored as
/// lowercase hex (16 characters) or as an empty string for unsigned assemblies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", from = "RawAssemblyIdentity")]
pub struct AssemblyIdentity {
    name: String,
    version: AssemblyVersion,
    culture: String,
    public_key_token: String,
}

/// Wire form of [`AssemblyIdentity`]; deserialized values pass through `new`.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawAssemblyIdentity {
    name: String,
    version: AssemblyVersion,
    #[serde(default)]
    culture: String,
    #[serde(default)]
    public_key_token: String,
}

impl From<RawAssemblyIdentity> for AssemblyIdentity {
    fn from(raw: RawAssemblyIdentity) -> Self {
        Self::new(raw.name, raw.version, raw.culture, raw.public_key_token)
    }
}

impl AssemblyIdentity {
    /// Build an identity, normalizing an empty culture to `neutral` and the
    /// token to lowercase.
    pub fn new(
        name: impl Into<String>,
        version: AssemblyVersion,
        culture: impl Into<String>,
        public_key_token: impl Into<String>,
    ) -> Self {
        let culture = culture.into();
        let culture = if culture.is_empty() { NEUTRAL_CULTURE.to_string() } else { culture };
        Self {
            name: name.into(),
            version,
            culture,
            public_key_token: public_key_token.into().to_ascii_lowercase(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> AssemblyVersion {
        self.version
    }

    pub fn culture(&self) -> &str {
        &self.culture
    }

    pub fn public_key_token(&self) -> &str {
        &self.public_key_token
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.public_key_token.is_empty() { "null" } else { &self.public_key_token };
        write!(
            f,
            "{}, Version={}, Culture={}, PublicKeyToken={}",
            self.name, self.version, self.culture, token
        )
    }
}

impl FromStr for AssemblyIdentity {
    type Err = IdentityParseError;

    /// Parse the display form, e.g.
    /// `mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(str::trim);
        let name = parts.next().unwrap_or_default();
        if name.is_empty() || name.contains('=') {
            return Err(IdentityParseError::MissingName(s.to_string()));
        }

        let mut version = None;
        let mut culture = String::new();
        let mut token = String::new();
        for part in parts {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| IdentityParseError::UnknownComponent(part.to_string()))?;
            match key.trim() {
                "Version" => version = Some(value.trim().parse::<AssemblyVersion>()?),
                "Culture" => culture = value.trim().to_string(),
                "PublicKeyToken" => {
                    let value = value.trim();
                    if !value.eq_ignore_ascii_case("null") {
                        if value.len() != 16 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
                            return Err(IdentityParseError::PublicKeyToken(value.to_string()));
                        }
                        token = value.to_string();
                    }
                }
                other => return Err(IdentityParseError::UnknownComponent(other.to_string())),
            }
        }

        let version = version.ok_or_else(|| IdentityParseError::MissingVersion(s.to_string()))?;
        Ok(Self::new(name, version, culture, token))
    }
}

/// Opaque identifier of a target platform understood by the catalog,
/// e.g. `.NETCoreApp,Version=v2.0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetPlatform(String);

impl TargetPlatform {
    pub fn new(value: impl AsRef<str>) -> Result<Self, IdentityParseError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IdentityParseError::EmptyTarget);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetPlatform {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TargetPlatform {
    type Error = IdentityParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetPlatform> for String {
    fn from(value: TargetPlatform) -> Self {
        value.0
    }
}
