//! Platform vs user-code classification of referenced assemblies.

use std::collections::BTreeSet;

use crate::model::AssemblyIdentity;

/// Decides whether an assembly belongs to the platform (framework) or to user code.
///
/// Implementations must be pure: the same identity always yields the same answer.
pub trait DependencyFilter: Send + Sync {
    fn is_framework_assembly(&self, assembly: &AssemblyIdentity) -> bool;
}

impl<F> DependencyFilter for F
where
    F: Fn(&AssemblyIdentity) -> bool + Send + Sync,
{
    fn is_framework_assembly(&self, assembly: &AssemblyIdentity) -> bool {
        self(assembly)
    }
}

/// Public key tokens used to sign framework assemblies (Microsoft, ECMA, Mono, Xamarin).
pub const FRAMEWORK_PUBLIC_KEY_TOKENS: &[&str] = &[
    "b77a5c561934e089", // ECMA
    "b03f5f7f11d50a3a", // Microsoft
    "7cec85d7bea7798e", // Silverlight platform
    "31bf3856ad364e35", // Microsoft shared
    "24eec0d8c86cda1e", // Windows Phone / Silverlight
    "0738eb9f132ed756", // Mono
    "ddd0da4d3e678217", // Microsoft Enterprise
    "84e04ff9cfb79065", // Xamarin
    "842cf8be1de50553", // Mono.Cecil era Xamarin
    "cc7b13ffcd2ddd51", // netstandard
];

/// Classifies by public key token: anything signed with a framework key is platform code.
#[derive(Debug, Clone)]
pub struct DotNetFrameworkFilter {
    tokens: BTreeSet<String>,
}

impl DotNetFrameworkFilter {
    pub fn new() -> Self {
        Self::with_extra_tokens(std::iter::empty::<String>())
    }

    /// Framework tokens plus `extra` (case-insensitive hex).
    pub fn with_extra_tokens<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = FRAMEWORK_PUBLIC_KEY_TOKENS
            .iter()
            .map(|t| t.to_string())
            .chain(extra.into_iter().map(|t| t.as_ref().trim().to_ascii_lowercase()))
            .filter(|t| !t.is_empty())
            .collect();
        Self { tokens }
    }
}

impl Default for DotNetFrameworkFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyFilter for DotNetFrameworkFilter {
    fn is_framework_assembly(&self, assembly: &AssemblyIdentity) -> bool {
        !assembly.public_key_token().is_empty() && self.tokens.contains(assembly.public_key_token())
    }
}

pub const DEFAULT_NAME_PREFIXES: &[&str] = &["System.", "Microsoft.", "mscorlib", "netstandard"];

/// Classifies by assembly name: a name equal to a prefix, or starting with one,
/// is platform code. Covers runtimes whose packages are not reliably signed.
#[derive(Debug, Clone)]
pub struct AssemblyNameFilter {
    prefixes: Vec<String>,
}

impl AssemblyNameFilter {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        prefixes.retain(|p| !p.is_empty());
        prefixes.sort();
        prefixes.dedup();
        Self { prefixes }
    }
}

impl Default for AssemblyNameFilter {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_PREFIXES.iter().copied())
    }
}

impl DependencyFilter for AssemblyNameFilter {
    fn is_framework_assembly(&self, assembly: &AssemblyIdentity) -> bool {
        let name = assembly.name();
        // `System.` also matches the bare `System` assembly.
        self.prefixes.iter().any(|prefix| {
            name.starts_with(prefix.as_str()) || prefix.strip_suffix('.') == Some(name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssemblyVersion;

    fn identity(name: &str, token: &str) -> AssemblyIdentity {
        AssemblyIdentity::new(name, AssemblyVersion::new(4, 0, 0, 0), "", token)
    }

    #[test]
    fn framework_filter_matches_known_tokens_only() {
        let filter = DotNetFrameworkFilter::new();
        assert!(filter.is_framework_assembly(&identity("mscorlib", "b77a5c561934e089")));
        assert!(filter.is_framework_assembly(&identity("netstandard", "cc7b13ffcd2ddd51")));
        assert!(!filter.is_framework_assembly(&identity("Contoso.Core", "0123456789abcdef")));
        assert!(!filter.is_framework_assembly(&identity("Unsigned", "")));
    }

    #[test]
    fn framework_filter_accepts_extra_tokens() {
        let filter = DotNetFrameworkFilter::with_extra_tokens(["0123456789ABCDEF"]);
        assert!(filter.is_framework_assembly(&identity("Contoso.Core", "0123456789abcdef")));
    }

    #[test]
    fn name_filter_matches_prefixes() {
        let filter = AssemblyNameFilter::default();
        assert!(filter.is_framework_assembly(&identity("System", "")));
        assert!(filter.is_framework_assembly(&identity("System.Runtime", "")));
        assert!(filter.is_framework_assembly(&identity("mscorlib", "")));
        assert!(!filter.is_framework_assembly(&identity("SystemX", "")));
        assert!(!filter.is_framework_assembly(&identity("Contoso.System", "")));
    }

    #[test]
    fn closures_are_filters() {
        let filter = |a: &AssemblyIdentity| a.name() == "mscorlib";
        assert!(filter.is_framework_assembly(&identity("mscorlib", "")));
        assert!(!filter.is_framework_assembly(&identity("netstandard", "")));
    }
}
