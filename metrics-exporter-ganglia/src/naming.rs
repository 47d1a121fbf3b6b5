pub(crate) const DEFAULT_NAME_SEPARATOR: &str = ".";

/// Builds external metric names.
///
/// Names are built by joining the non-empty parts with the separator, with the prefix, if any, as the first part. Empty
/// parts are dropped entirely rather than rendered as doubled separators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamingPolicy {
    prefix: String,
    separator: String,
}

impl NamingPolicy {
    /// Creates a new `NamingPolicy`.
    ///
    /// An empty separator falls back to the default separator, `"."`.
    pub fn new<P, S>(prefix: P, separator: S) -> Self
    where
        P: Into<String>,
        S: Into<String>,
    {
        let mut separator = separator.into();
        if separator.is_empty() {
            separator = DEFAULT_NAME_SEPARATOR.to_string();
        }

        NamingPolicy { prefix: prefix.into(), separator }
    }

    /// Returns the prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the separator.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Builds a name out of the given parts.
    pub fn make_name(&self, parts: &[&str]) -> String {
        std::iter::once(self.prefix.as_str())
            .chain(parts.iter().copied())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(&self.separator)
    }
}

impl Default for NamingPolicy {
    fn default() -> Self {
        NamingPolicy::new("", DEFAULT_NAME_SEPARATOR)
    }
}
