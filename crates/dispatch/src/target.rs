//! Printer targets and choosing one before a run starts.

use std::fmt;

use serde::Serialize;

use crate::error::ConfigurationError;

/// Opaque printer identifier handed to the backend verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PrinterTarget(String);

impl PrinterTarget {
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigurationError::EmptyTarget);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrinterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PrinterTarget {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered list of printers reported by the spooler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrinterCatalog {
    names: Vec<String>,
}

impl PrinterCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|candidate| candidate == name)
    }

    /// Index of the first printer whose name contains any hint, or `0`.
    pub fn suggested_default<S: AsRef<str>>(&self, hints: &[S]) -> usize {
        self.names
            .iter()
            .position(|name| hints.iter().any(|hint| name.contains(hint.as_ref())))
            .unwrap_or(0)
    }

    /// Picks the target for a run.
    ///
    /// An explicit request must name a listed printer. When the spooler
    /// reported nothing the request is trusted as-is, since enumeration is
    /// best-effort and the backend will report an unknown name itself.
    pub fn resolve<S: AsRef<str>>(
        &self,
        requested: Option<&str>,
        hints: &[S],
    ) -> Result<PrinterTarget, ConfigurationError> {
        match requested {
            Some(name) if self.is_empty() || self.contains(name) => PrinterTarget::new(name),
            Some(name) => Err(ConfigurationError::UnknownTarget(name.to_string())),
            None => {
                let index = self.suggested_default(hints);
                match self.names.get(index) {
                    Some(name) => PrinterTarget::new(name.as_str()),
                    None => Err(ConfigurationError::NoTarget),
                }
            }
        }
    }
}
