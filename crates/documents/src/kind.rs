use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// Document type; selects the schema and the hallucination detector.
///
/// Parsing is case-insensitive and never fails for a non-empty name: names
/// without built-in support become [`DocumentKind::Other`].
///
/// ```rust
/// use documents::DocumentKind;
///
/// assert_eq!("Receipt".parse::<DocumentKind>().unwrap(), DocumentKind::Receipt);
/// assert_eq!(
///     "invoice".parse::<DocumentKind>().unwrap(),
///     DocumentKind::Other("invoice".into())
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DocumentKind {
    Check,
    Receipt,
    /// A caller-defined kind, stored lower-cased.
    Other(String),
}

impl DocumentKind {
    pub fn as_str(&self) -> &str {
        match self {
            DocumentKind::Check => "check",
            DocumentKind::Receipt => "receipt",
            DocumentKind::Other(name) => name,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, DocumentKind::Other(_))
    }
}

impl FromStr for DocumentKind {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "" => Err(DocumentError::InvalidKind(s.to_owned())),
            "check" | "cheque" => Ok(DocumentKind::Check),
            "receipt" => Ok(DocumentKind::Receipt),
            _ => Ok(DocumentKind::Other(name)),
        }
    }
}

impl TryFrom<String> for DocumentKind {
    type Error = DocumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DocumentKind> for String {
    fn from(kind: DocumentKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(" CHECK ".parse::<DocumentKind>().unwrap(), DocumentKind::Check);
        assert_eq!("cheque".parse::<DocumentKind>().unwrap(), DocumentKind::Check);
        assert_eq!(
            "Invoice".parse::<DocumentKind>().unwrap(),
            DocumentKind::Other("invoice".into())
        );
        assert!("   ".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn serde_round_trips_through_names() {
        let json = serde_json::to_string(&DocumentKind::Receipt).unwrap();
        assert_eq!(json, "\"receipt\"");
        let kind: DocumentKind = serde_json::from_str("\"Check\"").unwrap();
        assert_eq!(kind, DocumentKind::Check);
        assert!(serde_json::from_str::<DocumentKind>("\"\"").is_err());
    }
}
