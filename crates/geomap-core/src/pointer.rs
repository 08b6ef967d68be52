use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointerError {
    #[error("JSON pointer must be empty or start with '/', got '{0}'")]
    MissingLeadingSlash(String),

    #[error("Invalid escape sequence in JSON pointer '{0}'")]
    InvalidEscape(String),
}

/// A parsed JSON pointer (RFC 6901).
///
/// The empty pointer addresses the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonPointer {
    tokens: Vec<String>,
}

impl JsonPointer {
    pub fn root() -> Self {
        Self { tokens: Vec::new() }
    }

    pub fn parse(raw: &str) -> Result<Self, PointerError> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(PointerError::MissingLeadingSlash(raw.to_string()));
        };
        let tokens = rest
            .split('/')
            .map(|token| unescape(token).ok_or_else(|| PointerError::InvalidEscape(raw.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tokens })
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Split into the parent pointer and the final reference token.
    pub fn split_last(&self) -> Option<(JsonPointer, &str)> {
        let (last, parent) = self.tokens.split_last()?;
        Some((
            JsonPointer {
                tokens: parent.to_vec(),
            },
            last.as_str(),
        ))
    }

    pub fn child(&self, token: impl Into<String>) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(token.into());
        Self { tokens }
    }

    /// True when `self` is a strict descendant of `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &JsonPointer) -> bool {
        self.tokens.len() > ancestor.tokens.len() && self.tokens.starts_with(&ancestor.tokens)
    }
}

fn unescape(token: &str) -> Option<String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{}", escape(token))?;
        }
        Ok(())
    }
}

impl FromStr for JsonPointer {
    type Err = PointerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root_and_tokens() {
        assert!(JsonPointer::parse("").unwrap().is_root());
        let p = JsonPointer::parse("/layers/0/visible").unwrap();
        assert_eq!(p.tokens(), &["layers", "0", "visible"]);
    }

    #[test]
    fn test_escapes_roundtrip_through_display() {
        let p = JsonPointer::parse("/a~1b/c~0d").unwrap();
        assert_eq!(p.tokens(), &["a/b", "c~d"]);
        assert_eq!(p.to_string(), "/a~1b/c~0d");
    }

    #[test]
    fn test_rejects_malformed_pointers() {
        assert!(matches!(
            JsonPointer::parse("layers"),
            Err(PointerError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            JsonPointer::parse("/a~2"),
            Err(PointerError::InvalidEscape(_))
        ));
    }

    #[test]
    fn test_descendant_check() {
        let parent = JsonPointer::parse("/layers/0").unwrap();
        let child = JsonPointer::parse("/layers/0/data").unwrap();
        assert!(child.is_descendant_of(&parent));
        assert!(!parent.is_descendant_of(&parent));
        assert!(!parent.is_descendant_of(&child));
    }
}
