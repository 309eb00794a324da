//! Numeric tree paths
//!
//! Every node in an Ember+ tree is addressed by the sequence of 1-based
//! child numbers leading from the root down to it. The root itself has the
//! empty path.

use crate::error::{EmberError, EmberResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A numeric path identifying a node in the tree.
///
/// Paths are immutable once constructed. Equality and hashing are
/// structural, so a `PathKey` can be used directly as a map key without
/// going through a string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathKey(Box<[u32]>);

impl PathKey {
    /// The empty path, addressing the root node.
    pub fn root() -> Self {
        Self(Box::from([]))
    }

    /// Create a path from a slice of child numbers.
    pub fn new(numbers: &[u32]) -> Self {
        Self(numbers.into())
    }

    /// The child numbers making up this path.
    pub fn numbers(&self) -> &[u32] {
        &self.0
    }

    /// Number of path components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last path component, i.e. the node number.
    pub fn number(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// The path of the parent node. `None` for the root path.
    pub fn parent(&self) -> Option<PathKey> {
        if self.0.is_empty() {
            None
        } else {
            Some(PathKey::new(&self.0[..self.0.len() - 1]))
        }
    }

    /// The path of the child with the given number.
    pub fn child(&self, number: u32) -> PathKey {
        let mut numbers = Vec::with_capacity(self.0.len() + 1);
        numbers.extend_from_slice(&self.0);
        numbers.push(number);
        Self(numbers.into())
    }

    /// Iterate over all non-empty prefixes, shortest first, ending with the
    /// full path.
    pub fn prefixes(&self) -> impl Iterator<Item = PathKey> + '_ {
        (1..=self.0.len()).map(move |n| PathKey::new(&self.0[..n]))
    }

    /// True if `self` is a prefix of `other` (including equality).
    pub fn is_prefix_of(&self, other: &PathKey) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// Parse a dotted path string such as `"1.3.2"`.
    pub fn parse(text: &str) -> EmberResult<Self> {
        if text.is_empty() {
            return Ok(Self::root());
        }

        let mut numbers = Vec::new();
        for part in text.split('.') {
            let n: u32 = part.parse().map_err(|_| {
                EmberError::UsageError(format!("Invalid path component: {:?}", part))
            })?;
            numbers.push(n);
        }
        Ok(Self(numbers.into()))
    }
}

impl From<Vec<u32>> for PathKey {
    fn from(numbers: Vec<u32>) -> Self {
        Self(numbers.into())
    }
}

impl From<&[u32]> for PathKey {
    fn from(numbers: &[u32]) -> Self {
        Self::new(numbers)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, n) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", n)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        let path = PathKey::new(&[1, 3, 2]);
        let prefixes: Vec<PathKey> = path.prefixes().collect();
        assert_eq!(
            prefixes,
            vec![
                PathKey::new(&[1]),
                PathKey::new(&[1, 3]),
                PathKey::new(&[1, 3, 2]),
            ]
        );
    }

    #[test]
    fn test_parent_child() {
        let path = PathKey::new(&[1, 3]);
        assert_eq!(path.parent(), Some(PathKey::new(&[1])));
        assert_eq!(path.child(2), PathKey::new(&[1, 3, 2]));
        assert_eq!(PathKey::root().parent(), None);
    }

    #[test]
    fn test_display_parse() {
        let path = PathKey::new(&[1, 3, 2]);
        assert_eq!(path.to_string(), "1.3.2");
        assert_eq!(PathKey::parse("1.3.2").unwrap(), path);
        assert_eq!(PathKey::parse("").unwrap(), PathKey::root());
        assert!(PathKey::parse("1.x").is_err());
    }

    #[test]
    fn test_prefix_of() {
        let a = PathKey::new(&[1, 3]);
        let b = PathKey::new(&[1, 3, 2]);
        assert!(a.is_prefix_of(&b));
        assert!(a.is_prefix_of(&a));
        assert!(!b.is_prefix_of(&a));
    }
}
