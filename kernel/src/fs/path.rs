//! Path parsing. ASCII, `/`-separated, absolute paths only; this iteration
//! does not interpret `.` or `..`. Names are capped at
//! [`crate::limits::MAX_NAME_LENGTH`] bytes and must be non-empty and
//! `/`-free by construction (they come from splitting on `/`).

use alloc::{string::String, vec::Vec};
use core::str::FromStr;

use crate::limits::{MAX_NAME_LENGTH, MAX_PATH_LENGTH};

#[derive(Debug, Default, Clone)]
pub struct Path {
    /// Path components, not including the leading `/`. Empty for the root
    /// path.
    segments: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PathParseError {
    Empty,
    NotAbsolute,
    MaxLengthExceeded,
    NameTooLong,
}

impl Path {
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// Splits into (parent path, leaf name); `None` if this is the root
    /// (no parent).
    pub fn split_leaf(&self) -> Option<(Path, &str)> {
        let (leaf, rest) = self.segments.split_last()?;
        Some((
            Path {
                segments: rest.to_vec(),
            },
            leaf.as_str(),
        ))
    }
}

impl FromStr for Path {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathParseError::Empty);
        }

        if s.len() > MAX_PATH_LENGTH {
            return Err(PathParseError::MaxLengthExceeded);
        }

        if !s.starts_with('/') {
            return Err(PathParseError::NotAbsolute);
        }

        let mut segments = Vec::new();

        for segment in s.split('/').filter(|s| !s.is_empty()) {
            if segment.len() > MAX_NAME_LENGTH {
                return Err(PathParseError::NameTooLong);
            }

            segments.push(segment.into());
        }

        Ok(Self { segments })
    }
}

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_parses_to_no_segments() {
        let path = Path::from_str("/").unwrap();
        assert!(path.is_root());
        assert_eq!(path.segments().count(), 0);
    }

    #[test]
    fn nested_path_splits_into_segments() {
        let path = Path::from_str("/dev/rtc").unwrap();
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["dev", "rtc"]);
    }

    #[test]
    fn relative_paths_are_rejected() {
        assert_eq!(Path::from_str("a/b"), Err(PathParseError::NotAbsolute));
    }

    #[test]
    fn split_leaf_separates_parent_and_name() {
        let path = Path::from_str("/a/b.txt").unwrap();
        let (parent, name) = path.split_leaf().unwrap();
        assert_eq!(name, "b.txt");
        assert_eq!(parent.segments().collect::<Vec<_>>(), vec!["a"]);
        assert!(!parent.is_root());
    }

    #[test]
    fn root_has_no_leaf() {
        let path = Path::from_str("/").unwrap();
        assert!(path.split_leaf().is_none());
    }

    #[test]
    fn overlong_name_is_rejected() {
        let long_name = "a".repeat(MAX_NAME_LENGTH + 1);
        let path_str = alloc::format!("/{long_name}");
        assert_eq!(Path::from_str(&path_str), Err(PathParseError::NameTooLong));
    }
}
