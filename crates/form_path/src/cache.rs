use std::collections::HashMap;
use std::str::FromStr;

use parking_lot::Mutex;

use crate::field_path::{FieldPath, PathError};

/// Compiles each distinct field name once.
#[derive(Debug, Default)]
pub struct PathCache {
    paths: Mutex<HashMap<String, FieldPath>>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&self, name: &str) -> Result<FieldPath, PathError> {
        let mut paths = self.paths.lock();
        if let Some(path) = paths.get(name) {
            return Ok(path.clone());
        }

        let path = FieldPath::from_str(name)?;
        paths.insert(name.to_string(), path.clone());

        Ok(path)
    }

    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn compiles_once_per_name() {
        // given
        let cache = PathCache::new();

        // when
        let first = cache.compile("a.b[0]").unwrap();
        let second = cache.compile("a.b[0]").unwrap();
        let third = cache.compile("a.b.0").unwrap();

        // then
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    pub fn errors_are_not_cached() {
        // given
        let cache = PathCache::new();

        // expect
        assert_eq!(cache.compile("a..b"), Err(PathError::EmptySegment("a..b".to_string())));
        assert!(cache.is_empty());
    }
}
