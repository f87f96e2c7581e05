//! Version registry: which generation is current, and which are stale.

use roadcache_core::{Error, Generation};

/// Names the current cache generation and decides which others to discard.
///
/// The registry holds no storage of its own; it is a value owned by the
/// lifecycle controller and applied to whatever the store reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRegistry {
    current: String,
}

impl VersionRegistry {
    pub fn new(current: impl Into<String>) -> Result<Self, Error> {
        let current = current.into();
        if current.trim().is_empty() {
            return Err(Error::InvalidInput("cache version cannot be empty".into()));
        }
        Ok(Self { current })
    }

    /// Label of the current generation.
    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.current == name
    }

    /// Every generation that is not the current one, in store order.
    pub fn stale<'a>(&self, generations: &'a [Generation]) -> Vec<&'a str> {
        generations
            .iter()
            .map(|generation| generation.name.as_str())
            .filter(|name| !self.is_current(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation(name: &str) -> Generation {
        Generation { name: name.to_string(), created_at: "2026-01-01T00:00:00.000000Z".into(), activated_at: None }
    }

    #[test]
    fn test_rejects_empty_version() {
        assert!(matches!(VersionRegistry::new(""), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_stale_excludes_current() {
        let registry = VersionRegistry::new("v2").unwrap();
        let generations = vec![generation("v0"), generation("v1"), generation("v2")];
        assert_eq!(registry.stale(&generations), vec!["v0", "v1"]);
    }

    #[test]
    fn test_stale_on_clean_store() {
        let registry = VersionRegistry::new("v1").unwrap();
        assert!(registry.stale(&[generation("v1")]).is_empty());
        assert!(registry.stale(&[]).is_empty());
    }

    #[test]
    fn test_exact_match_only() {
        let registry = VersionRegistry::new("car-music-player-v23").unwrap();
        assert!(!registry.is_current("car-music-player-v230"));
        assert!(registry.is_current("car-music-player-v23"));
    }
}
