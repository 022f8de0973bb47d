//! Environment variable store.
//!
//! The device manager reads a single variable from it: the name of the
//! default device, used when `open` is called without a name.

use std::collections::HashMap;

/// Read access to environment variables.
pub trait Environment {
    /// Returns the value of `key`, or an empty string if it is unset.
    fn get(&self, key: &str) -> String;
}

/// In-memory environment store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvStore {
    vars: HashMap<String, String>,
}

impl EnvStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, returning the store.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a variable, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Removes a variable.
    pub fn unset(&mut self, key: &str) {
        self.vars.remove(key);
    }
}

impl Environment for EnvStore {
    fn get(&self, key: &str) -> String {
        self.vars.get(key).cloned().unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_is_empty() {
        let env = EnvStore::new();
        assert_eq!(env.get("root"), "");
    }

    #[test]
    fn test_set_and_unset() {
        let mut env = EnvStore::new().with_var("root", "hd0,msdos1");
        assert_eq!(env.get("root"), "hd0,msdos1");

        env.set("root", "hd1");
        assert_eq!(env.get("root"), "hd1");

        env.unset("root");
        assert_eq!(env.get("root"), "");
    }

    #[test]
    fn test_from_iter() {
        let env: EnvStore = [("root", "sda"), ("prefix", "/boot")].into_iter().collect();
        assert_eq!(env.get("root"), "sda");
        assert_eq!(env.get("prefix"), "/boot");
    }
}
