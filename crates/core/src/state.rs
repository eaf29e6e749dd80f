//! Identifiers accumulated over a timeline run.
//!
//! Write actions never mutate [`RunState`] directly: each receives a copy and
//! returns a [`StateDelta`], which the runner merges.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::StepError;

/// Symbolic name to provider id (e.g. `c_1` to `cus_J32Jq8Yfp6QYF2`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    ids: BTreeMap<String, String>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an id by name.
    ///
    /// A missing name means an earlier step forgot to return it, so this is
    /// a contract error rather than an `Option`.
    pub fn get(&self, key: &str) -> Result<&str, StepError> {
        self.ids
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| StepError::MissingState {
                key: key.to_string(),
            })
    }

    /// Merge a delta, returning the names that replaced an earlier value.
    pub fn merge(&mut self, delta: StateDelta) -> Vec<String> {
        let mut replaced = Vec::new();
        for (key, value) in delta.ids {
            if let Some(previous) = self.ids.insert(key.clone(), value) {
                if self.ids[&key] != previous {
                    replaced.push(key);
                }
            }
        }
        replaced
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Ids produced by one write action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    ids: BTreeMap<String, String>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, id: impl Into<String>) -> Self {
        self.insert(key, id);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, id: impl Into<String>) {
        self.ids.insert(key.into(), id.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StateDelta {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut delta = StateDelta::new();
        for (k, v) in iter {
            delta.insert(k, v);
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_contract_error() {
        let state = RunState::new();
        let err = state.get("c_1").unwrap_err();
        assert!(matches!(err, StepError::MissingState { ref key } if key == "c_1"));
    }

    #[test]
    fn merge_grows_state() {
        let mut state = RunState::new();
        state.merge(StateDelta::new().with("c_1", "cus_1"));
        state.merge([("pm_1", "pm_A"), ("pm_2", "pm_B")].into_iter().collect());

        assert_eq!(state.get("c_1").unwrap(), "cus_1");
        assert_eq!(state.get("pm_1").unwrap(), "pm_A");
        assert_eq!(state.get("pm_2").unwrap(), "pm_B");
    }

    #[test]
    fn merge_reports_replaced_values() {
        let mut state = RunState::new();
        state.merge(StateDelta::new().with("c_1", "cus_1"));

        let same = state.merge(StateDelta::new().with("c_1", "cus_1"));
        assert!(same.is_empty());

        let replaced = state.merge(StateDelta::new().with("c_1", "cus_2"));
        assert_eq!(replaced, vec!["c_1".to_string()]);
        assert_eq!(state.get("c_1").unwrap(), "cus_2");
    }

    #[test]
    fn empty_delta_is_a_no_op() {
        let mut state = RunState::new();
        state.merge(StateDelta::new());
        assert_eq!(state, RunState::new());
    }
}
