//! LabelSet: the unordered, deduplicated type tags on an entity.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A set of labels, kept sorted and deduplicated so that two sets with the
/// same members compare equal regardless of the order they were given in.
///
/// Most architectural entities carry one to three labels (`Function`, `Go`),
/// hence the inline capacity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSet(SmallVec<[String; 4]>);

impl LabelSet {
    pub fn new(labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut inner: SmallVec<[String; 4]> = labels.into_iter().map(Into::into).collect();
        inner.sort_unstable();
        inner.dedup();
        Self(inner)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.binary_search_by(|l| l.as_str().cmp(label)).is_ok()
    }

    /// True when every label of `other` is also in `self`.
    pub fn is_superset(&self, other: &LabelSet) -> bool {
        other.iter().all(|l| self.contains(l))
    }

    pub fn insert(&mut self, label: impl Into<String>) {
        let label = label.into();
        if let Err(pos) = self.0.binary_search(&label) {
            self.0.insert(pos, label);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.to_vec()
    }
}

impl From<Vec<String>> for LabelSet {
    fn from(labels: Vec<String>) -> Self {
        Self::new(labels)
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(labels: LabelSet) -> Self {
        labels.0.into_vec()
    }
}

impl<S: Into<String>> FromIterator<S> for LabelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl std::fmt::Display for LabelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for label in self.iter() {
            write!(f, ":{label}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_order_and_duplicates_do_not_matter() {
        let a = LabelSet::new(["Go", "Function", "Go"]);
        let b = LabelSet::new(["Function", "Go"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.to_string(), ":Function:Go");
    }

    #[test]
    fn test_superset() {
        let full = LabelSet::new(["Function", "Go"]);
        assert!(full.is_superset(&LabelSet::new(["Function"])));
        assert!(!LabelSet::new(["Function"]).is_superset(&full));
    }

    proptest! {
        #[test]
        fn prop_labelset_is_sorted_and_unique(labels in proptest::collection::vec("[A-Z][a-z]{0,6}", 0..8)) {
            let set = LabelSet::new(labels.clone());
            let members: Vec<&str> = set.iter().collect();
            let mut expected: Vec<&str> = labels.iter().map(String::as_str).collect();
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(members, expected);
            for l in &labels {
                prop_assert!(set.contains(l));
            }
        }
    }
}
