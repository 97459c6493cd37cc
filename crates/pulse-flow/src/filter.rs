//! User-supplied filter sets.
//!
//! The wire shape is an array of single-key objects, each mapping a column
//! to one value or a list of values:
//!
//! ```json
//! [{"location": ["East", "West"]}, {"dept": "Nursing"}]
//! ```
//!
//! A [`FilterSet`] is immutable once built and is consumed by the SQL
//! compiler in clause order.

use std::collections::BTreeMap;

use serde::de::{Deserializer, Error as _};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// A single filter constraint value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Equality against one value.
    One(String),
    /// Membership in a list of values.
    Many(Vec<String>),
}

/// One column constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    /// Column the constraint applies to.
    pub column: String,
    /// The constraint value(s).
    pub value: FilterValue,
}

/// An ordered, immutable set of filter constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    clauses: Vec<FilterClause>,
}

impl FilterSet {
    /// Creates an empty filter set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a filter set from `(column, value)` pairs.
    #[must_use]
    pub fn from_clauses(clauses: impl IntoIterator<Item = (String, FilterValue)>) -> Self {
        Self {
            clauses: clauses
                .into_iter()
                .map(|(column, value)| FilterClause { column, value })
                .collect(),
        }
    }

    /// Returns true if the set has no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Number of constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Iterates clauses in order.
    pub fn iter(&self) -> impl Iterator<Item = &FilterClause> {
        self.clauses.iter()
    }
}

impl<'a> IntoIterator for &'a FilterSet {
    type Item = &'a FilterClause;
    type IntoIter = std::slice::Iter<'a, FilterClause>;

    fn into_iter(self) -> Self::IntoIter {
        self.clauses.iter()
    }
}

impl<'de> Deserialize<'de> for FilterSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Array order is preserved; entries within one object follow the
        // map's iteration order. Clients send single-key objects.
        let groups: Vec<BTreeMap<String, FilterValue>> = Vec::deserialize(deserializer)?;
        let mut clauses = Vec::new();
        for group in groups {
            if group.is_empty() {
                return Err(D::Error::custom("filter object must not be empty"));
            }
            for (column, value) in group {
                clauses.push(FilterClause { column, value });
            }
        }
        Ok(Self { clauses })
    }
}

impl Serialize for FilterSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.clauses.len()))?;
        for clause in &self.clauses {
            let mut entry = BTreeMap::new();
            entry.insert(&clause.column, &clause.value);
            seq.serialize_element(&entry)?;
        }
        seq.end()
    }
}
