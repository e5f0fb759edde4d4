//! Allow-list of Telegram user ids permitted to administer raffles.

use std::collections::BTreeSet;

/// Set of admin principal ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    ids: BTreeSet<i64>,
}

impl AllowList {
    /// Parses a comma-separated list such as `"111, 222"`.
    ///
    /// Entries are trimmed and compared as integers; entries that are not integers are
    /// ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self {
            ids: raw
                .split(',')
                .filter_map(|id| id.trim().parse::<i64>().ok())
                .collect(),
        }
    }

    /// Builds an allow-list from ids that are already numeric.
    #[must_use]
    pub fn from_ids<I: IntoIterator<Item = i64>>(ids: I) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Whether `id` may administer raffles.
    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// True when nobody is allowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates the allowed ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }
}
