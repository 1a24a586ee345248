//! Filter keys and the persisted filter configuration they are built from.

use crate::resource::Resource;
use serde::{Deserialize, Serialize};

/// Maximum entries in one filter configuration (one per ghost slot).
pub const MAX_FILTER_ENTRIES: usize = 9;

/// Errors from filter configuration calls. Raised at configuration time,
/// never during a transfer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("filter amount must be positive")]
    NonPositiveAmount,
    #[error("filter template is empty")]
    EmptyTemplate,
    #[error("filter already holds the maximum of {max} entries")]
    TooManyEntries { max: usize },
    #[error("no filter entry at index {0}")]
    NoSuchEntry(usize),
}

/// How a key's descriptor is compared against a candidate stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchMode {
    /// Kind and every component must be equal.
    #[default]
    Exact,
    /// Kind must be equal; components are ignored.
    KindOnly,
}

/// The configured amount of a filter entry.
///
/// On an output filter this is how much the endpoint should hold; on an
/// input filter it is how much must be left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Amount {
    Limited(u32),
    /// Output: request without bound. Input: retain nothing.
    Unlimited,
}

impl Amount {
    /// The count an output filter starts from before subtracting contents.
    pub fn requested(&self) -> i64 {
        match self {
            Amount::Limited(n) => i64::from(*n),
            Amount::Unlimited => i64::from(u32::MAX),
        }
    }

    /// The count an input filter must leave in its endpoint.
    pub fn retained(&self) -> i64 {
        match self {
            Amount::Limited(n) => i64::from(*n),
            Amount::Unlimited => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// FilterKey
// ---------------------------------------------------------------------------

/// A resource descriptor paired with a mutable count.
///
/// Positive counts mean "still wanted" (output) or "still pullable" (input).
/// Negative counts only exist while an input filter is being initialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterKey<R> {
    descriptor: R,
    match_mode: MatchMode,
    count: i64,
}

impl<R: Resource> FilterKey<R> {
    pub fn new(descriptor: R, match_mode: MatchMode, count: i64) -> Self {
        Self {
            descriptor,
            match_mode,
            count,
        }
    }

    /// Whether `candidate` is the resource this key describes.
    pub fn matches(&self, candidate: &R) -> bool {
        match self.match_mode {
            MatchMode::Exact => self.descriptor.same_variant(candidate),
            MatchMode::KindOnly => self.descriptor.same_kind(candidate),
        }
    }

    pub fn descriptor(&self) -> &R {
        &self.descriptor
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    /// The count as a transferable amount: zero when not positive, saturated
    /// at `u32::MAX`.
    pub fn remaining(&self) -> u32 {
        u32::try_from(self.count.max(0)).unwrap_or(u32::MAX)
    }

    pub fn grow(&mut self, amount: i64) {
        self.count = self.count.saturating_add(amount);
    }

    pub fn shrink(&mut self, amount: u32) {
        self.count = self.count.saturating_sub(i64::from(amount));
    }

    pub(crate) fn set_count(&mut self, count: i64) {
        self.count = count;
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Whether a filter lists what may pass or what may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterMode {
    #[default]
    Whitelist,
    Blacklist,
}

/// One configured entry: what to match and how much.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterEntry<R> {
    pub template: R,
    pub amount: Amount,
    #[serde(default)]
    pub match_mode: MatchMode,
}

/// The persisted half of a filter: mode plus an ordered entry list. Live
/// counts are never stored; they are recomputed from endpoint contents each
/// time a [`Filter`](crate::filter::Filter) is initialized.
///
/// Entry order is the tie-break when several entries match the same stack:
/// the earliest entry wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig<R> {
    pub mode: FilterMode,
    entries: Vec<FilterEntry<R>>,
}

impl<R: Resource> FilterConfig<R> {
    pub fn new(mode: FilterMode) -> Self {
        Self {
            mode,
            entries: Vec::new(),
        }
    }

    pub fn whitelist() -> Self {
        Self::new(FilterMode::Whitelist)
    }

    pub fn blacklist() -> Self {
        Self::new(FilterMode::Blacklist)
    }

    /// Append an entry. Rejects `Limited(0)`, an empty template and a full
    /// list.
    pub fn add_entry(
        &mut self,
        template: R,
        amount: Amount,
        match_mode: MatchMode,
    ) -> Result<(), FilterError> {
        if amount == Amount::Limited(0) {
            return Err(FilterError::NonPositiveAmount);
        }
        if template.is_empty() {
            return Err(FilterError::EmptyTemplate);
        }
        if self.entries.len() >= MAX_FILTER_ENTRIES {
            return Err(FilterError::TooManyEntries {
                max: MAX_FILTER_ENTRIES,
            });
        }
        self.entries.push(FilterEntry {
            template,
            amount,
            match_mode,
        });
        Ok(())
    }

    /// Builder form of [`add_entry`](Self::add_entry) with exact matching.
    pub fn with_entry(mut self, template: R, amount: Amount) -> Result<Self, FilterError> {
        self.add_entry(template, amount, MatchMode::Exact)?;
        Ok(self)
    }

    pub fn remove_entry(&mut self, index: usize) -> Result<FilterEntry<R>, FilterError> {
        if index >= self.entries.len() {
            return Err(FilterError::NoSuchEntry(index));
        }
        Ok(self.entries.remove(index))
    }

    /// Re-check every entry. Used after loading a configuration that did not
    /// go through [`add_entry`](Self::add_entry).
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.entries.len() > MAX_FILTER_ENTRIES {
            return Err(FilterError::TooManyEntries {
                max: MAX_FILTER_ENTRIES,
            });
        }
        if self.entries.iter().any(|e| e.amount == Amount::Limited(0)) {
            return Err(FilterError::NonPositiveAmount);
        }
        if self.entries.iter().any(|e| e.template.is_empty()) {
            return Err(FilterError::EmptyTemplate);
        }
        Ok(())
    }

    pub fn entries(&self) -> &[FilterEntry<R>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
