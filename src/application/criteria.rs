//! Declarative query descriptors for the blog entity store.
//!
//! A [`Criteria`] is built per request, handed to a [`BlogRepo`] and thrown
//! away. Adapters translate it into SQL or evaluate it in memory with
//! [`Criteria::matches`].
//!
//! [`BlogRepo`]: crate::application::repos::BlogRepo

use std::collections::BTreeSet;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::BlogEntry;

/// Associations a query may eager-load alongside each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Association {
    Author,
    Categories,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Active(bool),
    Id(Uuid),
    /// `published_at <= at`; entries without a publication time never match.
    PublishedBefore(OffsetDateTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotalCountMode {
    /// `total` equals the number of returned items.
    #[default]
    None,
    /// `total` is the exact number of matching rows.
    Exact,
    /// `total` counts at most [`NEXT_PAGES_LOOKAHEAD`] pages past the current one.
    NextPages,
}

pub const NEXT_PAGES_LOOKAHEAD: u64 = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    pub term: Option<String>,
    pub limit: Option<u64>,
    pub offset: u64,
    pub filters: Vec<Filter>,
    pub associations: BTreeSet<Association>,
    pub total_count_mode: TotalCountMode,
    pub title: Option<String>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_filter(&mut self, filter: Filter) -> &mut Self {
        self.filters.push(filter);
        self
    }

    pub fn add_associations(&mut self, associations: &[Association]) -> &mut Self {
        self.associations.extend(associations.iter().copied());
        self
    }

    pub fn has_association(&self, association: Association) -> bool {
        self.associations.contains(&association)
    }

    /// Search term trimmed to `None` when blank.
    pub fn effective_term(&self) -> Option<&str> {
        self.term
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    /// Evaluate filters and the search term against a loaded entry.
    pub fn matches(&self, entry: &BlogEntry) -> bool {
        let filters_hold = self.filters.iter().all(|filter| match filter {
            Filter::Active(active) => entry.record.active == *active,
            Filter::Id(id) => entry.record.id == *id,
            Filter::PublishedBefore(at) => entry
                .record
                .published_at
                .is_some_and(|published| published <= *at),
        });

        filters_hold && self.matches_term(entry)
    }

    fn matches_term(&self, entry: &BlogEntry) -> bool {
        let Some(term) = self.effective_term() else {
            return true;
        };
        let needle = term.to_lowercase();
        [
            entry.record.title.as_str(),
            entry.record.teaser.as_str(),
            entry.record.body.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Upper bound on rows to count under [`TotalCountMode::NextPages`].
    pub fn next_pages_cap(&self) -> Option<u64> {
        self.limit
            .map(|limit| {
                self.offset
                    .saturating_add(limit.saturating_mul(NEXT_PAGES_LOOKAHEAD + 1))
            })
    }
}

/// Items returned for a [`Criteria`] plus the pagination it was run with.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySearchResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl<T> EntitySearchResult<T> {
    pub fn empty(criteria: &Criteria) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            limit: criteria.limit,
            offset: criteria.offset,
        }
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn into_first(self) -> Option<T> {
        self.items.into_iter().next()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 1-based page number derived from limit and offset.
    pub fn page(&self) -> u64 {
        match self.limit {
            Some(limit) if limit > 0 => self.offset / limit + 1,
            _ => 1,
        }
    }

    pub fn page_count(&self) -> u64 {
        match self.limit {
            Some(limit) if limit > 0 => self.total.div_ceil(limit).max(1),
            _ => 1,
        }
    }
}
