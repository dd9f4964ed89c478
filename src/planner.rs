//! Incremental sync planning
//!
//! Works out how far back the next `git log` has to look, given the newest
//! commit already in the store.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::fmt;

use crate::error::PlanError;
use crate::model::TIMESTAMP_FORMAT;

/// Lower bound for the next sync. Commits at or after this instant (UTC) are
/// requested; it always lies strictly past the newest stored commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SyncBound(NaiveDateTime);

impl SyncBound {
    pub fn new(at: NaiveDateTime) -> Self {
        Self(at)
    }

    pub fn at(&self) -> NaiveDateTime {
        self.0
    }

    /// Form accepted by `git log --after`, pinned to UTC
    pub fn git_date(&self) -> String {
        format!("{} +0000", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

impl fmt::Display for SyncBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

/// Compute the bound from the stored high-water mark.
///
/// No mark means a first run and a full scan. Otherwise the bound is one
/// second past the mark so the newest stored commit is not fetched again.
pub fn lower_bound(high_water_mark: Option<&str>) -> Result<Option<SyncBound>, PlanError> {
    let Some(value) = high_water_mark else {
        return Ok(None);
    };

    let last = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|source| {
        PlanError::CorruptHighWaterMark {
            value: value.to_string(),
            source,
        }
    })?;

    Ok(Some(SyncBound(last + Duration::seconds(1))))
}
