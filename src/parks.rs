//! Quiz score → national park assignment.
//!
//! The table is built once at startup (defaults or TOML `[[parks]]`) and handed
//! to callers by reference; nothing here mutates after construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned for any score that falls outside every configured range.
pub const NO_MATCH: &str = "No matching park found";

/// Inclusive score interval mapped to a park name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreRange {
  pub min: i64,
  pub max: i64,
  pub park: String,
}

impl ScoreRange {
  pub fn new(min: i64, max: i64, park: impl Into<String>) -> Self {
    Self { min, max, park: park.into() }
  }

  pub fn contains(&self, points: i64) -> bool {
    self.min <= points && points <= self.max
  }

  fn overlaps(&self, other: &ScoreRange) -> bool {
    self.min <= other.max && other.min <= self.max
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParkTableError {
  #[error("range for '{park}' has min {min} > max {max}")]
  InvertedRange { park: String, min: i64, max: i64 },
  #[error("range [{min}, {max}] has an empty park name")]
  EmptyName { min: i64, max: i64 },
  #[error("ranges for '{first}' and '{second}' overlap")]
  Overlap { first: String, second: String },
}

/// Ordered, disjoint score ranges. First match wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParkTable {
  ranges: Vec<ScoreRange>,
}

impl ParkTable {
  pub fn new(ranges: Vec<ScoreRange>) -> Result<Self, ParkTableError> {
    for r in &ranges {
      if r.min > r.max {
        return Err(ParkTableError::InvertedRange { park: r.park.clone(), min: r.min, max: r.max });
      }
      if r.park.trim().is_empty() {
        return Err(ParkTableError::EmptyName { min: r.min, max: r.max });
      }
    }
    for (i, a) in ranges.iter().enumerate() {
      if let Some(b) = ranges[i + 1..].iter().find(|b| a.overlaps(b)) {
        return Err(ParkTableError::Overlap { first: a.park.clone(), second: b.park.clone() });
      }
    }
    Ok(Self { ranges })
  }

  pub fn ranges(&self) -> &[ScoreRange] { &self.ranges }

  pub fn lookup(&self, total_points: i64) -> Option<&ScoreRange> {
    self.ranges.iter().find(|r| r.contains(total_points))
  }

  /// Park name for `total_points`, or [`NO_MATCH`].
  pub fn assign_park(&self, total_points: i64) -> &str {
    self.lookup(total_points).map(|r| r.park.as_str()).unwrap_or(NO_MATCH)
  }
}

impl Default for ParkTable {
  fn default() -> Self {
    Self {
      ranges: vec![
        ScoreRange::new(70, 130, "Denali National Park"),
        ScoreRange::new(140, 170, "Grand Canyon National Park"),
        ScoreRange::new(180, 220, "Redwood National Park"),
        ScoreRange::new(230, 280, "Buck Island Reef National Monument"),
      ],
    }
  }
}
