//! In-memory stores for quiz results, the chat message log and park reviews.
//!
//! Every table hands out monotonically increasing ids and keeps records in id order.
//! The message log is append-only from the chat loop's point of view; edits and
//! deletes only come from the `/messages` endpoints.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::{LoggedMessage, QuizResult, Rating, Review};

struct Table<T> {
  next_id: u64,
  rows: BTreeMap<u64, T>,
}

// Written out so the row type does not need `Default`.
impl<T> Default for Table<T> {
  fn default() -> Self {
    Self { next_id: 0, rows: BTreeMap::new() }
  }
}

impl<T> Table<T> {
  fn allocate_id(&mut self) -> u64 {
    self.next_id += 1;
    self.next_id
  }
}

/// Partial update for a logged message; `None` leaves the field as is.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MessageUpdate {
  #[serde(default)] pub message: Option<String>,
  #[serde(default)] pub author: Option<String>,
  #[serde(default)] pub category: Option<String>,
}

impl MessageUpdate {
  pub fn is_empty(&self) -> bool {
    self.message.is_none() && self.author.is_none() && self.category.is_none()
  }
}

#[derive(Default)]
pub struct MessageLog {
  inner: RwLock<Table<LoggedMessage>>,
}

impl MessageLog {
  pub fn new() -> Self { Self::default() }

  #[instrument(level = "debug", skip(self, message, author, category), fields(message_len = message.len(), %author, %category))]
  pub async fn create(&self, message: &str, author: &str, category: &str) -> LoggedMessage {
    let mut t = self.inner.write().await;
    let id = t.allocate_id();
    let rec = LoggedMessage {
      id,
      message: message.to_string(),
      author: author.to_string(),
      category: category.to_string(),
      timestamp: Utc::now(),
    };
    t.rows.insert(id, rec.clone());
    debug!(target: "chat", id, "Logged chat message");
    rec
  }

  pub async fn list(&self) -> Vec<LoggedMessage> {
    self.inner.read().await.rows.values().cloned().collect()
  }

  pub async fn get(&self, id: u64) -> Option<LoggedMessage> {
    self.inner.read().await.rows.get(&id).cloned()
  }

  #[instrument(level = "debug", skip(self, update))]
  pub async fn update(&self, id: u64, update: MessageUpdate) -> Option<LoggedMessage> {
    let mut t = self.inner.write().await;
    let rec = t.rows.get_mut(&id)?;
    if let Some(m) = update.message { rec.message = m; }
    if let Some(a) = update.author { rec.author = a; }
    if let Some(c) = update.category { rec.category = c; }
    Some(rec.clone())
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn delete(&self, id: u64) -> Option<LoggedMessage> {
    self.inner.write().await.rows.remove(&id)
  }
}

#[derive(Default)]
pub struct QuizStore {
  inner: RwLock<Table<QuizResult>>,
}

impl QuizStore {
  pub fn new() -> Self { Self::default() }

  #[instrument(level = "debug", skip(self))]
  pub async fn create(&self, user: &str, total_points: i64, assigned_park: &str) -> QuizResult {
    let mut t = self.inner.write().await;
    let id = t.allocate_id();
    let rec = QuizResult {
      id,
      user: user.to_string(),
      total_points,
      assigned_park: assigned_park.to_string(),
      timestamp: Utc::now(),
    };
    t.rows.insert(id, rec.clone());
    rec
  }

  /// Most recent result for `user` (highest id).
  pub async fn latest(&self, user: &str) -> Option<QuizResult> {
    self.inner.read().await.rows.values().rev().find(|r| r.user == user).cloned()
  }

  /// Change the park on one of `user`'s own results.
  #[instrument(level = "debug", skip(self))]
  pub async fn update(&self, id: u64, user: &str, assigned_park: &str) -> Option<QuizResult> {
    let mut t = self.inner.write().await;
    let rec = t.rows.get_mut(&id).filter(|r| r.user == user)?;
    rec.assigned_park = assigned_park.to_string();
    Some(rec.clone())
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn delete_latest(&self, user: &str) -> Option<QuizResult> {
    let mut t = self.inner.write().await;
    let id = t.rows.values().rev().find(|r| r.user == user)?.id;
    t.rows.remove(&id)
  }

  pub async fn all(&self) -> Vec<QuizResult> {
    self.inner.read().await.rows.values().cloned().collect()
  }
}

/// Partial update for a review; `None` leaves the field as is.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReviewUpdate {
  #[serde(default)] pub title: Option<String>,
  #[serde(default)] pub comment: Option<String>,
  #[serde(default)] pub park: Option<String>,
}

impl ReviewUpdate {
  pub fn is_empty(&self) -> bool {
    self.title.is_none() && self.comment.is_none() && self.park.is_none()
  }
}

/// Reviews and their star ratings. Deleting a review drops its ratings.
///
/// Lock order is reviews, then ratings.
#[derive(Default)]
pub struct ReviewStore {
  reviews: RwLock<Table<Review>>,
  ratings: RwLock<Table<Rating>>,
}

impl ReviewStore {
  pub fn new() -> Self { Self::default() }

  #[instrument(level = "debug", skip(self, title, comment), fields(title_len = title.len(), comment_len = comment.len()))]
  pub async fn create(&self, user: &str, park: Option<&str>, title: &str, comment: &str) -> Review {
    let mut t = self.reviews.write().await;
    let id = t.allocate_id();
    let rec = Review {
      id,
      user: user.to_string(),
      park: park.map(str::to_string),
      title: title.to_string(),
      comment: comment.to_string(),
      timestamp: Utc::now(),
    };
    t.rows.insert(id, rec.clone());
    rec
  }

  /// All reviews, or only `user`'s.
  pub async fn list(&self, user: Option<&str>) -> Vec<Review> {
    self.reviews.read().await.rows.values()
      .filter(|r| user.map_or(true, |u| r.user == u))
      .cloned()
      .collect()
  }

  pub async fn get(&self, id: u64) -> Option<Review> {
    self.reviews.read().await.rows.get(&id).cloned()
  }

  #[instrument(level = "debug", skip(self, update))]
  pub async fn update(&self, id: u64, update: ReviewUpdate) -> Option<Review> {
    let mut t = self.reviews.write().await;
    let rec = t.rows.get_mut(&id)?;
    if let Some(v) = update.title { rec.title = v; }
    if let Some(v) = update.comment { rec.comment = v; }
    if let Some(v) = update.park { rec.park = Some(v); }
    Some(rec.clone())
  }

  /// Remove a review, returning it with the number of ratings dropped alongside.
  #[instrument(level = "debug", skip(self))]
  pub async fn delete(&self, id: u64) -> Option<(Review, usize)> {
    let mut reviews = self.reviews.write().await;
    let review = reviews.rows.remove(&id)?;
    let mut ratings = self.ratings.write().await;
    let before = ratings.rows.len();
    ratings.rows.retain(|_, r| r.review_id != id);
    Some((review, before - ratings.rows.len()))
  }

  /// Attach a rating; `None` when the review does not exist.
  #[instrument(level = "debug", skip(self))]
  pub async fn rate(&self, review_id: u64, user: &str, stars: u8) -> Option<Rating> {
    // Held across the insert so a concurrent delete cannot orphan the rating.
    let reviews = self.reviews.read().await;
    if !reviews.rows.contains_key(&review_id) {
      return None;
    }
    let mut t = self.ratings.write().await;
    let id = t.allocate_id();
    let rec = Rating { id, review_id, user: user.to_string(), stars, timestamp: Utc::now() };
    t.rows.insert(id, rec.clone());
    debug!(target: "reviews", id, review_id, stars, "Rating stored");
    Some(rec)
  }

  /// Ratings on a review in submission order; `None` when the review does not exist.
  pub async fn ratings(&self, review_id: u64) -> Option<Vec<Rating>> {
    let reviews = self.reviews.read().await;
    if !reviews.rows.contains_key(&review_id) {
      return None;
    }
    let t = self.ratings.read().await;
    Some(t.rows.values().filter(|r| r.review_id == review_id).cloned().collect())
  }
}
