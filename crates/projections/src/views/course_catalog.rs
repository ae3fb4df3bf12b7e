//! Course listings: published courses, courses by creator, and search.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CourseId, LectureId, UserId};
use domain::{CourseEvent, Money};
use event_store::EventEnvelope;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Result;
use crate::error::decode;
use crate::projection::{Checkpoint, Projection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseListing {
    pub course_id: CourseId,
    pub creator_id: UserId,
    pub title: String,
    pub subtitle: Option<String>,
    pub category: Option<String>,
    pub price: Money,
    pub thumbnail_url: Option<String>,
    pub published: bool,
    pub lecture_count: usize,
    pub enrolled_count: usize,
    pub created_at: DateTime<Utc>,
}

impl CourseListing {
    /// Case-insensitive substring match on title, subtitle or category.
    fn matches_text(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let contains = |field: &str| field.to_lowercase().contains(needle);
        contains(self.title.as_str())
            || self.subtitle.as_deref().is_some_and(contains)
            || self.category.as_deref().is_some_and(contains)
    }

    fn in_categories(&self, categories: &[String]) -> bool {
        categories.is_empty()
            || self.category.as_deref().is_some_and(|category| {
                categories
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(category))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSort {
    #[serde(alias = "asc")]
    Low,
    #[serde(alias = "desc")]
    High,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub sort: Option<PriceSort>,
}

#[derive(Default)]
struct CatalogState {
    courses: HashMap<CourseId, CourseListing>,
    lectures: HashMap<CourseId, HashSet<LectureId>>,
    students: HashMap<CourseId, HashSet<UserId>>,
    checkpoint: Checkpoint,
}

impl CatalogState {
    fn fold(&mut self, course_id: CourseId, event: CourseEvent) {
        if let CourseEvent::CourseCreated(data) = event {
            self.courses.insert(
                course_id,
                CourseListing {
                    course_id,
                    creator_id: data.creator_id,
                    title: data.title,
                    subtitle: data.subtitle,
                    category: data.category,
                    price: data.price,
                    thumbnail_url: None,
                    published: false,
                    lecture_count: 0,
                    enrolled_count: 0,
                    created_at: data.created_at,
                },
            );
            return;
        }

        let Some(listing) = self.courses.get_mut(&course_id) else {
            tracing::warn!(%course_id, "course event before creation, skipped");
            return;
        };

        match event {
            CourseEvent::CourseDetailsEdited(edit) => {
                if let Some(title) = edit.title {
                    listing.title = title;
                }
                if edit.subtitle.is_some() {
                    listing.subtitle = edit.subtitle;
                }
                if edit.category.is_some() {
                    listing.category = edit.category;
                }
                if let Some(price) = edit.price {
                    listing.price = price;
                }
                if edit.thumbnail_url.is_some() {
                    listing.thumbnail_url = edit.thumbnail_url;
                }
            }
            CourseEvent::LectureAttached { lecture_id } => {
                let lectures = self.lectures.entry(course_id).or_default();
                lectures.insert(lecture_id);
                listing.lecture_count = lectures.len();
            }
            CourseEvent::LectureDetached { lecture_id } => {
                let lectures = self.lectures.entry(course_id).or_default();
                lectures.remove(&lecture_id);
                listing.lecture_count = lectures.len();
            }
            CourseEvent::CoursePublished { .. } => listing.published = true,
            CourseEvent::CourseUnpublished { .. } => listing.published = false,
            CourseEvent::StudentEnrolled { user_id, .. } => {
                let students = self.students.entry(course_id).or_default();
                students.insert(user_id);
                listing.enrolled_count = students.len();
            }
            CourseEvent::CourseCreated(_) => {}
        }
    }

    fn published(&self) -> Vec<CourseListing> {
        let mut listings: Vec<CourseListing> = self
            .courses
            .values()
            .filter(|c| c.published)
            .cloned()
            .collect();
        listings.sort_by_key(|c| c.created_at);
        listings
    }
}

/// Query-side listings over the course streams.
#[derive(Clone, Default)]
pub struct CourseCatalogView {
    state: Arc<RwLock<CatalogState>>,
}

impl CourseCatalogView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, course_id: CourseId) -> Option<CourseListing> {
        self.state.read().await.courses.get(&course_id).cloned()
    }

    /// Published courses, oldest first.
    pub async fn published(&self) -> Vec<CourseListing> {
        self.state.read().await.published()
    }

    /// Every course the creator owns, published or not, newest first.
    pub async fn by_creator(&self, creator_id: UserId) -> Vec<CourseListing> {
        let state = self.state.read().await;
        let mut listings: Vec<CourseListing> = state
            .courses
            .values()
            .filter(|c| c.creator_id == creator_id)
            .cloned()
            .collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listings
    }

    /// Searches published courses. Without a price sort the result keeps
    /// publication listing order.
    pub async fn search(&self, query: &SearchQuery) -> Vec<CourseListing> {
        let needle = query.query.trim().to_lowercase();
        let mut hits: Vec<CourseListing> = self
            .state
            .read()
            .await
            .published()
            .into_iter()
            .filter(|c| c.matches_text(&needle) && c.in_categories(&query.categories))
            .collect();

        match query.sort {
            Some(PriceSort::Low) => hits.sort_by_key(|c| c.price),
            Some(PriceSort::High) => hits.sort_by(|a, b| b.price.cmp(&a.price)),
            None => {}
        }
        hits
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.courses.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Projection for CourseCatalogView {
    fn name(&self) -> &'static str {
        "CourseCatalogView"
    }

    async fn apply(&self, checkpoint: Checkpoint, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        state.checkpoint = checkpoint;

        if event.aggregate_type != "Course" {
            return Ok(());
        }

        let course_id = CourseId::from_uuid(event.aggregate_id.as_uuid());
        let course_event: CourseEvent = decode(event)?;
        state.fold(course_id, course_event);
        Ok(())
    }

    async fn checkpoint(&self) -> Checkpoint {
        self.state.read().await.checkpoint
    }

    async fn reset(&self) -> Result<()> {
        *self.state.write().await = CatalogState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{AggregateId, PurchaseId};
    use domain::{DomainEvent, NewCourse};
    use domain::catalog::CourseDetailsEditedData;
    use event_store::Version;

    #[derive(Default)]
    struct Feed {
        view: CourseCatalogView,
        position: u64,
        versions: HashMap<CourseId, i64>,
    }

    impl Feed {
        async fn push(&mut self, course_id: CourseId, event: CourseEvent) {
            self.position += 1;
            let version = self.versions.entry(course_id).or_insert(0);
            *version += 1;
            let envelope = EventEnvelope::builder()
                .aggregate_id(AggregateId::from(course_id))
                .aggregate_type("Course")
                .event_type(event.event_type())
                .version(Version::new(*version))
                .payload(&event)
                .unwrap()
                .build()
                .unwrap();
            self.view
                .apply(Checkpoint::at(self.position), &envelope)
                .await
                .unwrap();
        }

        async fn course(
            &mut self,
            creator: UserId,
            title: &str,
            category: Option<&str>,
            price: i64,
            publish: bool,
        ) -> CourseId {
            let course_id = CourseId::new();
            let new = NewCourse {
                title: title.into(),
                subtitle: None,
                description: String::new(),
                category: category.map(str::to_string),
                price: Money::from_minor(price),
            };
            self.push(course_id, CourseEvent::course_created(course_id, creator, &new))
                .await;
            if publish {
                self.push(course_id, CourseEvent::CoursePublished { at: Utc::now() })
                    .await;
            }
            course_id
        }
    }

    #[tokio::test]
    async fn only_published_courses_are_listed() {
        let mut feed = Feed::default();
        let creator = UserId::new();
        let live = feed.course(creator, "Rust Basics", None, 500, true).await;
        let draft = feed.course(creator, "Draft", None, 100, false).await;

        let published = feed.view.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].course_id, live);

        let mine = feed.view.by_creator(creator).await;
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().any(|c| c.course_id == draft));

        feed.push(live, CourseEvent::CourseUnpublished { at: Utc::now() })
            .await;
        assert!(feed.view.published().await.is_empty());
    }

    #[tokio::test]
    async fn search_matches_title_and_category_case_insensitively() {
        let mut feed = Feed::default();
        let creator = UserId::new();
        feed.course(creator, "Advanced Rust", Some("Programming"), 900, true)
            .await;
        feed.course(creator, "Watercolour", Some("Art"), 300, true)
            .await;
        feed.course(creator, "Hidden Rust", Some("Programming"), 100, false)
            .await;

        let by_title = feed
            .view
            .search(&SearchQuery {
                query: "rust".into(),
                ..SearchQuery::default()
            })
            .await;
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].title, "Advanced Rust");

        let by_category = feed
            .view
            .search(&SearchQuery {
                query: "ART".into(),
                ..SearchQuery::default()
            })
            .await;
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].title, "Watercolour");

        let filtered = feed
            .view
            .search(&SearchQuery {
                categories: vec!["programming".into()],
                ..SearchQuery::default()
            })
            .await;
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn search_sorts_by_price() {
        let mut feed = Feed::default();
        let creator = UserId::new();
        feed.course(creator, "Mid", None, 500, true).await;
        feed.course(creator, "Cheap", None, 100, true).await;
        feed.course(creator, "Pricey", None, 900, true).await;

        let low = feed
            .view
            .search(&SearchQuery {
                sort: Some(PriceSort::Low),
                ..SearchQuery::default()
            })
            .await;
        let titles: Vec<_> = low.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Cheap", "Mid", "Pricey"]);

        let high = feed
            .view
            .search(&SearchQuery {
                sort: Some(PriceSort::High),
                ..SearchQuery::default()
            })
            .await;
        assert_eq!(high[0].title, "Pricey");
    }

    #[tokio::test]
    async fn tracks_edits_lectures_and_enrollment() {
        let mut feed = Feed::default();
        let course = feed.course(UserId::new(), "Old", None, 500, true).await;
        let lecture = LectureId::new();

        feed.push(
            course,
            CourseEvent::CourseDetailsEdited(CourseDetailsEditedData {
                title: Some("New".into()),
                price: Some(Money::from_minor(700)),
                ..CourseDetailsEditedData::default()
            }),
        )
        .await;
        feed.push(course, CourseEvent::LectureAttached { lecture_id: lecture })
            .await;
        feed.push(course, CourseEvent::LectureAttached { lecture_id: LectureId::new() })
            .await;
        feed.push(course, CourseEvent::LectureDetached { lecture_id: lecture })
            .await;

        let student = UserId::new();
        for _ in 0..2 {
            feed.push(
                course,
                CourseEvent::StudentEnrolled {
                    user_id: student,
                    purchase_id: PurchaseId::new(),
                },
            )
            .await;
        }

        let listing = feed.view.get(course).await.unwrap();
        assert_eq!(listing.title, "New");
        assert_eq!(listing.price, Money::from_minor(700));
        assert_eq!(listing.lecture_count, 1);
        assert_eq!(listing.enrolled_count, 1);
    }

    #[test]
    fn price_sort_accepts_aliases() {
        let sort: PriceSort = serde_json::from_str("\"desc\"").unwrap();
        assert_eq!(sort, PriceSort::High);
        let sort: PriceSort = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(sort, PriceSort::Low);
    }
}
