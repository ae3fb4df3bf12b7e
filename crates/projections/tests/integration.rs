//! Domain services write, the processor catches up, the views answer.

use common::UserId;
use domain::{
    CatalogService, CourseDetails, LedgerService, Money, NewCourse, PurchaseStatus,
    ReconciliationStep,
};
use event_store::InMemoryEventStore;
use projections::{
    CourseCatalogView, PriceSort, ProjectionProcessor, PurchaseLedgerView, SearchQuery,
};

struct Harness {
    catalog: CatalogService<InMemoryEventStore>,
    ledger: LedgerService<InMemoryEventStore>,
    processor: ProjectionProcessor<InMemoryEventStore>,
    courses: CourseCatalogView,
    purchases: PurchaseLedgerView,
}

fn setup() -> Harness {
    let store = InMemoryEventStore::new();
    let courses = CourseCatalogView::new();
    let purchases = PurchaseLedgerView::new();

    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(courses.clone()));
    processor.register(Box::new(purchases.clone()));

    Harness {
        catalog: CatalogService::new(store.clone()),
        ledger: LedgerService::new(store),
        processor,
        courses,
        purchases,
    }
}

fn new_course(title: &str, price: i64) -> NewCourse {
    NewCourse {
        title: title.into(),
        subtitle: None,
        description: "about".into(),
        category: Some("Programming".into()),
        price: Money::from_minor(price),
    }
}

#[tokio::test]
async fn catalog_listings_follow_course_lifecycle() {
    let h = setup();
    let creator = UserId::new();

    let rust = h
        .catalog
        .create_course(creator, new_course("Rust in Practice", 900))
        .await
        .unwrap();
    let rust_id = rust.course_id().unwrap();
    let sql = h
        .catalog
        .create_course(creator, new_course("SQL Basics", 200))
        .await
        .unwrap();
    let sql_id = sql.course_id().unwrap();

    h.catalog.publish_course(rust_id).await.unwrap();
    h.catalog.publish_course(sql_id).await.unwrap();
    h.catalog.create_lecture(rust_id, "Ownership").await.unwrap();
    h.catalog
        .edit_course(
            sql_id,
            CourseDetails {
                price: Some(Money::from_minor(1_500)),
                ..CourseDetails::default()
            },
        )
        .await
        .unwrap();

    h.processor.run_catch_up().await.unwrap();

    assert_eq!(h.courses.published().await.len(), 2);
    assert_eq!(h.courses.by_creator(creator).await.len(), 2);
    assert_eq!(h.courses.get(rust_id).await.unwrap().lecture_count, 1);

    let sorted = h
        .courses
        .search(&SearchQuery {
            sort: Some(PriceSort::High),
            ..SearchQuery::default()
        })
        .await;
    assert_eq!(sorted[0].course_id, sql_id);

    h.catalog.unpublish_course(sql_id).await.unwrap();
    h.processor.run_catch_up().await.unwrap();

    let published = h.courses.published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].course_id, rust_id);
}

#[tokio::test]
async fn ledger_view_tracks_purchase_through_settlement() {
    let h = setup();
    let user = UserId::new();
    let course = h
        .catalog
        .create_course(UserId::new(), new_course("Rust", 500))
        .await
        .unwrap()
        .course_id()
        .unwrap();

    let purchase = h
        .ledger
        .open_purchase(user, course, Money::from_minor(500))
        .await
        .unwrap();
    let purchase_id = purchase.purchase_id().unwrap();
    h.ledger
        .attach_checkout_session(purchase_id, "cs_test_1")
        .await
        .unwrap();

    h.processor.run_catch_up().await.unwrap();
    let pending = h.purchases.find_by_correlation("cs_test_1").await.unwrap();
    assert_eq!(pending.status, PurchaseStatus::Pending);
    assert_eq!(pending.user_id, user);

    h.ledger
        .settle_payment(purchase_id, Some(Money::from_minor(500)))
        .await
        .unwrap();
    for step in [
        ReconciliationStep::UnlockPreviews,
        ReconciliationStep::EnrollUser,
        ReconciliationStep::EnrollCourse,
        ReconciliationStep::Finish,
    ] {
        h.ledger.record_step(purchase_id, step, 0).await.unwrap();
    }
    h.processor.run_catch_up().await.unwrap();

    let settled = h.purchases.purchase_for(user, course).await.unwrap();
    assert_eq!(settled.purchase_id, purchase_id);
    assert_eq!(settled.status, PurchaseStatus::Completed);
    assert!(settled.reconciled);
    assert!(h.purchases.purchase_for(UserId::new(), course).await.is_none());
}

#[tokio::test]
async fn rebuild_reproduces_the_same_views() {
    let h = setup();
    let creator = UserId::new();
    let course = h
        .catalog
        .create_course(creator, new_course("Rust", 500))
        .await
        .unwrap()
        .course_id()
        .unwrap();
    h.catalog.publish_course(course).await.unwrap();
    h.ledger
        .open_purchase(UserId::new(), course, Money::from_minor(500))
        .await
        .unwrap();

    let total = h.processor.run_catch_up().await.unwrap();
    let before = h.courses.get(course).await.unwrap();

    assert_eq!(h.processor.rebuild_all().await.unwrap(), total);
    assert_eq!(h.courses.get(course).await.unwrap(), before);
    assert_eq!(h.purchases.len().await, 1);
}
