use chrono::{DateTime, Duration, TimeZone, Utc};

use quillgate_core::quota::{day_window_start, UsageCategory};
use quillgate_core::service::Service;
use quillgate_core::usage::{UsageEvent, UsageReportFilter};
use quillgate_duckdb::DuckDbBackend;

fn event_at(
    user_id: &str,
    service: Service,
    category: UsageCategory,
    created_at: DateTime<Utc>,
) -> UsageEvent {
    let mut event = UsageEvent::new(
        user_id,
        service,
        category,
        "openai",
        "gpt-4o-mini",
        500,
        1200,
    );
    event.created_at = created_at;
    event
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn test_windowed_count_excludes_rows_before_boundary() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = noon();
    let window_start = day_window_start(now, 0);

    // Two in-window events, one from yesterday, one seconds before midnight.
    for created_at in [
        now - Duration::hours(1),
        now - Duration::hours(3),
        window_start - Duration::seconds(5),
        now - Duration::days(1),
    ] {
        db.append_usage(&event_at("user_1", Service::Books, UsageCategory::Text, created_at))
            .await
            .expect("append");
    }

    let windowed = db
        .count_usage("user_1", Service::Books, UsageCategory::Text, Some(window_start))
        .await
        .expect("count");
    assert_eq!(windowed, 2);

    let all_time = db
        .count_usage("user_1", Service::Books, UsageCategory::Text, None)
        .await
        .expect("count");
    assert_eq!(all_time, 4);
}

#[tokio::test]
async fn test_count_scoped_by_user_service_category() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = noon();
    let window_start = day_window_start(now, 0);

    db.append_usage(&event_at("user_1", Service::Books, UsageCategory::Text, now))
        .await
        .expect("append");
    db.append_usage(&event_at("user_1", Service::Books, UsageCategory::Image, now))
        .await
        .expect("append");
    db.append_usage(&event_at("user_1", Service::Ads, UsageCategory::Text, now))
        .await
        .expect("append");
    db.append_usage(&event_at("user_2", Service::Books, UsageCategory::Text, now))
        .await
        .expect("append");

    let count = db
        .count_usage("user_1", Service::Books, UsageCategory::Text, Some(window_start))
        .await
        .expect("count");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_total_count_spans_categories_but_not_content_creation() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = noon();
    let window_start = day_window_start(now, 0);

    for category in [
        UsageCategory::Text,
        UsageCategory::Image,
        UsageCategory::PremiumCredit,
        UsageCategory::StandardCredit,
        UsageCategory::ContentCreation,
    ] {
        db.append_usage(&event_at("user_1", Service::Books, category, now))
            .await
            .expect("append");
    }

    let total = db
        .count_usage_total("user_1", Service::Books, window_start)
        .await
        .expect("count");
    assert_eq!(total, 4);
}

#[tokio::test]
async fn test_usage_report_groups_by_day_and_route() {
    let db = DuckDbBackend::open_in_memory().expect("db");
    let now = noon();

    db.append_usage(&event_at("user_1", Service::Books, UsageCategory::Text, now))
        .await
        .expect("append");
    db.append_usage(&event_at("user_2", Service::Books, UsageCategory::Text, now))
        .await
        .expect("append");
    db.append_usage(&event_at(
        "user_1",
        Service::Books,
        UsageCategory::Text,
        now - Duration::days(1),
    ))
    .await
    .expect("append");

    let report = db
        .usage_report(&UsageReportFilter {
            service: Some(Service::Books),
            start_date: (now - Duration::days(1)).date_naive(),
            end_date: now.date_naive(),
        })
        .await
        .expect("report");

    assert_eq!(report.len(), 2);
    assert_eq!(report[0].day, "2025-06-14");
    assert_eq!(report[0].calls, 1);
    assert_eq!(report[1].day, "2025-06-15");
    assert_eq!(report[1].calls, 2);
    assert_eq!(report[1].input_tokens, 1000);
    assert_eq!(report[1].output_tokens, 2400);

    // Date range filters rows out.
    let today_only = db
        .usage_report(&UsageReportFilter {
            service: Some(Service::Books),
            start_date: now.date_naive(),
            end_date: now.date_naive(),
        })
        .await
        .expect("report");
    assert_eq!(today_only.len(), 1);
    assert_eq!(today_only[0].calls, 2);
}
