//! Integration tests for analytics over a seeded durable log.

use std::sync::Arc;

use askdb_core::Database;
use askdb_core::analytics::AnalyticsAggregator;
use askdb_core::models::{QueryRecord, WidgetType};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

fn temp_db_path() -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let filename = format!("askdb-test-{}.db", Uuid::new_v4());
    path.push(filename);
    path
}

async fn open_aggregator() -> (Arc<Database>, AnalyticsAggregator) {
    let db = Arc::new(Database::open(&temp_db_path()).await.expect("open db"));
    let aggregator = AnalyticsAggregator::new(db.clone());
    (db, aggregator)
}

fn record(created_at: DateTime<Utc>) -> QueryRecord {
    QueryRecord {
        id: Uuid::new_v4().to_string(),
        session_id: "sess-1".to_string(),
        user_id: None,
        question: "question".to_string(),
        sql: "SELECT 1".to_string(),
        tables: Vec::new(),
        row_count: 0,
        execution_time_ms: 100.0,
        success: true,
        error_message: None,
        widget_type: WidgetType::Default,
        is_favorite: false,
        favorite_name: None,
        tags: Vec::new(),
        created_at,
    }
}

// ============================================================================
// Summary
// ============================================================================

#[tokio::test]
async fn summary_computes_success_rate_and_averages() {
    let (db, aggregator) = open_aggregator().await;
    let now = Utc::now();

    for _ in 0..8 {
        db.insert_query(&record(now)).await.expect("insert");
    }
    for _ in 0..2 {
        db.insert_query(&QueryRecord {
            success: false,
            error_message: Some("timeout".to_string()),
            execution_time_ms: 5000.0,
            ..record(now)
        })
        .await
        .expect("insert");
    }

    let summary = aggregator.summary(24, None).await.expect("summary");
    assert_eq!(summary.period_hours, 24);
    assert_eq!(summary.total_queries, 10);
    assert_eq!(summary.successful_queries, 8);
    assert_eq!(summary.failed_queries, 2);
    assert!((summary.success_rate - 80.0).abs() < f64::EPSILON);
    // Failed runs do not skew the average.
    assert!((summary.avg_execution_time_ms - 100.0).abs() < f64::EPSILON);
    assert_eq!(summary.unique_sessions, 1);
    assert_eq!(summary.unique_users, 0);
}

#[tokio::test]
async fn summary_over_empty_window_is_all_zeroes() {
    let (_db, aggregator) = open_aggregator().await;

    let summary = aggregator.summary(24, None).await.expect("summary");
    assert_eq!(summary.total_queries, 0);
    assert!((summary.success_rate - 0.0).abs() < f64::EPSILON);
    assert!((summary.avg_execution_time_ms - 0.0).abs() < f64::EPSILON);
    assert!(summary.widget_breakdown.is_empty());
    assert!(summary.top_tables.is_empty());
}

#[tokio::test]
async fn summary_excludes_records_outside_the_window() {
    let (db, aggregator) = open_aggregator().await;
    let now = Utc::now();

    db.insert_query(&record(now)).await.expect("insert");
    db.insert_query(&record(now - Duration::hours(30)))
        .await
        .expect("insert");

    let summary = aggregator.summary(24, None).await.expect("summary");
    assert_eq!(summary.total_queries, 1);

    // Oversized windows clamp to seven days and still see the old record.
    let wide = aggregator.summary(10_000, None).await.expect("summary");
    assert_eq!(wide.period_hours, 168);
    assert_eq!(wide.total_queries, 2);
}

#[tokio::test]
async fn widget_filter_narrows_totals_but_not_the_breakdown() {
    let (db, aggregator) = open_aggregator().await;
    let now = Utc::now();

    for _ in 0..2 {
        db.insert_query(&record(now)).await.expect("insert");
    }
    db.insert_query(&QueryRecord {
        widget_type: WidgetType::Auth,
        user_id: Some("alice".to_string()),
        ..record(now)
    })
    .await
    .expect("insert");

    let auth_only = aggregator
        .summary(24, Some(WidgetType::Auth))
        .await
        .expect("summary");
    assert_eq!(auth_only.total_queries, 1);
    assert_eq!(auth_only.unique_users, 1);
    assert_eq!(auth_only.widget_breakdown.get("default"), Some(&2));
    assert_eq!(auth_only.widget_breakdown.get("auth"), Some(&1));
}

#[tokio::test]
async fn top_tables_count_successful_queries_only() {
    let (db, aggregator) = open_aggregator().await;
    let now = Utc::now();

    for _ in 0..3 {
        db.insert_query(&QueryRecord {
            tables: vec!["orders".to_string()],
            ..record(now)
        })
        .await
        .expect("insert");
    }
    db.insert_query(&QueryRecord {
        tables: vec!["users".to_string()],
        ..record(now)
    })
    .await
    .expect("insert");
    db.insert_query(&QueryRecord {
        tables: vec!["orders".to_string()],
        success: false,
        ..record(now)
    })
    .await
    .expect("insert");

    let summary = aggregator.summary(24, None).await.expect("summary");
    assert_eq!(summary.top_tables.len(), 2);
    assert_eq!(summary.top_tables[0].table, "orders");
    assert_eq!(summary.top_tables[0].count, 3);
    assert_eq!(summary.top_tables[1].table, "users");
    assert_eq!(summary.top_tables[1].count, 1);
}

// ============================================================================
// Hourly buckets
// ============================================================================

#[tokio::test]
async fn hourly_stats_bucket_by_hour_in_ascending_order() {
    let (db, aggregator) = open_aggregator().await;
    let now = Utc::now();

    // Two records two hours ago (one failed), one an hour ago.
    db.insert_query(&QueryRecord {
        execution_time_ms: 100.0,
        ..record(now - Duration::hours(2))
    })
    .await
    .expect("insert");
    db.insert_query(&QueryRecord {
        success: false,
        execution_time_ms: 300.0,
        ..record(now - Duration::hours(2))
    })
    .await
    .expect("insert");
    db.insert_query(&record(now - Duration::hours(1)))
        .await
        .expect("insert");

    let buckets = aggregator.hourly_stats(24).await.expect("hourly");
    assert_eq!(buckets.len(), 2);
    assert!(buckets[0].hour < buckets[1].hour);
    assert_eq!(buckets[0].total, 2);
    assert_eq!(buckets[0].successful, 1);
    assert!((buckets[0].avg_time - 200.0).abs() < f64::EPSILON);
    assert_eq!(buckets[1].total, 1);
    assert!(buckets[0].hour.ends_with(":00:00"));
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn error_breakdown_groups_and_orders_by_count() {
    let (db, aggregator) = open_aggregator().await;
    let now = Utc::now();

    for _ in 0..3 {
        db.insert_query(&QueryRecord {
            success: false,
            error_message: Some("timeout".to_string()),
            ..record(now)
        })
        .await
        .expect("insert");
    }
    db.insert_query(&QueryRecord {
        success: false,
        error_message: Some("syntax error".to_string()),
        ..record(now)
    })
    .await
    .expect("insert");
    db.insert_query(&QueryRecord {
        success: false,
        error_message: None,
        ..record(now)
    })
    .await
    .expect("insert");
    db.insert_query(&record(now)).await.expect("insert");

    let breakdown = aggregator.error_breakdown(24).await.expect("errors");
    assert_eq!(breakdown.total_errors, 5);
    assert_eq!(breakdown.error_types[0].error, "timeout");
    assert_eq!(breakdown.error_types[0].count, 3);
    assert!(
        breakdown
            .error_types
            .iter()
            .any(|e| e.error == "unknown" && e.count == 1)
    );
}

#[tokio::test]
async fn error_total_counts_failures_beyond_the_top_ten() {
    let (db, aggregator) = open_aggregator().await;
    let now = Utc::now();

    for i in 0..12 {
        db.insert_query(&QueryRecord {
            success: false,
            error_message: Some(format!("error variant {i}")),
            ..record(now)
        })
        .await
        .expect("insert");
    }

    let breakdown = aggregator.error_breakdown(24).await.expect("errors");
    assert_eq!(breakdown.total_errors, 12);
    assert_eq!(breakdown.error_types.len(), 10);
}

// ============================================================================
// Performance
// ============================================================================

#[tokio::test]
async fn performance_buckets_and_percentiles() {
    let (db, aggregator) = open_aggregator().await;
    let now = Utc::now();

    for time in [50.0, 90.0, 150.0, 700.0, 1200.0] {
        db.insert_query(&QueryRecord {
            execution_time_ms: time,
            ..record(now)
        })
        .await
        .expect("insert");
    }
    // Failed runs are excluded entirely.
    db.insert_query(&QueryRecord {
        success: false,
        execution_time_ms: 9999.0,
        ..record(now)
    })
    .await
    .expect("insert");

    let perf = aggregator.performance(24).await.expect("performance");
    assert_eq!(perf.response_time_buckets.under_100ms, 2);
    assert_eq!(perf.response_time_buckets.from_100_to_500ms, 1);
    assert_eq!(perf.response_time_buckets.from_500_to_1000ms, 1);
    assert_eq!(perf.response_time_buckets.over_1000ms, 1);
    assert!((perf.median_time_ms - 150.0).abs() < f64::EPSILON);
    assert!((perf.avg_time_ms - 438.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn performance_over_empty_window_is_zeroed() {
    let (_db, aggregator) = open_aggregator().await;

    let perf = aggregator.performance(24).await.expect("performance");
    assert_eq!(perf.response_time_buckets.under_100ms, 0);
    assert!((perf.median_time_ms - 0.0).abs() < f64::EPSILON);
    assert!((perf.p99_time_ms - 0.0).abs() < f64::EPSILON);
}

// ============================================================================
// Top users
// ============================================================================

#[tokio::test]
async fn top_users_cover_the_auth_surface_only() {
    let (db, aggregator) = open_aggregator().await;
    let now = Utc::now();

    // alice: three auth queries, one failed.
    for success in [true, true, false] {
        db.insert_query(&QueryRecord {
            widget_type: WidgetType::Auth,
            user_id: Some("alice".to_string()),
            success,
            execution_time_ms: 200.0,
            ..record(now)
        })
        .await
        .expect("insert");
    }
    // bob: one auth query.
    db.insert_query(&QueryRecord {
        widget_type: WidgetType::Auth,
        user_id: Some("bob".to_string()),
        ..record(now)
    })
    .await
    .expect("insert");
    // Default-widget traffic never shows up here.
    db.insert_query(&QueryRecord {
        user_id: Some("carol".to_string()),
        ..record(now)
    })
    .await
    .expect("insert");

    let users = aggregator.top_users(24, 10).await.expect("top users");
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].user_id, "alice");
    assert_eq!(users[0].query_count, 3);
    assert!((users[0].success_rate - 66.67).abs() < f64::EPSILON);
    assert!((users[0].avg_time_ms - 200.0).abs() < f64::EPSILON);
    assert_eq!(users[1].user_id, "bob");

    let limited = aggregator.top_users(24, 1).await.expect("top users");
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].user_id, "alice");
}

// ============================================================================
// Complexity
// ============================================================================

#[tokio::test]
async fn complexity_report_classifies_successful_sql() {
    let (db, aggregator) = open_aggregator().await;
    let now = Utc::now();

    let samples = [
        "SELECT * FROM users",
        "SELECT id FROM orders WHERE total > 10",
        "SELECT u.name FROM users u JOIN orders o ON o.user_id = u.id",
        "SELECT a.x FROM a JOIN b ON a.id = b.a JOIN c ON b.id = c.b JOIN d ON c.id = d.c",
    ];
    for sql in samples {
        db.insert_query(&QueryRecord {
            sql: sql.to_string(),
            ..record(now)
        })
        .await
        .expect("insert");
    }

    let report = aggregator.query_complexity(24).await.expect("complexity");
    assert_eq!(report.total_queries, 4);
    assert_eq!(report.complexity_breakdown.simple, 2);
    assert_eq!(report.complexity_breakdown.medium, 1);
    assert_eq!(report.complexity_breakdown.complex, 1);
    assert!((report.complexity_percentages.simple - 50.0).abs() < f64::EPSILON);
    assert!((report.complexity_percentages.medium - 25.0).abs() < f64::EPSILON);
    assert!((report.complexity_percentages.complex - 25.0).abs() < f64::EPSILON);
}

// ============================================================================
// Comparison and health
// ============================================================================

#[tokio::test]
async fn widget_comparison_splits_by_surface() {
    let (db, aggregator) = open_aggregator().await;
    let now = Utc::now();

    for _ in 0..3 {
        db.insert_query(&record(now)).await.expect("insert");
    }
    db.insert_query(&QueryRecord {
        widget_type: WidgetType::Auth,
        ..record(now)
    })
    .await
    .expect("insert");

    let comparison = aggregator.widget_comparison(24).await.expect("comparison");
    assert_eq!(comparison.period_hours, 24);
    assert_eq!(comparison.default.total_queries, 3);
    assert_eq!(comparison.auth.total_queries, 1);
}

#[tokio::test]
async fn health_reports_log_extent() {
    let (db, aggregator) = open_aggregator().await;
    let now = Utc::now();

    db.insert_query(&record(now - Duration::hours(5)))
        .await
        .expect("insert");
    db.insert_query(&record(now)).await.expect("insert");

    let stats = aggregator.health().await.expect("health");
    assert_eq!(stats.total, 2);
    let oldest = stats.oldest.expect("oldest");
    let newest = stats.newest.expect("newest");
    assert!(oldest < newest);
}
