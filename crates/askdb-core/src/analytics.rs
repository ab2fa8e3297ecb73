//! Read-only analytics views derived from the durable query log.

use crate::db::{Database, LogStats};
use crate::error::Result;
use crate::models::{QueryRecord, WidgetType};
use chrono::{Duration, Timelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Largest window callers may ask for: 7 days.
const MAX_WINDOW_HOURS: i64 = 168;

/// Aggregates summaries, time series, percentiles, and heuristics over the
/// durable log. Never mutates; empty windows yield zeroed results.
pub struct AnalyticsAggregator {
    db: Arc<Database>,
}

impl AnalyticsAggregator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Dashboard summary over the trailing window.
    pub async fn summary(&self, hours: i64, widget_type: Option<WidgetType>) -> Result<Summary> {
        let hours = clamp_hours(hours);
        let cutoff = Utc::now() - Duration::hours(hours);
        let records = self.db.records_since(cutoff, widget_type).await?;

        // The per-widget breakdown always spans every widget type, even
        // when the rest of the summary is filtered.
        let widget_breakdown = if widget_type.is_some() {
            let all = self.db.records_since(cutoff, None).await?;
            widget_counts(&all)
        } else {
            widget_counts(&records)
        };

        let total = records.len();
        let successful = records.iter().filter(|r| r.success).count();
        let failed = total - successful;

        let success_times: Vec<f64> = records
            .iter()
            .filter(|r| r.success)
            .map(|r| r.execution_time_ms)
            .collect();
        let avg_time = if success_times.is_empty() {
            0.0
        } else {
            success_times.iter().sum::<f64>() / success_times.len() as f64
        };

        let unique_sessions = records
            .iter()
            .map(|r| r.session_id.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();
        let unique_users = records
            .iter()
            .filter_map(|r| r.user_id.as_deref())
            .collect::<std::collections::HashSet<_>>()
            .len();

        Ok(Summary {
            period_hours: hours,
            total_queries: total,
            successful_queries: successful,
            failed_queries: failed,
            success_rate: rate(successful, total),
            avg_execution_time_ms: round2(avg_time),
            unique_sessions,
            unique_users,
            widget_breakdown,
            top_tables: top_tables(records.iter().filter(|r| r.success)),
        })
    }

    /// Query volume bucketed by hour, ascending chronological order.
    pub async fn hourly_stats(&self, hours: i64) -> Result<Vec<HourlyBucket>> {
        let hours = clamp_hours(hours);
        let cutoff = Utc::now() - Duration::hours(hours);
        let records = self.db.records_since(cutoff, None).await?;

        let mut buckets: BTreeMap<String, (usize, usize, f64)> = BTreeMap::new();
        for record in &records {
            let hour = record
                .created_at
                .with_minute(0)
                .and_then(|dt| dt.with_second(0))
                .and_then(|dt| dt.with_nanosecond(0))
                .unwrap_or(record.created_at);
            let key = hour.format("%Y-%m-%d %H:00:00").to_string();
            let entry = buckets.entry(key).or_insert((0, 0, 0.0));
            entry.0 += 1;
            if record.success {
                entry.1 += 1;
            }
            entry.2 += record.execution_time_ms;
        }

        Ok(buckets
            .into_iter()
            .map(|(hour, (total, successful, time_sum))| HourlyBucket {
                hour,
                total,
                successful,
                avg_time: round2(time_sum / total as f64),
            })
            .collect())
    }

    /// Failed queries grouped by error message, top 10 by count.
    pub async fn error_breakdown(&self, hours: i64) -> Result<ErrorBreakdown> {
        let hours = clamp_hours(hours);
        let cutoff = Utc::now() - Duration::hours(hours);
        let records = self.db.records_since(cutoff, None).await?;

        let mut counts: Vec<(String, usize)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for record in records.iter().filter(|r| !r.success) {
            let error = record
                .error_message
                .clone()
                .unwrap_or_else(|| "unknown".to_string());
            match index.get(&error) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(error.clone(), counts.len());
                    counts.push((error, 1));
                }
            }
        }

        // Count every failure before the top-10 cut, or rare messages
        // would vanish from the total.
        let total_errors = counts.iter().map(|(_, count)| count).sum();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(10);

        Ok(ErrorBreakdown {
            period_hours: hours,
            total_errors,
            error_types: counts
                .into_iter()
                .map(|(error, count)| ErrorCount { error, count })
                .collect(),
        })
    }

    /// Response-time distribution over successful queries.
    pub async fn performance(&self, hours: i64) -> Result<PerformanceMetrics> {
        let hours = clamp_hours(hours);
        let cutoff = Utc::now() - Duration::hours(hours);
        let records = self.db.records_since(cutoff, None).await?;

        let mut times: Vec<f64> = records
            .iter()
            .filter(|r| r.success)
            .map(|r| r.execution_time_ms)
            .collect();
        times.sort_by(f64::total_cmp);

        if times.is_empty() {
            return Ok(PerformanceMetrics::default());
        }

        let buckets = TimeBuckets {
            under_100ms: times.iter().filter(|&&t| t < 100.0).count(),
            from_100_to_500ms: times.iter().filter(|&&t| (100.0..500.0).contains(&t)).count(),
            from_500_to_1000ms: times.iter().filter(|&&t| (500.0..1000.0).contains(&t)).count(),
            over_1000ms: times.iter().filter(|&&t| t >= 1000.0).count(),
        };

        Ok(PerformanceMetrics {
            response_time_buckets: buckets,
            avg_time_ms: round2(times.iter().sum::<f64>() / times.len() as f64),
            median_time_ms: round2(percentile(&times, 50.0)),
            p95_time_ms: round2(percentile(&times, 95.0)),
            p99_time_ms: round2(percentile(&times, 99.0)),
        })
    }

    /// Heaviest users on the auth surface, ordered by query count.
    pub async fn top_users(&self, hours: i64, limit: usize) -> Result<Vec<TopUser>> {
        let hours = clamp_hours(hours);
        let cutoff = Utc::now() - Duration::hours(hours);
        let records = self.db.records_since(cutoff, Some(WidgetType::Auth)).await?;

        let mut grouped: Vec<(String, Vec<&QueryRecord>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for record in &records {
            let Some(user_id) = record.user_id.as_deref() else {
                continue;
            };
            match index.get(user_id) {
                Some(&i) => grouped[i].1.push(record),
                None => {
                    index.insert(user_id.to_string(), grouped.len());
                    grouped.push((user_id.to_string(), vec![record]));
                }
            }
        }

        let mut users: Vec<TopUser> = grouped
            .into_iter()
            .map(|(user_id, records)| {
                let total = records.len();
                let successful: Vec<&&QueryRecord> =
                    records.iter().filter(|r| r.success).collect();
                let avg_time = if successful.is_empty() {
                    0.0
                } else {
                    successful.iter().map(|r| r.execution_time_ms).sum::<f64>()
                        / successful.len() as f64
                };
                TopUser {
                    user_id,
                    query_count: total,
                    success_rate: rate(successful.len(), total),
                    avg_time_ms: round2(avg_time),
                }
            })
            .collect();

        users.sort_by(|a, b| b.query_count.cmp(&a.query_count));
        users.truncate(limit);
        Ok(users)
    }

    /// SQL complexity heuristic over successful queries in the window.
    pub async fn query_complexity(&self, hours: i64) -> Result<ComplexityReport> {
        let hours = clamp_hours(hours);
        let cutoff = Utc::now() - Duration::hours(hours);
        let records = self.db.records_since(cutoff, None).await?;

        let mut counts = ComplexityCounts::default();
        for record in records.iter().filter(|r| r.success) {
            match classify_sql(&record.sql) {
                Complexity::Simple => counts.simple += 1,
                Complexity::Medium => counts.medium += 1,
                Complexity::Complex => counts.complex += 1,
            }
        }

        let total = counts.simple + counts.medium + counts.complex;
        Ok(ComplexityReport {
            period_hours: hours,
            total_queries: total,
            complexity_percentages: ComplexityPercentages {
                simple: rate(counts.simple, total),
                medium: rate(counts.medium, total),
                complex: rate(counts.complex, total),
            },
            complexity_breakdown: counts,
        })
    }

    /// Default vs auth surface, side by side.
    pub async fn widget_comparison(&self, hours: i64) -> Result<WidgetComparison> {
        Ok(WidgetComparison {
            period_hours: clamp_hours(hours),
            default: self.summary(hours, Some(WidgetType::Default)).await?,
            auth: self.summary(hours, Some(WidgetType::Auth)).await?,
        })
    }

    /// Reachability and extent of the underlying log.
    pub async fn health(&self) -> Result<LogStats> {
        self.db.stats().await
    }
}

/// Dashboard summary.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub period_hours: i64,
    pub total_queries: usize,
    pub successful_queries: usize,
    pub failed_queries: usize,
    pub success_rate: f64,
    pub avg_execution_time_ms: f64,
    pub unique_sessions: usize,
    pub unique_users: usize,
    pub widget_breakdown: BTreeMap<String, usize>,
    pub top_tables: Vec<TableCount>,
}

/// One table with its usage count.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TableCount {
    pub table: String,
    pub count: usize,
}

/// One hour bucket of query volume.
#[derive(Debug, Clone, Serialize)]
pub struct HourlyBucket {
    pub hour: String,
    pub total: usize,
    pub successful: usize,
    pub avg_time: f64,
}

/// Failed queries grouped by message.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBreakdown {
    pub period_hours: i64,
    pub total_errors: usize,
    pub error_types: Vec<ErrorCount>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorCount {
    pub error: String,
    pub count: usize,
}

/// Response-time distribution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceMetrics {
    pub response_time_buckets: TimeBuckets,
    pub avg_time_ms: f64,
    pub median_time_ms: f64,
    pub p95_time_ms: f64,
    pub p99_time_ms: f64,
}

/// Fixed response-time buckets.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimeBuckets {
    #[serde(rename = "0-100ms")]
    pub under_100ms: usize,
    #[serde(rename = "100-500ms")]
    pub from_100_to_500ms: usize,
    #[serde(rename = "500-1000ms")]
    pub from_500_to_1000ms: usize,
    #[serde(rename = "1000ms+")]
    pub over_1000ms: usize,
}

/// One user's aggregate on the auth surface.
#[derive(Debug, Clone, Serialize)]
pub struct TopUser {
    pub user_id: String,
    pub query_count: usize,
    pub success_rate: f64,
    pub avg_time_ms: f64,
}

/// Complexity classification report.
#[derive(Debug, Clone, Serialize)]
pub struct ComplexityReport {
    pub period_hours: i64,
    pub total_queries: usize,
    pub complexity_breakdown: ComplexityCounts,
    pub complexity_percentages: ComplexityPercentages,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplexityCounts {
    pub simple: usize,
    pub medium: usize,
    pub complex: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplexityPercentages {
    pub simple: f64,
    pub medium: f64,
    pub complex: f64,
}

/// Default vs auth surface comparison.
#[derive(Debug, Clone, Serialize)]
pub struct WidgetComparison {
    pub period_hours: i64,
    pub default: Summary,
    pub auth: Summary,
}

/// SQL complexity classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

/// Classify SQL by join count, subqueries, and aggregation clauses.
pub fn classify_sql(sql: &str) -> Complexity {
    let upper = sql.to_uppercase();
    let join_count = upper.matches(" JOIN ").count();
    let has_subquery = upper
        .split_once('(')
        .is_some_and(|(_, rest)| rest.contains("SELECT"));
    let has_group_by = upper.contains("GROUP BY");
    let has_having = upper.contains("HAVING");

    if join_count >= 3 || has_subquery || (has_group_by && has_having) {
        Complexity::Complex
    } else if join_count >= 1 || has_group_by {
        Complexity::Medium
    } else {
        Complexity::Simple
    }
}

/// Linear interpolation between order statistics. `data` must be sorted
/// ascending.
pub fn percentile(data: &[f64], p: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let k = (data.len() - 1) as f64 * p / 100.0;
    let f = k.floor() as usize;
    let c = (f + 1).min(data.len() - 1);
    data[f] + (k - f as f64) * (data[c] - data[f])
}

fn clamp_hours(hours: i64) -> i64 {
    hours.clamp(1, MAX_WINDOW_HOURS)
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn widget_counts(records: &[QueryRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.widget_type.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Top 10 tables by frequency, ties broken by first-seen order.
fn top_tables<'a>(records: impl Iterator<Item = &'a QueryRecord>) -> Vec<TableCount> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in records {
        for table in &record.tables {
            match index.get(table) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(table.clone(), counts.len());
                    counts.push((table.clone(), 1));
                }
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(10);
    counts
        .into_iter()
        .map(|(table, count)| TableCount { table, count })
        .collect()
}

#[cfg(test)]
#[path = "analytics_tests.rs"]
mod tests;
