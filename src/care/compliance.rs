// ABOUTME: Medication adherence over a window, per-day series and week-over-week trend
// ABOUTME: Past doses without a log count as missed; skipped doses leave the denominator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Compliance
//!
//! `adherence = (taken + late) / (expected - skipped)`, where `expected`
//! counts every scheduled dose that is either logged or already past its due
//! window. Doses still inside or before their window are reported as pending
//! and do not affect the percentage.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::care::tasks::scheduled_instants;
use crate::constants::compliance::{TREND_PERIOD_DAYS, TREND_THRESHOLD_POINTS};
use crate::constants::doses::DUE_WINDOW_MINUTES;
use crate::models::{DoseLog, DoseStatus, RegimenItem};

/// Dose counts and the resulting adherence
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdherenceSummary {
    /// Settled doses (logged or past due)
    pub expected: u32,
    /// Taken on time
    pub taken: u32,
    /// Taken late
    pub late: u32,
    /// Logged missed, or past due without a log
    pub missed: u32,
    /// Deliberately skipped
    pub skipped: u32,
    /// Not yet due and not logged
    pub pending: u32,
    /// Percentage, absent when nothing counts toward it
    pub adherence_percent: Option<f64>,
}

impl AdherenceSummary {
    fn record(&mut self, status: Option<DoseStatus>) {
        match status {
            Some(DoseStatus::Taken) => self.taken += 1,
            Some(DoseStatus::Late) => self.late += 1,
            Some(DoseStatus::Missed) | None => self.missed += 1,
            Some(DoseStatus::Skipped) => self.skipped += 1,
        }
        self.expected += 1;
    }

    fn finish(mut self) -> Self {
        let denominator = self.expected.saturating_sub(self.skipped);
        self.adherence_percent = (denominator > 0).then(|| {
            let percent = f64::from(self.taken + self.late) * 100.0 / f64::from(denominator);
            (percent * 10.0).round() / 10.0
        });
        self
    }
}

/// Adherence for one elder-local day
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAdherence {
    /// Elder-local date
    pub date: NaiveDate,
    /// Counts for the day
    #[serde(flatten)]
    pub summary: AdherenceSummary,
}

/// Direction of adherence between two periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// Up by at least the threshold
    Improving,
    /// Down by at least the threshold
    Declining,
    /// Within the threshold
    Stable,
    /// One period has no countable doses
    InsufficientData,
}

/// Last period compared with the one before it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    /// Direction
    pub direction: TrendDirection,
    /// Adherence over the most recent period
    pub current_percent: Option<f64>,
    /// Adherence over the preceding period
    pub previous_percent: Option<f64>,
    /// Percentage-point change
    pub change_points: Option<f64>,
}

/// Complete compliance response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    /// First day of the window
    pub from: NaiveDate,
    /// Last day of the window
    pub to: NaiveDate,
    /// Whole-window counts
    pub overall: AdherenceSummary,
    /// Per-day counts
    pub daily: Vec<DailyAdherence>,
    /// Period-over-period trend
    pub trend: Trend,
}

fn summarize_days(
    items: &[RegimenItem],
    logs: &HashMap<(Uuid, DateTime<Utc>), DoseStatus>,
    offset: FixedOffset,
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<DailyAdherence> {
    let window = Duration::minutes(DUE_WINDOW_MINUTES);
    from.iter_days()
        .take_while(|day| *day <= to)
        .map(|day| {
            let mut summary = AdherenceSummary::default();
            for item in items {
                for scheduled_for in scheduled_instants(item, offset, day) {
                    match logs.get(&(item.id, scheduled_for)) {
                        Some(status) => summary.record(Some(*status)),
                        None if scheduled_for + window < now => summary.record(None),
                        None => summary.pending += 1,
                    }
                }
            }
            DailyAdherence {
                date: day,
                summary: summary.finish(),
            }
        })
        .collect()
}

fn total(days: &[DailyAdherence]) -> AdherenceSummary {
    days.iter()
        .fold(AdherenceSummary::default(), |mut acc, day| {
            acc.expected += day.summary.expected;
            acc.taken += day.summary.taken;
            acc.late += day.summary.late;
            acc.missed += day.summary.missed;
            acc.skipped += day.summary.skipped;
            acc.pending += day.summary.pending;
            acc
        })
        .finish()
}

fn index_logs(logs: &[DoseLog]) -> HashMap<(Uuid, DateTime<Utc>), DoseStatus> {
    logs.iter()
        .map(|log| ((log.item_id, log.scheduled_for), log.status))
        .collect()
}

/// Classify the change between two adherence percentages
#[must_use]
pub fn trend_between(current: Option<f64>, previous: Option<f64>) -> Trend {
    let (direction, change) = match (current, previous) {
        (Some(current), Some(previous)) => {
            let change = ((current - previous) * 10.0).round() / 10.0;
            let direction = if change >= TREND_THRESHOLD_POINTS {
                TrendDirection::Improving
            } else if change <= -TREND_THRESHOLD_POINTS {
                TrendDirection::Declining
            } else {
                TrendDirection::Stable
            };
            (direction, Some(change))
        }
        _ => (TrendDirection::InsufficientData, None),
    };
    Trend {
        direction,
        current_percent: current,
        previous_percent: previous,
        change_points: change,
    }
}

/// Adherence over `from..=to` plus the trend ending on `today`
///
/// `logs` must cover both the window and the two trend periods.
#[must_use]
pub fn compute(
    items: &[RegimenItem],
    logs: &[DoseLog],
    offset: FixedOffset,
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> ComplianceReport {
    let index = index_logs(logs);
    let daily = summarize_days(items, &index, offset, from, to, now);
    let overall = total(&daily);

    let period = Duration::days(TREND_PERIOD_DAYS);
    let current_start = today - period + Duration::days(1);
    let previous_start = current_start - period;
    let current = total(&summarize_days(items, &index, offset, current_start, today, now));
    let previous = total(&summarize_days(
        items,
        &index,
        offset,
        previous_start,
        current_start - Duration::days(1),
        now,
    ));

    ComplianceReport {
        from,
        to,
        overall,
        daily,
        trend: trend_between(current.adherence_percent, previous.adherence_percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::care::tasks::to_utc;
    use crate::models::RegimenKind;
    use chrono::{NaiveTime, TimeZone};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn daily_item(start: NaiveDate) -> RegimenItem {
        RegimenItem {
            id: Uuid::new_v4(),
            elder_id: Uuid::nil(),
            kind: RegimenKind::Medication,
            name: "Metformin".to_owned(),
            dosage: "500mg".to_owned(),
            frequency: vec![NaiveTime::from_hms_opt(8, 0, 0).unwrap()],
            start_date: start,
            end_date: None,
            instructions: None,
            created_by: Uuid::nil(),
            created_at: Utc::now(),
        }
    }

    fn log(item: &RegimenItem, day: NaiveDate, status: DoseStatus) -> DoseLog {
        let scheduled_for = to_utc(utc(), day, item.frequency[0]);
        DoseLog {
            id: Uuid::new_v4(),
            item_id: item.id,
            elder_id: Uuid::nil(),
            scheduled_for,
            status,
            logged_at: scheduled_for,
            logged_by: Uuid::nil(),
            notes: None,
        }
    }

    #[test]
    fn unlogged_past_doses_are_missed_and_skips_leave_denominator() {
        let start = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let item = daily_item(start);
        let day = |n: u64| start.checked_add_days(chrono::Days::new(n)).unwrap();
        let logs = vec![
            log(&item, day(0), DoseStatus::Taken),
            log(&item, day(1), DoseStatus::Late),
            log(&item, day(2), DoseStatus::Skipped),
        ];
        // day 3 unlogged and past, day 4 still pending at 07:00
        let now = Utc.with_ymd_and_hms(2025, 6, 5, 7, 0, 0).unwrap();
        let report = compute(&[item], &logs, utc(), day(0), day(4), day(4), now);

        assert_eq!(report.overall.expected, 4);
        assert_eq!(report.overall.missed, 1);
        assert_eq!(report.overall.skipped, 1);
        assert_eq!(report.overall.pending, 1);
        // (1 taken + 1 late) / (4 - 1 skipped)
        assert_eq!(report.overall.adherence_percent, Some(66.7));
        assert_eq!(report.daily.len(), 5);
        assert_eq!(report.daily[4].summary.adherence_percent, None);
    }

    #[test]
    fn trend_threshold() {
        assert_eq!(trend_between(Some(90.0), Some(80.0)).direction, TrendDirection::Improving);
        assert_eq!(trend_between(Some(80.0), Some(90.0)).direction, TrendDirection::Declining);
        assert_eq!(trend_between(Some(84.0), Some(80.0)).direction, TrendDirection::Stable);
        assert_eq!(trend_between(Some(85.0), Some(80.0)).direction, TrendDirection::Improving);
        assert_eq!(trend_between(None, Some(80.0)).direction, TrendDirection::InsufficientData);
    }

    #[test]
    fn trend_compares_last_two_weeks() {
        let start = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let item = daily_item(start);
        let day = |n: u64| start.checked_add_days(chrono::Days::new(n)).unwrap();
        // previous week: all missed (no logs); current week: all taken
        let logs: Vec<_> = (7..14).map(|n| log(&item, day(n), DoseStatus::Taken)).collect();
        let now = Utc.with_ymd_and_hms(2025, 6, 14, 23, 0, 0).unwrap();
        let report = compute(&[item], &logs, utc(), day(7), day(13), day(13), now);
        assert_eq!(report.trend.current_percent, Some(100.0));
        assert_eq!(report.trend.previous_percent, Some(0.0));
        assert_eq!(report.trend.direction, TrendDirection::Improving);
    }
}
