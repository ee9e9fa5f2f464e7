// ABOUTME: Expands regimen schedules into dated doses and buckets them by urgency
// ABOUTME: Overdue before due-now before upcoming, then by scheduled time, with a stable sort
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

//! # Task priority engine
//!
//! Tasks are recomputed on every request from the regimen and the dose logs;
//! nothing here is persisted.

use std::collections::HashSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::constants::doses::{DUE_WINDOW_MINUTES, MILD_OVERDUE_MINUTES, MODERATE_OVERDUE_MINUTES};
use crate::models::{DoseLog, RegimenItem, RegimenKind};

/// Urgency bucket, declared from most to least urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskBucket {
    /// Past the due window
    Overdue,
    /// Inside the due window
    DueNow,
    /// Before the due window
    Upcoming,
}

/// How late an overdue dose is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverdueSeverity {
    /// Less than an hour late
    Mild,
    /// Less than four hours late
    Moderate,
    /// Four hours or more
    Severe,
}

/// One scheduled dose still waiting for a log
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueTask {
    /// Regimen item
    pub item_id: Uuid,
    /// Item name
    pub name: String,
    /// Medication or supplement
    pub kind: RegimenKind,
    /// Dosage
    pub dosage: String,
    /// Elder-local time of day
    #[serde(serialize_with = "serialize_local_time")]
    pub local_time: NaiveTime,
    /// UTC instant of the dose
    pub scheduled_for: DateTime<Utc>,
    /// Urgency bucket
    pub bucket: TaskBucket,
    /// Set for overdue doses
    pub severity: Option<OverdueSeverity>,
    /// Minutes past the scheduled time, for overdue doses
    pub minutes_late: Option<i64>,
}

fn serialize_local_time<S: serde::Serializer>(
    time: &NaiveTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&time.format("%H:%M"))
}

/// The elder-local calendar date at `now`
#[must_use]
pub fn local_date(offset: FixedOffset, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// UTC instant of an elder-local date and time
#[must_use]
pub fn to_utc(offset: FixedOffset, day: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let local = day.and_time(time);
    (local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

/// Scheduled UTC instants of `item` on an elder-local day
#[must_use]
pub fn scheduled_instants(
    item: &RegimenItem,
    offset: FixedOffset,
    day: NaiveDate,
) -> Vec<DateTime<Utc>> {
    if !item.is_active_on(day) {
        return Vec::new();
    }
    item.frequency
        .iter()
        .map(|time| to_utc(offset, day, *time))
        .collect()
}

/// Bucket and severity of a dose at `now`
#[must_use]
pub fn classify(
    scheduled_for: DateTime<Utc>,
    now: DateTime<Utc>,
) -> (TaskBucket, Option<OverdueSeverity>) {
    let window = Duration::minutes(DUE_WINDOW_MINUTES);
    if now > scheduled_for + window {
        let late = (now - scheduled_for).num_minutes();
        let severity = if late < MILD_OVERDUE_MINUTES {
            OverdueSeverity::Mild
        } else if late < MODERATE_OVERDUE_MINUTES {
            OverdueSeverity::Moderate
        } else {
            OverdueSeverity::Severe
        };
        (TaskBucket::Overdue, Some(severity))
    } else if now >= scheduled_for - window {
        (TaskBucket::DueNow, None)
    } else {
        (TaskBucket::Upcoming, None)
    }
}

/// Unlogged doses of every active item on the elder-local `day`
///
/// The result is in item order, then frequency order; pass it through
/// [`prioritize`] before presenting it.
#[must_use]
pub fn build_due_tasks(
    items: &[RegimenItem],
    logs: &[DoseLog],
    offset: FixedOffset,
    now: DateTime<Utc>,
    day: NaiveDate,
) -> Vec<DueTask> {
    let logged: HashSet<(Uuid, DateTime<Utc>)> = logs
        .iter()
        .map(|log| (log.item_id, log.scheduled_for))
        .collect();

    items
        .iter()
        .filter(|item| item.is_active_on(day))
        .flat_map(|item| {
            item.frequency
                .iter()
                .map(move |time| (item, *time, to_utc(offset, day, *time)))
        })
        .filter(|(item, _, scheduled_for)| !logged.contains(&(item.id, *scheduled_for)))
        .map(|(item, local_time, scheduled_for)| {
            let (bucket, severity) = classify(scheduled_for, now);
            DueTask {
                item_id: item.id,
                name: item.name.clone(),
                kind: item.kind,
                dosage: item.dosage.clone(),
                local_time,
                scheduled_for,
                bucket,
                severity,
                minutes_late: severity.map(|_| (now - scheduled_for).num_minutes()),
            }
        })
        .collect()
}

/// Stable sort: bucket first, then scheduled time ascending
#[must_use]
pub fn prioritize(mut tasks: Vec<DueTask>) -> Vec<DueTask> {
    tasks.sort_by(|a, b| {
        a.bucket
            .cmp(&b.bucket)
            .then_with(|| a.scheduled_for.cmp(&b.scheduled_for))
    });
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DoseStatus;
    use chrono::TimeZone;

    fn item(name: &str, times: &[&str]) -> RegimenItem {
        RegimenItem {
            id: Uuid::new_v4(),
            elder_id: Uuid::nil(),
            kind: RegimenKind::Medication,
            name: name.to_owned(),
            dosage: "10mg".to_owned(),
            frequency: times
                .iter()
                .map(|t| NaiveTime::parse_from_str(t, "%H:%M").unwrap())
                .collect(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: None,
            instructions: None,
            created_by: Uuid::nil(),
            created_at: Utc::now(),
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn classification_boundaries() {
        let scheduled = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let at = |minutes: i64| scheduled + Duration::minutes(minutes);

        assert_eq!(classify(scheduled, at(-31)).0, TaskBucket::Upcoming);
        assert_eq!(classify(scheduled, at(-30)).0, TaskBucket::DueNow);
        assert_eq!(classify(scheduled, at(30)).0, TaskBucket::DueNow);
        assert_eq!(
            classify(scheduled, at(31)),
            (TaskBucket::Overdue, Some(OverdueSeverity::Mild))
        );
        assert_eq!(classify(scheduled, at(90)).1, Some(OverdueSeverity::Moderate));
        assert_eq!(classify(scheduled, at(240)).1, Some(OverdueSeverity::Severe));
    }

    #[test]
    fn logged_doses_are_dropped_and_order_is_by_urgency() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let morning = item("Lisinopril", &["08:00", "12:10", "20:00"]);
        let noon = item("Metformin", &["11:50"]);

        let log = DoseLog {
            id: Uuid::new_v4(),
            item_id: morning.id,
            elder_id: Uuid::nil(),
            scheduled_for: Utc.with_ymd_and_hms(2025, 6, 1, 12, 10, 0).unwrap(),
            status: DoseStatus::Taken,
            logged_at: now,
            logged_by: Uuid::nil(),
            notes: None,
        };

        let tasks = prioritize(build_due_tasks(
            &[morning.clone(), noon.clone()],
            &[log],
            utc(),
            now,
            day,
        ));
        let summary: Vec<_> = tasks.iter().map(|t| (t.name.as_str(), t.bucket)).collect();
        assert_eq!(
            summary,
            vec![
                ("Lisinopril", TaskBucket::Overdue),
                ("Metformin", TaskBucket::DueNow),
                ("Lisinopril", TaskBucket::Upcoming),
            ]
        );
        assert_eq!(tasks[0].severity, Some(OverdueSeverity::Severe));
    }

    #[test]
    fn ties_keep_input_order() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 6, 0, 0).unwrap();
        let first = item("Aspirin", &["09:00"]);
        let second = item("Vitamin D", &["09:00"]);
        let tasks = prioritize(build_due_tasks(&[first, second], &[], utc(), now, day));
        assert_eq!(tasks[0].name, "Aspirin");
        assert_eq!(tasks[1].name, "Vitamin D");
    }

    #[test]
    fn local_times_respect_offset() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert_eq!(
            to_utc(offset, day, time),
            Utc.with_ymd_and_hms(2025, 6, 1, 13, 0, 0).unwrap()
        );
        let late_evening = Utc.with_ymd_and_hms(2025, 6, 2, 2, 0, 0).unwrap();
        assert_eq!(local_date(offset, late_evening), day);
    }

    #[test]
    fn inactive_items_produce_no_tasks() {
        let mut ended = item("Amoxicillin", &["08:00"]);
        ended.end_date = NaiveDate::from_ymd_opt(2025, 5, 1);
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(scheduled_instants(&ended, utc(), day).is_empty());
        assert!(build_due_tasks(&[ended], &[], utc(), Utc::now(), day).is_empty());
    }
}
