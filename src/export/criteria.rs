//! Criteria resolution
//!
//! Turns a form's export settings into the concrete entry filter and the
//! ordered column list of an [`super::ExportJob`]. Pure: the current time and
//! the local timezone are parameters.
//!
//! Date ranges are whole local days converted to UTC. `previous_week` and
//! `previous_month` start from `now` minus a fixed 7×24h / 28×24h, not from a
//! calendar boundary, so the first day drifts with the time of the run.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{EntryFilter, FieldFilter, FormSchema, META_FIELDS};

/// Which entries, by creation date, an export covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRange {
    /// Every entry
    #[default]
    All,
    /// Yesterday, local time
    PreviousDay,
    /// From the day 7×24h ago through yesterday
    PreviousWeek,
    /// From the day 28×24h ago through yesterday
    PreviousMonth,
}

/// Export settings relevant to entry selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportCriteria {
    pub range: DateRange,
    pub field_filter: Option<FieldFilter>,
}

/// Resolved query filter and column list
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    pub filter: EntryFilter,
    pub fields: Vec<String>,
}

/// Resolve settings into a filter and field list
///
/// # Arguments
/// * `criteria` - Date range mode and optional field equality filter
/// * `schema` - Form definition providing the field order
/// * `now` - Time of the run
/// * `tz` - Local timezone that day boundaries refer to
pub fn resolve(
    criteria: &ExportCriteria,
    schema: &FormSchema,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Criteria {
    let (start, end) = match day_bounds(criteria.range, now, tz) {
        Some((first, last)) => (start_of_day(first, tz), end_of_day(last, tz)),
        None => (None, None),
    };

    let filter = EntryFilter {
        start,
        end,
        field: criteria.field_filter.clone(),
        ..EntryFilter::default()
    };

    Criteria {
        filter,
        fields: export_fields(schema),
    }
}

/// Column ids of a form: declared fields with composite inputs expanded,
/// followed by the entry metadata columns
pub fn export_fields(schema: &FormSchema) -> Vec<String> {
    let mut fields = Vec::with_capacity(schema.fields.len() + META_FIELDS.len());
    for field in &schema.fields {
        if field.inputs.is_empty() {
            fields.push(field.id.clone());
        } else {
            fields.extend(field.inputs.iter().map(|input| input.id.clone()));
        }
    }
    fields.extend(META_FIELDS.iter().map(|(id, _)| (*id).to_string()));
    fields
}

/// First and last local day covered by a range
fn day_bounds(
    range: DateRange,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Option<(NaiveDate, NaiveDate)> {
    let local_now = now.with_timezone(&tz);
    let yesterday = (local_now - Duration::hours(24)).date_naive();
    let first = match range {
        DateRange::All => return None,
        DateRange::PreviousDay => yesterday,
        DateRange::PreviousWeek => (local_now - Duration::hours(7 * 24)).date_naive(),
        DateRange::PreviousMonth => (local_now - Duration::hours(28 * 24)).date_naive(),
    };
    Some((first, yesterday))
}

fn start_of_day(day: NaiveDate, tz: FixedOffset) -> Option<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0).map(|local| local_to_utc(local, tz))
}

fn end_of_day(day: NaiveDate, tz: FixedOffset) -> Option<DateTime<Utc>> {
    day.and_hms_opt(23, 59, 59).map(|local| local_to_utc(local, tz))
}

fn local_to_utc(local: NaiveDateTime, tz: FixedOffset) -> DateTime<Utc> {
    let utc = local - Duration::seconds(i64::from(tz.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldDescriptor, FieldKind, InputDescriptor};

    fn schema() -> FormSchema {
        FormSchema {
            id: 3,
            title: "Contact".to_string(),
            fields: vec![
                FieldDescriptor {
                    id: "1".to_string(),
                    label: "Name".to_string(),
                    kind: FieldKind::Simple,
                    inputs: vec![
                        InputDescriptor {
                            id: "1.3".to_string(),
                            label: "First".to_string(),
                        },
                        InputDescriptor {
                            id: "1.6".to_string(),
                            label: "Last".to_string(),
                        },
                    ],
                },
                FieldDescriptor {
                    id: "2".to_string(),
                    label: "Email".to_string(),
                    kind: FieldKind::Simple,
                    inputs: Vec::new(),
                },
            ],
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_fields_expand_inputs_and_append_metadata() {
        let fields = export_fields(&schema());
        assert_eq!(
            fields,
            vec![
                "1.3", "1.6", "2", "created_by", "id", "date_created", "source_url",
                "user_agent", "ip"
            ]
        );
    }

    #[test]
    fn test_all_has_no_date_bounds() {
        let criteria = ExportCriteria::default();
        let resolved = resolve(
            &criteria,
            &schema(),
            utc(2026, 10, 18, 9, 0, 0),
            FixedOffset::east_opt(0).unwrap(),
        );
        assert_eq!(resolved.filter.start, None);
        assert_eq!(resolved.filter.end, None);
        assert_eq!(resolved.filter, EntryFilter::default());
    }

    #[test]
    fn test_previous_day_converts_local_bounds_to_utc() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let criteria = ExportCriteria {
            range: DateRange::PreviousDay,
            field_filter: None,
        };
        // 2026-10-18 09:00 local
        let resolved = resolve(&criteria, &schema(), utc(2026, 10, 18, 7, 0, 0), tz);
        assert_eq!(resolved.filter.start, Some(utc(2026, 10, 16, 22, 0, 0)));
        assert_eq!(resolved.filter.end, Some(utc(2026, 10, 17, 21, 59, 59)));
    }

    #[test]
    fn test_previous_week_and_month_use_fixed_offsets() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = utc(2026, 10, 18, 9, 0, 0);

        let week = resolve(
            &ExportCriteria {
                range: DateRange::PreviousWeek,
                field_filter: None,
            },
            &schema(),
            now,
            tz,
        );
        assert_eq!(week.filter.start, Some(utc(2026, 10, 11, 0, 0, 0)));
        assert_eq!(week.filter.end, Some(utc(2026, 10, 17, 23, 59, 59)));

        let month = resolve(
            &ExportCriteria {
                range: DateRange::PreviousMonth,
                field_filter: None,
            },
            &schema(),
            now,
            tz,
        );
        assert_eq!(month.filter.start, Some(utc(2026, 9, 20, 0, 0, 0)));
        assert_eq!(month.filter.end, Some(utc(2026, 10, 17, 23, 59, 59)));
    }

    #[test]
    fn test_field_filter_carried_through() {
        let criteria = ExportCriteria {
            range: DateRange::All,
            field_filter: Some(FieldFilter {
                field_id: "2".to_string(),
                value: "a@example.com".to_string(),
            }),
        };
        let resolved = resolve(&criteria, &schema(), Utc::now(), FixedOffset::east_opt(0).unwrap());
        assert_eq!(resolved.filter.field, criteria.field_filter);
    }
}
