use super::*;
use chrono::{FixedOffset, Utc};
use chrono_tz::America::New_York;
use proptest::prelude::*;

fn utc(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

#[test]
fn test_time_in_spring_forward_gap_shifts_forward() {
    // 02:30 does not exist in New York on 2024-03-10.
    let schedule = Schedule::daily(2, 30).unwrap();
    let after = New_York.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();

    let next = schedule.next_run_in(&after);
    assert_eq!(next.with_timezone(&Utc), utc("2024-03-10T07:30:00Z"));
    assert_eq!(next.format("%H:%M %Z").to_string(), "03:30 EDT");

    let following = schedule.next_run_in(&next);
    assert_eq!(following.with_timezone(&Utc), utc("2024-03-11T06:30:00Z"));
}

#[test]
fn test_repeated_time_fires_once_at_earlier_instant() {
    // 01:30 happens twice in New York on 2024-11-03.
    let schedule = Schedule::daily(1, 30).unwrap();
    let after = New_York.with_ymd_and_hms(2024, 11, 2, 12, 0, 0).unwrap();

    let next = schedule.next_run_in(&after);
    assert_eq!(next.with_timezone(&Utc), utc("2024-11-03T05:30:00Z"));
    assert_eq!(next.format("%Z").to_string(), "EDT");

    // The second 01:30 (EST) is skipped; the next fire is the following day.
    let following = schedule.next_run_in(&next);
    assert_eq!(following.with_timezone(&Utc), utc("2024-11-04T06:30:00Z"));
}

#[test]
fn test_weekly_across_spring_forward_is_seven_calendar_days() {
    // Sunday = 1
    let schedule = Schedule::weekly(1, 9, 0).unwrap();
    let after = New_York.with_ymd_and_hms(2024, 3, 3, 10, 0, 0).unwrap();

    let next = schedule.next_run_in(&after);
    assert_eq!(next.format("%Y-%m-%d %H:%M %Z").to_string(), "2024-03-10 09:00 EDT");
}

#[test]
fn test_daily_later_today() {
    let schedule = Schedule::daily(14, 30).unwrap();
    let next = schedule.next_run_in(&utc("2024-01-01T10:00:00Z"));
    assert_eq!(next, utc("2024-01-01T14:30:00Z"));
}

#[test]
fn test_daily_rolls_to_tomorrow() {
    // "Backup" at 02:00, created mid-morning
    let schedule = Schedule::daily(2, 0).unwrap();
    let next = schedule.next_run_in(&utc("2024-01-01T10:00:00Z"));
    assert_eq!(next, utc("2024-01-02T02:00:00Z"));
}

#[test]
fn test_daily_exact_match_is_not_returned() {
    let schedule = Schedule::daily(9, 0).unwrap();
    let next = schedule.next_run_in(&utc("2024-03-05T09:00:00Z"));
    assert_eq!(next, utc("2024-03-06T09:00:00Z"));
}

#[test]
fn test_daily_crosses_month_and_year() {
    let schedule = Schedule::daily(0, 0).unwrap();
    let next = schedule.next_run_in(&utc("2023-12-31T23:59:59Z"));
    assert_eq!(next, utc("2024-01-01T00:00:00Z"));
}

#[test]
fn test_weekly_later_this_week() {
    // 2024-01-01 is a Monday; 4 = Wednesday
    let schedule = Schedule::weekly(4, 8, 15).unwrap();
    let next = schedule.next_run_in(&utc("2024-01-01T10:00:00Z"));
    assert_eq!(next, utc("2024-01-03T08:15:00Z"));
}

#[test]
fn test_weekly_same_day_later() {
    let schedule = Schedule::weekly(2, 18, 0).unwrap();
    let next = schedule.next_run_in(&utc("2024-01-01T10:00:00Z"));
    assert_eq!(next, utc("2024-01-01T18:00:00Z"));
}

#[test]
fn test_weekly_same_day_already_passed() {
    let schedule = Schedule::weekly(2, 9, 0).unwrap();
    let next = schedule.next_run_in(&utc("2024-01-01T10:00:00Z"));
    assert_eq!(next, utc("2024-01-08T09:00:00Z"));
}

#[test]
fn test_weekly_sunday_is_one() {
    let schedule = Schedule::weekly(1, 0, 0).unwrap();
    let next = schedule.next_run_in(&utc("2024-01-01T10:00:00Z"));
    assert_eq!(next, utc("2024-01-07T00:00:00Z"));
}

#[test]
fn test_fixed_offset_uses_wall_clock() {
    let tz = FixedOffset::east_opt(9 * 3600).unwrap();
    let after = tz.with_ymd_and_hms(2024, 6, 1, 23, 0, 0).unwrap();
    let next = Schedule::daily(7, 0).unwrap().next_run_in(&after);
    assert_eq!(next, tz.with_ymd_and_hms(2024, 6, 2, 7, 0, 0).unwrap());
}

#[test]
fn test_construction_rejects_out_of_range() {
    assert!(Schedule::daily(24, 0).is_err());
    assert!(Schedule::daily(0, 60).is_err());
    assert!(Schedule::weekly(0, 9, 0).is_err());
    assert!(Schedule::weekly(8, 9, 0).is_err());
    assert!(Schedule::weekly(7, 23, 59).is_ok());
}

#[test]
fn test_display_string() {
    assert_eq!(Schedule::daily(9, 0).unwrap().display_string(), "Daily at 09:00");
    assert_eq!(
        Schedule::weekly(2, 9, 5).unwrap().display_string(),
        "Weekly on Monday at 09:05"
    );
    assert_eq!(
        Schedule::weekly(7, 21, 30).unwrap().to_string(),
        "Weekly on Saturday at 21:30"
    );
}

#[test]
fn test_serde_format() {
    let daily = Schedule::daily(9, 0).unwrap();
    assert_eq!(
        serde_json::to_value(daily).unwrap(),
        serde_json::json!({"daily": {"hour": 9, "minute": 0}})
    );

    let weekly: Schedule =
        serde_json::from_str(r#"{"weekly":{"weekday":2,"hour":9,"minute":0}}"#).unwrap();
    assert_eq!(weekly, Schedule::weekly(2, 9, 0).unwrap());
}

#[test]
fn test_deserialize_validates() {
    let result = serde_json::from_str::<Schedule>(r#"{"daily":{"hour":25,"minute":0}}"#);
    assert!(result.is_err());
}

#[test]
fn test_weekday_number() {
    let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    assert_eq!(weekday_number(monday), 2);
    let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
    assert_eq!(weekday_number(sunday), 1);
}

fn any_instant() -> impl Strategy<Value = DateTime<Utc>> {
    // 2000-01-01 .. 2040-01-01
    (946_684_800i64..2_208_988_800i64)
        .prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap())
}

proptest! {
    #[test]
    fn prop_daily_is_strictly_later_same_or_next_day(
        hour in 0u8..=23,
        minute in 0u8..=59,
        after in any_instant(),
    ) {
        let schedule = Schedule::daily(hour, minute).unwrap();
        let next = schedule.next_run_in(&after);

        prop_assert!(next > after);
        prop_assert_eq!(next.time(), NaiveTime::from_hms_opt(hour.into(), minute.into(), 0).unwrap());
        let days = (next.date_naive() - after.date_naive()).num_days();
        prop_assert!(days == 0 || days == 1);
    }

    #[test]
    fn prop_weekly_matches_weekday_within_a_week(
        weekday in 1u8..=7,
        hour in 0u8..=23,
        minute in 0u8..=59,
        after in any_instant(),
    ) {
        let schedule = Schedule::weekly(weekday, hour, minute).unwrap();
        let next = schedule.next_run_in(&after);

        prop_assert!(next > after);
        prop_assert_eq!(weekday_number(next.date_naive()), weekday);
        // No earlier matching weekday can fit between `after` and `next`.
        prop_assert!(next - after <= chrono::Duration::days(7));
    }
}
