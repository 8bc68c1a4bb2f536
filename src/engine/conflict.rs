use chrono::NaiveDate;

use crate::model::*;

use super::EngineError;

/// True if `candidate` overlaps any window in `existing` (half-open rule).
pub fn has_conflict(candidate: &TimeWindow, existing: &[TimeWindow]) -> bool {
    first_conflict(candidate, existing).is_some()
}

/// First window in `existing` that overlaps `candidate`, in slice order.
pub fn first_conflict<'a>(candidate: &TimeWindow, existing: &'a [TimeWindow]) -> Option<&'a TimeWindow> {
    existing.iter().find(|w| candidate.overlaps(w))
}

/// Parse a `"HH:mm"` pair into a window, rejecting `start >= end`.
pub fn parse_window(start: &str, end: &str) -> Result<TimeWindow, EngineError> {
    let start = parse_clock(start).ok_or(EngineError::Invalid("startTime must be HH:mm"))?;
    let end = parse_clock(end).ok_or(EngineError::Invalid("endTime must be HH:mm"))?;
    if start >= end {
        return Err(EngineError::Invalid("startTime must be before endTime"));
    }
    Ok(TimeWindow::new(start, end))
}

pub(crate) fn validate_window(window: &TimeWindow, hours: &OperatingHours) -> Result<(), EngineError> {
    if window.start >= window.end {
        return Err(EngineError::Invalid("startTime must be before endTime"));
    }
    if !hours.window().contains_window(window) {
        return Err(EngineError::OutsideOperatingHours {
            window: *window,
            hours: *hours,
        });
    }
    Ok(())
}

/// Caller must hold the room's write lock for the check to be meaningful at admission.
pub(crate) fn check_no_conflict(rs: &RoomState, date: NaiveDate, window: &TimeWindow) -> Result<(), EngineError> {
    match rs.overlapping(date, window).next() {
        Some(existing) => Err(EngineError::Conflict(existing.id)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ulid::Ulid;

    fn w(start: Minute, end: Minute) -> TimeWindow {
        TimeWindow::new(start, end)
    }

    fn arb_window() -> impl Strategy<Value = TimeWindow> {
        (0..MINUTES_PER_DAY, 1..=240u32)
            .prop_map(|(start, len)| w(start, (start + len).min(MINUTES_PER_DAY)))
            .prop_filter("non-empty", |w| w.start < w.end)
    }

    #[test]
    fn adjacent_windows_do_not_conflict() {
        assert!(!has_conflict(&w(540, 600), &[w(600, 660)]));
        assert!(!has_conflict(&w(600, 660), &[w(540, 600)]));
    }

    #[test]
    fn contained_window_conflicts() {
        assert!(has_conflict(&w(540, 660), &[w(570, 630)]));
        assert!(has_conflict(&w(570, 630), &[w(540, 660)]));
    }

    #[test]
    fn partial_overlap_conflicts() {
        assert!(has_conflict(&w(540, 600), &[w(570, 630)]));
    }

    #[test]
    fn empty_existing_never_conflicts() {
        assert!(!has_conflict(&w(540, 600), &[]));
    }

    #[test]
    fn first_conflict_reports_earliest_in_order() {
        let existing = [w(480, 540), w(570, 600), w(600, 690)];
        assert_eq!(first_conflict(&w(560, 620), &existing), Some(&w(570, 600)));
    }

    #[test]
    fn parse_window_rejects_bad_input() {
        assert_eq!(parse_window("09:00", "10:00").unwrap(), w(540, 600));
        assert!(matches!(parse_window("10:00", "10:00"), Err(EngineError::Invalid(_))));
        assert!(matches!(parse_window("11:00", "10:00"), Err(EngineError::Invalid(_))));
        assert!(matches!(parse_window("nine", "10:00"), Err(EngineError::Invalid(_))));
        assert!(matches!(parse_window("09:00", ""), Err(EngineError::Invalid(_))));
    }

    #[test]
    fn validate_window_enforces_operating_hours() {
        let hours = OperatingHours::default();
        assert!(validate_window(&w(540, 600), &hours).is_ok());
        assert!(validate_window(&w(1200, 1260), &hours).is_ok());
        assert!(matches!(
            validate_window(&w(480, 600), &hours),
            Err(EngineError::OutsideOperatingHours { .. })
        ));
        assert!(matches!(
            validate_window(&w(1230, 1290), &hours),
            Err(EngineError::OutsideOperatingHours { .. })
        ));
    }

    #[test]
    fn check_no_conflict_names_existing_booking() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let mut rs = RoomState::new(Ulid::new(), "Room A".into(), 4, None);
        let id = Ulid::new();
        rs.insert_booking(date, Booking { id, user_id: Ulid::new(), window: w(600, 660) });

        match check_no_conflict(&rs, date, &w(630, 690)) {
            Err(EngineError::Conflict(cid)) => assert_eq!(cid, id),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(check_no_conflict(&rs, date, &w(660, 720)).is_ok());
        let other_day = date.succ_opt().unwrap();
        assert!(check_no_conflict(&rs, other_day, &w(630, 690)).is_ok());
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in arb_window(), b in arb_window()) {
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        #[test]
        fn window_overlaps_itself(a in arb_window()) {
            prop_assert!(a.overlaps(&a));
        }

        #[test]
        fn has_conflict_matches_pairwise_rule(a in arb_window(), existing in prop::collection::vec(arb_window(), 0..8)) {
            let expected = existing.iter().any(|b| a.start < b.end && a.end > b.start);
            prop_assert_eq!(has_conflict(&a, &existing), expected);
        }
    }
}
