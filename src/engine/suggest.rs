use crate::model::*;

use super::conflict::first_conflict;

// ── Slot Suggestion Algorithm ────────────────────────────────────

/// Greedy forward sweep for up to `policy.max_suggestions` free slots of
/// `policy.slot_duration`, starting at `requested_start`.
///
/// `existing` must be sorted ascending by start (the order a room's day list
/// is kept in). The cursor starts at `max(requested_start, day_start)`, is
/// aligned by `policy.rounding`, and on a conflict jumps to the end of the
/// first overlapping window and is re-aligned. Emitted slots advance the
/// cursor to their own end.
///
/// Every returned slot is conflict-free and lies inside operating hours.
/// An exhausted day returns fewer (possibly zero) slots.
pub fn suggest_slots(
    existing: &[TimeWindow],
    requested_start: Minute,
    policy: &SuggestionPolicy,
) -> Vec<TimeWindow> {
    let mut suggestions = Vec::with_capacity(policy.max_suggestions);
    if policy.slot_duration == 0 || policy.max_suggestions == 0 {
        return suggestions;
    }

    let day_end = policy.hours.day_end();
    let mut cursor = policy
        .rounding
        .apply(requested_start.max(policy.hours.day_start()));

    while cursor < day_end && suggestions.len() < policy.max_suggestions {
        let candidate_end = cursor + policy.slot_duration;
        if candidate_end > day_end {
            break;
        }
        let candidate = TimeWindow::new(cursor, candidate_end);

        match first_conflict(&candidate, existing) {
            // Overlap implies conflict.end > cursor, so the cursor strictly advances.
            Some(conflict) => cursor = policy.rounding.apply(conflict.end),
            None => {
                suggestions.push(candidate);
                cursor = candidate_end;
            }
        }
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::conflict::has_conflict;
    use proptest::prelude::*;

    const H: Minute = 60;

    fn w(start: Minute, end: Minute) -> TimeWindow {
        TimeWindow::new(start, end)
    }

    fn policy() -> SuggestionPolicy {
        SuggestionPolicy::default()
    }

    #[test]
    fn empty_day_from_nine() {
        let got = suggest_slots(&[], 9 * H, &policy());
        assert_eq!(got, vec![w(9 * H, 10 * H), w(10 * H, 11 * H), w(11 * H, 12 * H)]);
    }

    #[test]
    fn conflict_at_requested_start_jumps_past_booking() {
        let existing = [w(10 * H, 11 * H)];
        let got = suggest_slots(&existing, 10 * H, &policy());
        assert!(!got.is_empty());
        assert!(got[0].start >= 11 * H);
        assert!(!got.contains(&w(10 * H, 11 * H)));
        assert_eq!(got, vec![w(11 * H, 12 * H), w(12 * H, 13 * H), w(13 * H, 14 * H)]);
    }

    #[test]
    fn fully_booked_day_yields_nothing() {
        let existing: Vec<TimeWindow> = (9..21).map(|h| w(h * H, (h + 1) * H)).collect();
        assert!(suggest_slots(&existing, 9 * H, &policy()).is_empty());
    }

    #[test]
    fn slot_past_day_end_yields_nothing() {
        assert!(suggest_slots(&[], 20 * H + 30, &policy()).is_empty());
    }

    #[test]
    fn last_slot_may_end_exactly_at_day_end() {
        let got = suggest_slots(&[], 20 * H, &policy());
        assert_eq!(got, vec![w(20 * H, 21 * H)]);
    }

    #[test]
    fn requested_start_is_rounded_up() {
        // 09:10 -> 09:30
        let got = suggest_slots(&[], 9 * H + 10, &policy());
        assert_eq!(got[0], w(9 * H + 30, 10 * H + 30));
        // 09:45 -> 10:00
        let got = suggest_slots(&[], 9 * H + 45, &policy());
        assert_eq!(got[0], w(10 * H, 11 * H));
    }

    #[test]
    fn cursor_is_rerounded_after_conflict_jump() {
        // Booking ends at 10:15; next candidate starts at 10:30, not 10:15.
        let existing = [w(9 * H, 10 * H + 15)];
        let got = suggest_slots(&existing, 9 * H, &policy());
        assert_eq!(got[0], w(10 * H + 30, 11 * H + 30));
    }

    #[test]
    fn without_rounding_cursor_follows_booking_end() {
        let p = SuggestionPolicy {
            rounding: Rounding::None,
            ..policy()
        };
        let existing = [w(9 * H, 10 * H + 15)];
        let got = suggest_slots(&existing, 9 * H, &p);
        assert_eq!(got[0], w(10 * H + 15, 11 * H + 15));
    }

    #[test]
    fn request_before_opening_starts_at_day_start() {
        let got = suggest_slots(&[], 7 * H, &policy());
        assert_eq!(got[0], w(9 * H, 10 * H));
    }

    #[test]
    fn skips_gaps_shorter_than_slot() {
        // 30-minute gap at 10:00-10:30 cannot fit a 60-minute slot.
        let existing = [w(9 * H, 10 * H), w(10 * H + 30, 12 * H)];
        let got = suggest_slots(&existing, 9 * H, &policy());
        assert_eq!(got[0], w(12 * H, 13 * H));
    }

    #[test]
    fn partial_result_near_closing() {
        let existing = [w(9 * H, 19 * H)];
        let got = suggest_slots(&existing, 9 * H, &policy());
        assert_eq!(got, vec![w(19 * H, 20 * H), w(20 * H, 21 * H)]);
    }

    #[test]
    fn respects_custom_duration_and_count() {
        let p = SuggestionPolicy {
            slot_duration: 30,
            max_suggestions: 5,
            ..policy()
        };
        let got = suggest_slots(&[w(10 * H, 11 * H)], 9 * H + 30, &p);
        assert_eq!(
            got,
            vec![
                w(9 * H + 30, 10 * H),
                w(11 * H, 11 * H + 30),
                w(11 * H + 30, 12 * H),
                w(12 * H, 12 * H + 30),
                w(12 * H + 30, 13 * H),
            ]
        );
    }

    #[test]
    fn zero_max_suggestions_returns_empty() {
        let p = SuggestionPolicy {
            max_suggestions: 0,
            ..policy()
        };
        assert!(suggest_slots(&[], 9 * H, &p).is_empty());
    }

    fn arb_existing() -> impl Strategy<Value = Vec<TimeWindow>> {
        prop::collection::vec((8 * H..22 * H, 15..=180u32), 0..12).prop_map(|raw| {
            let mut v: Vec<TimeWindow> = raw
                .into_iter()
                .map(|(s, len)| w(s, (s + len).min(MINUTES_PER_DAY)))
                .collect();
            v.sort_by_key(|w| w.start);
            v
        })
    }

    proptest! {
        #[test]
        fn suggestions_never_overlap_existing(
            existing in arb_existing(),
            requested in 0..MINUTES_PER_DAY,
            duration in prop::sample::select(vec![30u32, 45, 60, 90, 120]),
            max in 0usize..6,
            rounding in prop::sample::select(vec![Rounding::None, Rounding::HalfHour]),
        ) {
            let p = SuggestionPolicy {
                slot_duration: duration,
                max_suggestions: max,
                rounding,
                ..SuggestionPolicy::default()
            };
            let got = suggest_slots(&existing, requested, &p);

            prop_assert!(got.len() <= max);
            for s in &got {
                prop_assert_eq!(s.duration(), duration);
                prop_assert!(p.hours.window().contains_window(s));
                prop_assert!(!has_conflict(s, &existing));
            }
            for pair in got.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
        }
    }
}
