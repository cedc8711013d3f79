// crates/core/src/habits.rs
//! Habit heatmaps, streaks and day toggling.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::types::Habit;

/// Highest heatmap intensity level.
pub const MAX_LEVEL: u8 = 4;

/// One day in the heatmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct HeatmapCell {
    pub date: NaiveDate,
    /// Habits completed on this day.
    pub count: u32,
    /// Intensity bucket, 0 (nothing) to [`MAX_LEVEL`] (everything).
    pub level: u8,
}

/// Calendar heatmap laid out as Monday-first weeks.
///
/// The first week is padded with `None` before `start`; the last week is
/// padded after `end`, so every week has exactly seven slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct HabitHeatmap {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub habit_count: u32,
    pub weeks: Vec<Vec<Option<HeatmapCell>>>,
}

impl HabitHeatmap {
    /// Build a heatmap over `[start, end]`. An inverted range yields no weeks.
    pub fn build(habits: &[Habit], start: NaiveDate, end: NaiveDate) -> Self {
        let habit_count = habits.len() as u32;
        let mut weeks: Vec<Vec<Option<HeatmapCell>>> = Vec::new();

        if start <= end {
            let mut week: Vec<Option<HeatmapCell>> =
                vec![None; start.weekday().num_days_from_monday() as usize];
            let mut day = start;
            while day <= end {
                let count = habits.iter().filter(|h| h.is_done_on(day)).count() as u32;
                week.push(Some(HeatmapCell {
                    date: day,
                    count,
                    level: level_for(count, habit_count),
                }));
                if week.len() == 7 {
                    weeks.push(std::mem::take(&mut week));
                }
                match day.succ_opt() {
                    Some(next) => day = next,
                    None => break,
                }
            }
            if !week.is_empty() {
                week.resize(7, None);
                weeks.push(week);
            }
        }

        Self {
            start,
            end,
            habit_count,
            weeks,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = &HeatmapCell> {
        self.weeks.iter().flatten().flatten()
    }
}

/// `ceil(count / total * MAX_LEVEL)`, clamped.
pub fn level_for(count: u32, total: u32) -> u8 {
    if count == 0 || total == 0 {
        return 0;
    }
    let scaled = (count.min(total) * MAX_LEVEL as u32).div_ceil(total);
    scaled.min(MAX_LEVEL as u32) as u8
}

/// Streak and completion statistics for a single habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct HabitStats {
    pub habit_id: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_completions: u32,
}

impl HabitStats {
    /// The current streak ends today, or yesterday when today is not done
    /// yet (a streak is not broken until the day is over).
    pub fn for_habit(habit: &Habit, today: NaiveDate) -> Self {
        let days = &habit.completed_days;

        let mut longest = 0u32;
        let mut run = 0u32;
        let mut previous: Option<NaiveDate> = None;
        for &day in days.iter().filter(|d| **d <= today) {
            run = match previous {
                Some(prev) if day - prev == Duration::days(1) => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            previous = Some(day);
        }

        let mut cursor = if habit.is_done_on(today) {
            Some(today)
        } else {
            today.pred_opt()
        };
        let mut current = 0u32;
        while let Some(day) = cursor.filter(|d| habit.is_done_on(*d)) {
            current += 1;
            cursor = day.pred_opt();
        }

        Self {
            habit_id: habit.id.clone(),
            current_streak: current,
            longest_streak: longest,
            total_completions: days.len() as u32,
        }
    }
}

/// Flip completion for `day`, returning the edited copy.
pub fn toggle_day(habit: &Habit, day: NaiveDate) -> Habit {
    let mut next = habit.clone();
    match next.completed_days.binary_search(&day) {
        Ok(pos) => {
            next.completed_days.remove(pos);
        }
        Err(pos) => next.completed_days.insert(pos, day),
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_level_for() {
        assert_eq!(level_for(0, 3), 0);
        assert_eq!(level_for(1, 3), 2);
        assert_eq!(level_for(3, 3), 4);
        assert_eq!(level_for(1, 4), 1);
        assert_eq!(level_for(5, 0), 0);
        assert_eq!(level_for(9, 3), 4);
    }

    #[test]
    fn test_heatmap_pads_weeks() {
        // 2024-03-06 is a Wednesday.
        let habits = vec![
            Habit::new("a", "Read").with_days([d("2024-03-06"), d("2024-03-07")]),
            Habit::new("b", "Run").with_days([d("2024-03-07")]),
        ];
        let map = HabitHeatmap::build(&habits, d("2024-03-06"), d("2024-03-12"));

        assert_eq!(map.weeks.len(), 2);
        assert!(map.weeks.iter().all(|w| w.len() == 7));
        assert_eq!(map.weeks[0][0], None);
        assert_eq!(map.weeks[0][1], None);
        let first = map.weeks[0][2].as_ref().unwrap();
        assert_eq!(first.date, d("2024-03-06"));
        assert_eq!(first.count, 1);
        assert_eq!(first.level, 2);
        let both = map.weeks[0][3].as_ref().unwrap();
        assert_eq!(both.count, 2);
        assert_eq!(both.level, MAX_LEVEL);
        assert_eq!(map.cells().count(), 7);
    }

    #[test]
    fn test_heatmap_inverted_range_is_empty() {
        let map = HabitHeatmap::build(&[], d("2024-03-10"), d("2024-03-01"));
        assert!(map.weeks.is_empty());
    }

    #[test]
    fn test_heatmap_and_streaks_at_calendar_limits() {
        let habit = Habit::new("h", "Read").with_days([NaiveDate::MIN, NaiveDate::MAX]);

        let heatmap = HabitHeatmap::build(std::slice::from_ref(&habit), NaiveDate::MAX, NaiveDate::MAX);
        assert_eq!(heatmap.cells().count(), 1);
        assert_eq!(heatmap.cells().next().unwrap().level, MAX_LEVEL);

        assert_eq!(HabitStats::for_habit(&habit, NaiveDate::MIN).current_streak, 1);
    }

    #[test]
    fn test_streaks() {
        let habit = Habit::new("a", "Read").with_days([
            d("2024-03-01"),
            d("2024-03-02"),
            d("2024-03-03"),
            d("2024-03-05"),
            d("2024-03-06"),
        ]);

        let stats = HabitStats::for_habit(&habit, d("2024-03-06"));
        assert_eq!(stats.current_streak, 2);
        assert_eq!(stats.longest_streak, 3);
        assert_eq!(stats.total_completions, 5);

        // Today not done yet: streak still counts through yesterday.
        let stats = HabitStats::for_habit(&habit, d("2024-03-07"));
        assert_eq!(stats.current_streak, 2);

        let stats = HabitStats::for_habit(&habit, d("2024-03-09"));
        assert_eq!(stats.current_streak, 0);
    }

    #[test]
    fn test_toggle_day_adds_and_removes() {
        let habit = Habit::new("a", "Read").with_days([d("2024-03-01"), d("2024-03-03")]);

        let added = toggle_day(&habit, d("2024-03-02"));
        assert_eq!(
            added.completed_days,
            vec![d("2024-03-01"), d("2024-03-02"), d("2024-03-03")]
        );

        let removed = toggle_day(&added, d("2024-03-01"));
        assert_eq!(removed.completed_days, vec![d("2024-03-02"), d("2024-03-03")]);
        assert_eq!(habit.completed_days.len(), 2);
    }
}
