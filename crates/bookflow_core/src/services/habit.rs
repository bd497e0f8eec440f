//! crates/bookflow_core/src/services/habit.rs
//!
//! Daily reading goal and consecutive-day streak.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{HabitState, DEFAULT_DAILY_GOAL};
use crate::error::ServiceResult;
use crate::ports::{Clock, HabitRepository, ProgressRepository};

/// What a recomputation did to the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// Today's pages are below the goal.
    BelowGoal,
    /// The goal was already credited today.
    AlreadyCredited,
    /// First credited day ever.
    Started,
    /// Yesterday was credited too.
    Extended,
    /// A gap (or a future-dated credit) broke the streak.
    Reset,
}

impl StreakChange {
    pub fn is_change(&self) -> bool {
        matches!(self, StreakChange::Started | StreakChange::Extended | StreakChange::Reset)
    }
}

/// Applies one goal check to `habit`.
///
/// `today` is derived from `now` so the comparison and the stamp share one clock.
pub fn apply_daily_goal(habit: &mut HabitState, today_pages: i64, now: DateTime<Utc>) -> StreakChange {
    if today_pages < i64::from(habit.daily_goal_pages) {
        return StreakChange::BelowGoal;
    }

    let today = now.date_naive();
    let change = match habit.last_reading_date.map(|d| d.date_naive()) {
        None => StreakChange::Started,
        Some(last) if last == today => StreakChange::AlreadyCredited,
        Some(last) if Some(last) == today.pred_opt() => StreakChange::Extended,
        Some(_) => StreakChange::Reset,
    };

    match change {
        StreakChange::Started | StreakChange::Reset => {
            habit.current_streak = 1;
            habit.last_reading_date = Some(now);
        }
        StreakChange::Extended => {
            habit.current_streak += 1;
            habit.last_reading_date = Some(now);
        }
        StreakChange::BelowGoal | StreakChange::AlreadyCredited => {}
    }
    change
}

/// Start and end (exclusive) of the UTC calendar day containing `now`.
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of_day(now.date_naive());
    (start, start + Duration::days(1))
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::default()))
}

#[derive(Clone)]
pub struct HabitService {
    habits: Arc<dyn HabitRepository>,
    progress: Arc<dyn ProgressRepository>,
    clock: Arc<dyn Clock>,
}

impl HabitService {
    pub fn new(
        habits: Arc<dyn HabitRepository>,
        progress: Arc<dyn ProgressRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            habits,
            progress,
            clock,
        }
    }

    pub async fn get_or_create(&self, user_id: Uuid) -> ServiceResult<HabitState> {
        Ok(self.habits.get_or_create_habit(user_id, DEFAULT_DAILY_GOAL).await?)
    }

    pub async fn update_goal(&self, user_id: Uuid, daily_goal_pages: i32) -> ServiceResult<HabitState> {
        let mut habit = self.get_or_create(user_id).await?;
        habit.daily_goal_pages = daily_goal_pages;
        let habit = self.habits.save_habit(&habit).await?;
        info!("User {} set daily goal to {} pages", user_id, daily_goal_pages);
        Ok(habit)
    }

    /// Re-evaluates the streak from the progress rows touched today.
    ///
    /// Today's pages are the sum of the *current page* of every row updated today, not the
    /// pages read today.
    pub async fn recompute_streak(&self, user_id: Uuid) -> ServiceResult<HabitState> {
        let now = self.clock.now();
        let (from, to) = day_bounds(now);
        let mut habit = self.get_or_create(user_id).await?;
        let today_pages = self
            .progress
            .sum_current_pages_updated_between(user_id, from, to)
            .await?;

        let change = apply_daily_goal(&mut habit, today_pages, now);
        debug!(
            "Streak check for user {}: {} pages today, goal {}, {:?}",
            user_id, today_pages, habit.daily_goal_pages, change
        );

        if change.is_change() {
            habit = self.habits.save_habit(&habit).await?;
            info!("User {} streak is now {}", user_id, habit.current_streak);
        }
        Ok(habit)
    }
}
