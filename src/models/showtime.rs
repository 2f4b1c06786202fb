use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Showtime {
    pub id: i64,
    pub movie_id: i64,
    pub studio_id: i64,
    pub show_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Ticket price per seat in currency subunits.
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

impl Showtime {
    /// Half-open `[start, end)` overlap: back-to-back showtimes do not collide.
    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        start < self.end_time && self.start_time < end
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.show_date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.show_date.and_time(self.end_time)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewShowtime {
    pub movie_id: i64,
    pub studio_id: i64,
    pub show_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub price: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShowtimeFilter {
    pub movie_id: Option<i64>,
    pub studio_id: Option<i64>,
    pub date: Option<NaiveDate>,
}

impl ShowtimeFilter {
    pub fn matches(&self, showtime: &Showtime) -> bool {
        self.movie_id.map_or(true, |id| showtime.movie_id == id)
            && self.studio_id.map_or(true, |id| showtime.studio_id == id)
            && self.date.map_or(true, |d| showtime.show_date == d)
    }
}
