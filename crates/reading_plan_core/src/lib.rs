pub mod calendar;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;
pub mod streak;
pub mod timezone;

pub use domain::{
    CalendarDay, CalendarSummary, ChapterContent, CompletedDay, DailyReading, Passage,
    PassageProgressEntry, PassageProgressUpdate, PassageStatus, PassageType, PassageView,
    PassagesProgress, ProgressUpdate, ReadingPlan, ReadingPlanDay, UserReadingProgress, UserStats,
};
pub use error::{ReadingPlanError, ReadingPlanResult};
pub use ports::{
    Clock, ContentService, PlanRepository, PortError, PortResult, ProgressRepository,
    SystemClock, UserProfileService,
};
pub use service::{ReadingByDateRequest, ReadingPlanService};
pub use timezone::{DayWindow, DayWindowResolver};
