//! Completion-driven study helpers
//!
//! - [`ChapterTutor`]: streamed answers grounded on chapter text
//! - [`PracticeChat`]: Socratic tutoring and spoken English practice
//! - [`GrammarTutor`]: grammar lessons with a multiple-choice quiz
//! - [`StudyPlanner`]: day-by-day study plans built from chapter text

mod chapter;
mod conversation;
mod grammar;
mod planner;

pub use chapter::{ChapterQuestion, ChapterTutor, MIN_CHAPTER_CHARS};
pub use conversation::{Exchange, PracticeChat, PracticeMode};
pub use grammar::{
    Difficulty, GrammarLesson, GrammarLevel, GrammarTutor, LessonOrigin, LessonRequest,
    MAX_QUESTIONS, QuizQuestion, QuizScore,
};
pub use planner::{
    MAX_PLAN_CONTENT_CHARS, MIN_PLAN_CONTENT_CHARS, StudyDay, StudyPlan, StudyPlanRequest,
    StudyPlanner, StudyTask,
};

use crate::db::{HistoryRepo, NewHistoryRecord};

/// Save to history when a store is attached; failures only warn
fn save_record(history: Option<&HistoryRepo>, record: &NewHistoryRecord) {
    let Some(history) = history else {
        return;
    };
    if let Err(e) = history.save(record) {
        tracing::warn!(error = %e, chat_type = %record.chat_type, "failed to save history record");
    }
}
