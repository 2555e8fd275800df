//! Report lifecycle (newest-report selection, review gating, old-report
//! deletion) and the grades store, used by the single-task runner.

pub mod grades;
pub mod report;

pub use grades::{GradeEntry, GradesFile, append_grade, load_grades, save_grades};
pub use report::{delete_old, find_newest, is_reviewed, should_skip};
