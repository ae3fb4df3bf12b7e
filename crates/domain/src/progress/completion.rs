use std::collections::HashSet;

use common::LectureId;

use super::LectureProgress;

/// Whether every lecture currently in the course has been completed.
///
/// `current_lectures` must be the course's live lecture list, not a copy taken
/// when progress was recorded: adding a lecture later makes a finished course
/// unfinished again, removing the last missing one finishes it. A course with
/// no lectures is never complete. Entries for lectures no longer in the course
/// are ignored.
pub fn course_completion(current_lectures: &[LectureId], progress: &[LectureProgress]) -> bool {
    if current_lectures.is_empty() {
        return false;
    }

    let done: HashSet<LectureId> = progress
        .iter()
        .filter(|entry| entry.completed)
        .map(|entry| entry.lecture_id)
        .collect();

    let covered = current_lectures
        .iter()
        .filter(|id| done.contains(*id))
        .count();

    covered == current_lectures.len()
}
