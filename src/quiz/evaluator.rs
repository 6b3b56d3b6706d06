use serde::{Deserialize, Serialize};

use super::catalog::Catalog;
use crate::error::{QuizError, Result};

/// An answer as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub question_id: String,
    pub selected_option: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Room the result is broadcast to.
    pub room_id: String,
    pub correct: bool,
}

/// Checks a submission against the catalog's answer keys. The room id is
/// required before anything else is looked at.
pub fn evaluate(catalog: &Catalog, submission: &Submission) -> Result<Verdict> {
    let Some(room_id) = submission.room_id.as_deref() else {
        return Err(QuizError::RoomIdMissing);
    };

    let correct_option = catalog
        .correct_option(&submission.question_id)
        .ok_or_else(|| QuizError::QuestionNotFound(submission.question_id.clone()))?;

    Ok(Verdict {
        room_id: room_id.to_string(),
        correct: correct_option == submission.selected_option,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::catalog::{AnswerKey, Question};

    fn catalog() -> Catalog {
        Catalog::new(
            vec![Question {
                id: "q1".to_string(),
                prompt: "Pick B".to_string(),
                options: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            }],
            vec![AnswerKey {
                question_id: "q1".to_string(),
                correct_option_index: 1,
            }],
        )
        .unwrap()
    }

    fn submit(question_id: &str, option: &str, room_id: Option<&str>) -> Submission {
        Submission {
            question_id: question_id.to_string(),
            selected_option: option.to_string(),
            room_id: room_id.map(str::to_string),
        }
    }

    #[test]
    fn test_correct_answer() {
        let verdict = evaluate(&catalog(), &submit("q1", "B", Some("room"))).unwrap();
        assert!(verdict.correct);
        assert_eq!(verdict.room_id, "room");
    }

    #[test]
    fn test_incorrect_answer() {
        let verdict = evaluate(&catalog(), &submit("q1", "A", Some("room"))).unwrap();
        assert!(!verdict.correct);
    }

    #[test]
    fn test_comparison_is_exact() {
        let verdict = evaluate(&catalog(), &submit("q1", "b", Some("room"))).unwrap();
        assert!(!verdict.correct);
    }

    #[test]
    fn test_unknown_question() {
        let result = evaluate(&catalog(), &submit("bad-id", "A", Some("room")));
        assert!(matches!(result, Err(QuizError::QuestionNotFound(id)) if id == "bad-id"));
    }

    #[test]
    fn test_missing_room_id_wins_over_question_lookup() {
        let result = evaluate(&catalog(), &submit("q1", "B", None));
        assert!(matches!(result, Err(QuizError::RoomIdMissing)));

        let result = evaluate(&catalog(), &submit("bad-id", "B", None));
        assert!(matches!(result, Err(QuizError::RoomIdMissing)));
    }

    #[test]
    fn test_empty_catalog() {
        let result = evaluate(&Catalog::default(), &submit("q1", "B", Some("room")));
        assert!(matches!(result, Err(QuizError::QuestionNotFound(_))));
    }

    #[test]
    fn test_submission_wire_format() {
        let submission: Submission = serde_json::from_str(
            r#"{"questionId": "q1", "selectedOption": "B", "roomId": "r1"}"#,
        )
        .unwrap();
        assert_eq!(submission, submit("q1", "B", Some("r1")));

        let submission: Submission =
            serde_json::from_str(r#"{"questionId": "q1", "selectedOption": "B"}"#).unwrap();
        assert!(submission.room_id.is_none());
    }
}
