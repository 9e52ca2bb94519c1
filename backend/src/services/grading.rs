// src/services/grading.rs

use std::collections::BTreeSet;

use crate::models::{answer::AnswerValue, question::Question};

/// Scores one answer.
///
/// Returns `None` for question types that need a human grader. Choice
/// questions earn full points when the selected keys equal the correct keys
/// as a set, and zero otherwise. There is no partial credit.
pub fn grade(question: &Question, answer: Option<&AnswerValue>) -> Option<f64> {
    if !question.question_type.is_auto_gradable() {
        return None;
    }

    let submitted = answer.map(AnswerValue::selected_keys).unwrap_or_default();
    let correct: BTreeSet<&str> = question.correct_answer.iter().map(String::as_str).collect();

    if submitted == correct {
        Some(question.points)
    } else {
        Some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{QuestionOption, QuestionType};

    fn choice_question(question_type: QuestionType, correct: &[&str], points: f64) -> Question {
        Question {
            id: 1,
            question_type,
            content: "Pick".to_string(),
            options: ["A", "B", "C", "D"]
                .iter()
                .map(|k| QuestionOption {
                    key: k.to_string(),
                    label: k.to_string(),
                })
                .collect(),
            correct_answer: correct.iter().map(|s| s.to_string()).collect(),
            points,
            created_at: None,
        }
    }

    fn multi(keys: &[&str]) -> AnswerValue {
        AnswerValue::MultipleChoice(keys.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn set_equality_ignores_order() {
        let q = choice_question(QuestionType::MultipleChoice, &["A", "C"], 3.0);
        assert_eq!(grade(&q, Some(&multi(&["C", "A"]))), Some(3.0));
    }

    #[test]
    fn no_partial_credit() {
        let q = choice_question(QuestionType::MultipleChoice, &["A", "C"], 3.0);
        assert_eq!(grade(&q, Some(&multi(&["A"]))), Some(0.0));
        assert_eq!(grade(&q, Some(&multi(&["A", "B", "C"]))), Some(0.0));
    }

    #[test]
    fn missing_answer_scores_zero() {
        let q = choice_question(QuestionType::SingleChoice, &["B"], 1.0);
        assert_eq!(grade(&q, None), Some(0.0));
    }

    #[test]
    fn single_choice_matches_one_key() {
        let q = choice_question(QuestionType::SingleChoice, &["B"], 1.5);
        assert_eq!(grade(&q, Some(&AnswerValue::SingleChoice("B".into()))), Some(1.5));
        assert_eq!(grade(&q, Some(&AnswerValue::SingleChoice("A".into()))), Some(0.0));
    }

    #[test]
    fn wrong_shape_counts_as_empty_selection() {
        let q = choice_question(QuestionType::MultipleChoice, &["A"], 2.0);
        assert_eq!(grade(&q, Some(&AnswerValue::Text("A".into()))), Some(0.0));
    }

    #[test]
    fn text_types_are_not_graded() {
        let mut q = choice_question(QuestionType::ShortText, &[], 1.0);
        q.options.clear();
        assert_eq!(grade(&q, Some(&AnswerValue::Text("answer text".into()))), None);

        q.question_type = QuestionType::Essay;
        assert_eq!(grade(&q, None), None);

        q.question_type = QuestionType::FileUpload;
        assert_eq!(grade(&q, Some(&AnswerValue::Attachment("f.pdf".into()))), None);
    }

    #[test]
    fn grading_is_deterministic() {
        let q = choice_question(QuestionType::MultipleChoice, &["B", "D"], 4.0);
        let a = multi(&["D", "B"]);
        let first = grade(&q, Some(&a));
        for _ in 0..10 {
            assert_eq!(grade(&q, Some(&a)), first);
        }
    }
}
