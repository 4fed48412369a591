//! Scoring of a completed attempt.
//!
//! Grading is a pure function of the quiz and the recorded answers. Anything a
//! stale client might send that does not fit the question (an index past the
//! last option, a missing entry) is graded as unanswered instead of failing.

use crate::models::{Answer, Question, Quiz, POINTS_PER_QUESTION};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSummary {
    #[serde(rename = "questionText")]
    pub question: String,
    pub correct_answers: Vec<String>,
    /// Texts the taker selected, empty when unanswered.
    #[serde(rename = "userAnswers")]
    pub selected_answers: Vec<String>,
    pub incorrect_answers: Vec<String>,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub score: u32,
    pub max_score: u32,
    pub summary: Vec<QuestionSummary>,
}

pub fn grade(quiz: &Quiz, answers: &[Answer]) -> Grade {
    let summary: Vec<QuestionSummary> = quiz
        .questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            let answer = answers.get(i).unwrap_or(&Answer::Unanswered);
            grade_question(question, answer)
        })
        .collect();

    Grade {
        score: summary.iter().map(|s| s.points).sum(),
        max_score: POINTS_PER_QUESTION * quiz.questions.len() as u32,
        summary,
    }
}

/// Option indices the answer refers to, or an empty list when it has to be
/// treated as unanswered.
fn selected_indices(question: &Question, answer: &Answer) -> Vec<usize> {
    let in_range = |idx: &usize| *idx < question.options.len();
    match answer {
        Answer::Unanswered => Vec::new(),
        Answer::Single(idx) if in_range(idx) => vec![*idx],
        Answer::Single(_) => Vec::new(),
        Answer::Multi(set) if set.iter().all(in_range) => set.iter().copied().collect(),
        Answer::Multi(_) => Vec::new(),
    }
}

pub fn grade_question(question: &Question, answer: &Answer) -> QuestionSummary {
    let selected = selected_indices(question, answer);
    let option = |idx: &usize| &question.options[*idx];

    let earned = if question.multi_correct {
        let chosen: BTreeSet<usize> = selected.iter().copied().collect();
        !chosen.is_empty() && chosen == question.correct_indices()
    } else {
        matches!(selected.as_slice(), [only] if option(only).is_correct)
    };

    QuestionSummary {
        question: question.text.clone(),
        correct_answers: question
            .options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.text.clone())
            .collect(),
        selected_answers: selected.iter().map(|idx| option(idx).text.clone()).collect(),
        incorrect_answers: selected
            .iter()
            .map(option)
            .filter(|o| !o.is_correct)
            .map(|o| o.text.clone())
            .collect(),
        points: if earned { POINTS_PER_QUESTION } else { 0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::option;
    use crate::models::Difficulty;
    use chrono::Utc;

    fn quiz_of(questions: Vec<Question>) -> Quiz {
        Quiz {
            id: 1,
            creator: "Ada".into(),
            topic: "Letters".into(),
            questions,
            created_at: Utc::now(),
        }
    }

    fn single_b() -> Question {
        Question {
            text: "Pick B".into(),
            options: vec![
                option("A", false),
                option("B", true),
                option("C", false),
                option("D", false),
            ],
            multi_correct: false,
            difficulty: Difficulty::Easy,
            time_limit_secs: 30,
        }
    }

    fn multi_ac() -> Question {
        Question {
            text: "Pick A and C".into(),
            options: vec![
                option("A", true),
                option("B", false),
                option("C", true),
                option("D", false),
            ],
            multi_correct: true,
            difficulty: Difficulty::Medium,
            time_limit_secs: 0,
        }
    }

    fn set(items: &[usize]) -> Answer {
        Answer::Multi(items.iter().copied().collect())
    }

    #[test]
    fn single_answer_question() {
        let quiz = quiz_of(vec![single_b()]);
        assert_eq!(grade(&quiz, &[Answer::Single(1)]).score, 10);
        assert_eq!(grade(&quiz, &[Answer::Single(0)]).score, 0);
        assert_eq!(grade(&quiz, &[Answer::Unanswered]).score, 0);
    }

    #[test]
    fn multi_answer_is_all_or_nothing() {
        let quiz = quiz_of(vec![multi_ac()]);
        assert_eq!(grade(&quiz, &[set(&[0, 2])]).score, 10);
        assert_eq!(grade(&quiz, &[set(&[2, 0])]).score, 10);
        assert_eq!(grade(&quiz, &[set(&[0])]).score, 0);
        assert_eq!(grade(&quiz, &[set(&[0, 1, 2])]).score, 0);
        assert_eq!(grade(&quiz, &[set(&[1, 3])]).score, 0);
        assert_eq!(grade(&quiz, &[set(&[])]).score, 0);
    }

    #[test]
    fn out_of_range_degrades_to_unanswered() {
        let quiz = quiz_of(vec![single_b(), multi_ac()]);
        let graded = grade(&quiz, &[Answer::Single(9), set(&[0, 2, 7])]);
        assert_eq!(graded.score, 0);
        assert!(graded.summary.iter().all(|s| s.selected_answers.is_empty()));
    }

    #[test]
    fn missing_entries_are_unanswered() {
        let quiz = quiz_of(vec![single_b(), single_b()]);
        let graded = grade(&quiz, &[Answer::Single(1)]);
        assert_eq!(graded.score, 10);
        assert_eq!(graded.max_score, 20);
        assert_eq!(graded.summary[1].points, 0);
    }

    #[test]
    fn mismatched_answer_shapes() {
        let single = quiz_of(vec![single_b()]);
        assert_eq!(grade(&single, &[set(&[1])]).score, 10);
        assert_eq!(grade(&single, &[set(&[1, 2])]).score, 0);

        let mut one_correct = multi_ac();
        one_correct.options[2].is_correct = false;
        let multi = quiz_of(vec![one_correct]);
        assert_eq!(grade(&multi, &[Answer::Single(0)]).score, 10);
    }

    #[test]
    fn duplicate_option_texts_are_graded_by_flag() {
        let question = Question {
            text: "Pick the right A".into(),
            options: vec![option("A", true), option("A", false), option("B", false)],
            multi_correct: false,
            difficulty: Difficulty::Easy,
            time_limit_secs: 0,
        };
        let quiz = quiz_of(vec![question.clone()]);
        assert_eq!(grade(&quiz, &[Answer::Single(0)]).score, 10);
        let wrong = grade(&quiz, &[Answer::Single(1)]);
        assert_eq!(wrong.score, 0);
        assert_eq!(wrong.summary[0].incorrect_answers, vec!["A"]);

        let mut multi = question;
        multi.multi_correct = true;
        multi.options[2].is_correct = true;
        let quiz = quiz_of(vec![multi]);
        assert_eq!(grade(&quiz, &[set(&[0, 2])]).score, 10);
        assert_eq!(grade(&quiz, &[set(&[1, 2])]).score, 0);
    }

    #[test]
    fn summary_lists_selected_and_incorrect_texts() {
        let quiz = quiz_of(vec![multi_ac()]);
        let graded = grade(&quiz, &[set(&[0, 1, 2])]);
        let summary = &graded.summary[0];
        assert_eq!(summary.question, "Pick A and C");
        assert_eq!(summary.correct_answers, vec!["A", "C"]);
        assert_eq!(summary.selected_answers, vec!["A", "B", "C"]);
        assert_eq!(summary.incorrect_answers, vec!["B"]);
        assert_eq!(summary.points, 0);
    }
}
