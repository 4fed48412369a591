use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type QuizId = i64;

/// Points awarded for a fully correct question.
pub const POINTS_PER_QUESTION: u32 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "questionText")]
    pub text: String,
    pub options: Vec<QuizOption>,
    #[serde(default)]
    pub multi_correct: bool,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Whole seconds; zero means the question is untimed.
    #[serde(rename = "timeLimit", default)]
    pub time_limit_secs: u32,
}

impl Question {
    pub fn is_timed(&self) -> bool {
        self.time_limit_secs > 0
    }

    pub fn correct_indices(&self) -> BTreeSet<usize> {
        self.options
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_correct)
            .map(|(idx, _)| idx)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: QuizId,
    #[serde(rename = "quizCreator")]
    pub creator: String,
    pub topic: String,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

/// Question as shown to a taker, without correctness flags.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    #[serde(rename = "questionText")]
    pub text: String,
    pub options: Vec<String>,
    pub multi_correct: bool,
    pub difficulty: Difficulty,
    #[serde(rename = "timeLimit")]
    pub time_limit_secs: u32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            text: q.text.clone(),
            options: q.options.iter().map(|o| o.text.clone()).collect(),
            multi_correct: q.multi_correct,
            difficulty: q.difficulty,
            time_limit_secs: q.time_limit_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuiz {
    pub id: QuizId,
    #[serde(rename = "quizCreator")]
    pub creator: String,
    pub topic: String,
    pub questions: Vec<PublicQuestion>,
    pub created_at: DateTime<Utc>,
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            creator: quiz.creator.clone(),
            topic: quiz.topic.clone(),
            questions: quiz.questions.iter().map(PublicQuestion::from).collect(),
            created_at: quiz.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: QuizId,
    #[serde(rename = "quizCreator")]
    pub creator: String,
    pub topic: String,
    pub question_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Quiz> for QuizSummary {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            creator: quiz.creator.clone(),
            topic: quiz.topic.clone(),
            question_count: quiz.questions.len(),
            created_at: quiz.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuiz {
    #[serde(rename = "quizCreator")]
    pub creator: String,
    pub topic: String,
    pub questions: Vec<Question>,
}

/// What a taker recorded for one question.
///
/// On the wire this is `null`, a single option index, or an array of indices.
/// Negative indices cannot point at an option, so they read as unanswered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(untagged)]
pub enum Answer {
    #[default]
    Unanswered,
    Single(usize),
    Multi(BTreeSet<usize>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireAnswer {
    Unanswered,
    Single(i64),
    Multi(Vec<i64>),
}

impl From<WireAnswer> for Answer {
    fn from(wire: WireAnswer) -> Self {
        match wire {
            WireAnswer::Unanswered => Answer::Unanswered,
            WireAnswer::Single(idx) => usize::try_from(idx).map_or(Answer::Unanswered, Answer::Single),
            WireAnswer::Multi(indices) => indices
                .into_iter()
                .map(usize::try_from)
                .collect::<Result<BTreeSet<_>, _>>()
                .map_or(Answer::Unanswered, Answer::Multi),
        }
    }
}

impl<'de> Deserialize<'de> for Answer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireAnswer::deserialize(deserializer).map(Answer::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    /// Ledger sequence number, strictly increasing in append order.
    pub id: u64,
    pub quiz_id: QuizId,
    pub taker: String,
    /// Copied from the quiz at write time.
    pub topic: String,
    pub score: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub taker: String,
    pub score: u32,
}

impl From<&ScoreRecord> for LeaderboardEntry {
    fn from(record: &ScoreRecord) -> Self {
        Self {
            taker: record.taker.clone(),
            score: record.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub issue: String,
}

pub fn validate_quiz(quiz: &NewQuiz) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    if quiz.creator.trim().is_empty() {
        issues.push(ValidationIssue {
            field: "quizCreator".into(),
            issue: "must not be empty".into(),
        });
    }
    if quiz.topic.trim().is_empty() {
        issues.push(ValidationIssue {
            field: "topic".into(),
            issue: "must not be empty".into(),
        });
    }
    if quiz.questions.is_empty() {
        issues.push(ValidationIssue {
            field: "questions".into(),
            issue: "must contain at least one question".into(),
        });
    }

    for (i, q) in quiz.questions.iter().enumerate() {
        if q.text.trim().is_empty() {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].questionText"),
                issue: "must not be empty".into(),
            });
        }
        if q.options.len() < 2 {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].options"),
                issue: "must contain at least 2 options".into(),
            });
        }
        let mut seen = BTreeSet::new();
        for (j, opt) in q.options.iter().enumerate() {
            if opt.text.trim().is_empty() {
                issues.push(ValidationIssue {
                    field: format!("questions[{i}].options[{j}].text"),
                    issue: "must not be empty".into(),
                });
            } else if !seen.insert(opt.text.trim()) {
                issues.push(ValidationIssue {
                    field: format!("questions[{i}].options[{j}].text"),
                    issue: "must differ from the other options".into(),
                });
            }
        }

        let correct = q.options.iter().filter(|o| o.is_correct).count();
        if correct == 0 {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].options"),
                issue: "must mark at least one option correct".into(),
            });
        } else if !q.multi_correct && correct > 1 {
            issues.push(ValidationIssue {
                field: format!("questions[{i}].options"),
                issue: "must mark exactly one option correct unless multiCorrect".into(),
            });
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
