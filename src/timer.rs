//! Per-question countdown driving an attempt through a quiz.
//!
//! Time never comes from the wall clock here: every transition takes `now`
//! from a [`Clock`], so a test can step through a whole attempt with a
//! [`ManualClock`].
//!
//! The *frontier* is the furthest question the taker has reached and is the
//! only one with a running countdown. The *cursor* is the question being
//! viewed; moving it backwards never restarts a countdown.

use crate::models::{Answer, Quiz};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Monotonic time source, measured from an arbitrary origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error("attempt has not been started")]
    NotStarted,
    #[error("attempt was already started")]
    AlreadyStarted,
    #[error("attempt is already completed")]
    Completed,
    #[error("time ran out for question {0}")]
    QuestionLocked(usize),
    #[error("already at the first question")]
    AtFirstQuestion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Phase {
    NotStarted,
    AwaitingAnswer { frontier: usize },
    Completed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSnapshot {
    #[serde(flatten)]
    pub phase: Phase,
    pub current_question: usize,
    pub total_questions: usize,
    /// Milliseconds left on the frontier countdown, absent when untimed.
    pub remaining_ms: Option<u64>,
    pub answers: Vec<Answer>,
    pub locked: Vec<bool>,
}

#[derive(Debug, Clone)]
pub struct Attempt {
    quiz: Arc<Quiz>,
    taker: String,
    phase: Phase,
    cursor: usize,
    answers: Vec<Answer>,
    locked: Vec<bool>,
    deadline: Option<Duration>,
    last_activity: Duration,
}

impl Attempt {
    pub fn new(quiz: Arc<Quiz>, taker: impl Into<String>) -> Self {
        let len = quiz.questions.len();
        Self {
            quiz,
            taker: taker.into(),
            phase: Phase::NotStarted,
            cursor: 0,
            answers: vec![Answer::Unanswered; len],
            locked: vec![false; len],
            deadline: None,
            last_activity: Duration::ZERO,
        }
    }

    pub fn quiz(&self) -> &Arc<Quiz> {
        &self.quiz
    }

    pub fn taker(&self) -> &str {
        &self.taker
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn last_activity(&self) -> Duration {
        self.last_activity
    }

    pub fn start(&mut self, now: Duration) -> Result<(), AttemptError> {
        if self.phase != Phase::NotStarted {
            return Err(AttemptError::AlreadyStarted);
        }
        self.last_activity = now;
        if self.quiz.questions.is_empty() {
            self.phase = Phase::Completed;
            return Ok(());
        }
        self.enter(0, now);
        Ok(())
    }

    /// Applies every countdown expiry up to `now`. Each following countdown
    /// starts at the instant the previous one ran out.
    pub fn sync(&mut self, now: Duration) {
        while let (Phase::AwaitingAnswer { frontier }, Some(deadline)) = (self.phase, self.deadline) {
            if deadline > now {
                break;
            }
            self.locked[frontier] = true;
            self.advance_frontier(frontier, deadline);
        }
    }

    pub fn record(&mut self, now: Duration, answer: Answer) -> Result<(), AttemptError> {
        self.awaiting(now)?;
        if self.locked[self.cursor] {
            return Err(AttemptError::QuestionLocked(self.cursor));
        }
        self.answers[self.cursor] = answer;
        self.last_activity = now;
        Ok(())
    }

    pub fn next(&mut self, now: Duration) -> Result<(), AttemptError> {
        let frontier = self.awaiting(now)?;
        if self.cursor < frontier {
            self.cursor += 1;
        } else {
            self.advance_frontier(frontier, now);
        }
        self.last_activity = now;
        Ok(())
    }

    pub fn previous(&mut self, now: Duration) -> Result<(), AttemptError> {
        self.awaiting(now)?;
        if self.cursor == 0 {
            return Err(AttemptError::AtFirstQuestion);
        }
        self.cursor -= 1;
        self.last_activity = now;
        Ok(())
    }

    /// Completes the attempt from wherever the taker is. Completing twice is
    /// not an error, so a submit racing a final expiry still succeeds.
    pub fn submit(&mut self, now: Duration) -> Result<(), AttemptError> {
        self.sync(now);
        match self.phase {
            Phase::NotStarted => Err(AttemptError::NotStarted),
            Phase::Completed => Ok(()),
            Phase::AwaitingAnswer { .. } => {
                self.phase = Phase::Completed;
                self.deadline = None;
                self.last_activity = now;
                Ok(())
            }
        }
    }

    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        match self.phase {
            Phase::AwaitingAnswer { .. } => self.deadline.map(|d| d.saturating_sub(now)),
            _ => None,
        }
    }

    pub fn snapshot(&self, now: Duration) -> AttemptSnapshot {
        AttemptSnapshot {
            phase: self.phase,
            current_question: self.cursor,
            total_questions: self.quiz.questions.len(),
            remaining_ms: self.remaining(now).map(|d| d.as_millis() as u64),
            answers: self.answers.clone(),
            locked: self.locked.clone(),
        }
    }

    fn awaiting(&mut self, now: Duration) -> Result<usize, AttemptError> {
        self.sync(now);
        match self.phase {
            Phase::NotStarted => Err(AttemptError::NotStarted),
            Phase::Completed => Err(AttemptError::Completed),
            Phase::AwaitingAnswer { frontier } => Ok(frontier),
        }
    }

    fn advance_frontier(&mut self, frontier: usize, at: Duration) {
        if frontier + 1 < self.quiz.questions.len() {
            self.enter(frontier + 1, at);
        } else {
            self.phase = Phase::Completed;
            self.deadline = None;
        }
    }

    fn enter(&mut self, question: usize, at: Duration) {
        let limit = self.quiz.questions[question].time_limit_secs;
        self.phase = Phase::AwaitingAnswer { frontier: question };
        self.cursor = question;
        self.deadline = (limit > 0).then(|| at + Duration::from_secs(limit.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grader::grade;
    use crate::models::tests::option;
    use crate::models::{Difficulty, Question};
    use chrono::Utc;

    fn question(text: &str, time_limit_secs: u32) -> Question {
        Question {
            text: text.into(),
            options: vec![option("yes", true), option("no", false)],
            multi_correct: false,
            difficulty: Difficulty::Medium,
            time_limit_secs,
        }
    }

    fn attempt(limits: &[u32]) -> Attempt {
        let quiz = Quiz {
            id: 7,
            creator: "Ada".into(),
            topic: "Timing".into(),
            questions: limits
                .iter()
                .enumerate()
                .map(|(i, l)| question(&format!("q{i}"), *l))
                .collect(),
            created_at: Utc::now(),
        };
        Attempt::new(Arc::new(quiz), "taker")
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn expiry_advances_and_leaves_question_unanswered() {
        let clock = ManualClock::default();
        let mut a = attempt(&[30, 30]);
        a.start(clock.now()).unwrap();
        clock.advance(secs(29));
        a.sync(clock.now());
        assert_eq!(a.phase(), Phase::AwaitingAnswer { frontier: 0 });
        assert_eq!(a.remaining(clock.now()), Some(secs(1)));

        clock.advance(secs(1));
        a.sync(clock.now());
        assert_eq!(a.phase(), Phase::AwaitingAnswer { frontier: 1 });
        assert_eq!(a.remaining(clock.now()), Some(secs(30)));
        assert_eq!(a.answers()[0], Answer::Unanswered);

        a.record(clock.now(), Answer::Single(0)).unwrap();
        a.submit(clock.now()).unwrap();
        let graded = grade(a.quiz(), a.answers());
        assert_eq!(graded.score, 10);
        assert_eq!(graded.summary[0].points, 0);
    }

    #[test]
    fn recorded_answer_survives_expiry() {
        let mut a = attempt(&[10, 0]);
        a.start(secs(0)).unwrap();
        a.record(secs(3), Answer::Single(0)).unwrap();
        a.sync(secs(10));
        assert_eq!(a.cursor(), 1);
        assert_eq!(a.answers()[0], Answer::Single(0));
        a.previous(secs(11)).unwrap();
        assert_eq!(
            a.record(secs(11), Answer::Single(1)),
            Err(AttemptError::QuestionLocked(0))
        );
    }

    #[test]
    fn catch_up_chains_deadlines() {
        let mut a = attempt(&[5, 5, 5]);
        a.start(secs(0)).unwrap();
        a.sync(secs(12));
        assert_eq!(a.phase(), Phase::AwaitingAnswer { frontier: 2 });
        assert_eq!(a.remaining(secs(12)), Some(secs(3)));
        a.sync(secs(15));
        assert!(a.is_completed());
        assert_eq!(a.remaining(secs(15)), None);
    }

    #[test]
    fn untimed_question_never_expires() {
        let mut a = attempt(&[0]);
        a.start(secs(0)).unwrap();
        a.sync(secs(100_000));
        assert_eq!(a.phase(), Phase::AwaitingAnswer { frontier: 0 });
        assert_eq!(a.remaining(secs(100_000)), None);
    }

    #[test]
    fn back_navigation_keeps_frontier_countdown() {
        let mut a = attempt(&[0, 20, 20]);
        a.start(secs(0)).unwrap();
        a.next(secs(1)).unwrap();
        assert_eq!(a.remaining(secs(1)), Some(secs(20)));

        a.previous(secs(5)).unwrap();
        assert_eq!(a.cursor(), 0);
        a.record(secs(6), Answer::Single(0)).unwrap();
        assert_eq!(a.remaining(secs(6)), Some(secs(15)));

        // Moving forward again only moves the cursor.
        a.next(secs(7)).unwrap();
        assert_eq!(a.cursor(), 1);
        assert_eq!(a.remaining(secs(7)), Some(secs(14)));

        a.previous(secs(8)).unwrap();
        a.sync(secs(21));
        assert_eq!(a.phase(), Phase::AwaitingAnswer { frontier: 2 });
        assert_eq!(a.cursor(), 2);
        assert_eq!(a.remaining(secs(21)), Some(secs(20)));
    }

    #[test]
    fn next_on_last_question_completes() {
        let mut a = attempt(&[0, 0]);
        a.start(secs(0)).unwrap();
        a.next(secs(1)).unwrap();
        a.next(secs(2)).unwrap();
        assert!(a.is_completed());
        assert_eq!(a.next(secs(3)), Err(AttemptError::Completed));
        assert_eq!(a.submit(secs(3)), Ok(()));
    }

    #[test]
    fn state_guards() {
        let mut a = attempt(&[0, 0]);
        assert_eq!(a.record(secs(0), Answer::Single(0)), Err(AttemptError::NotStarted));
        assert_eq!(a.submit(secs(0)), Err(AttemptError::NotStarted));
        a.start(secs(0)).unwrap();
        assert_eq!(a.start(secs(0)), Err(AttemptError::AlreadyStarted));
        assert_eq!(a.previous(secs(0)), Err(AttemptError::AtFirstQuestion));
    }

    #[test]
    fn submit_early_leaves_rest_unanswered() {
        let mut a = attempt(&[0, 0, 0]);
        a.start(secs(0)).unwrap();
        a.record(secs(1), Answer::Single(0)).unwrap();
        a.submit(secs(2)).unwrap();
        assert!(a.is_completed());
        assert_eq!(&a.answers()[1..], &[Answer::Unanswered, Answer::Unanswered]);
        assert_eq!(grade(a.quiz(), a.answers()).score, 10);
    }

    #[test]
    fn snapshot_reports_countdown() {
        let mut a = attempt(&[30]);
        a.start(secs(0)).unwrap();
        let snap = a.snapshot(Duration::from_millis(12_500));
        assert_eq!(snap.remaining_ms, Some(17_500));
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["state"], "awaitingAnswer");
        assert_eq!(json["frontier"], 0);
        assert_eq!(json["totalQuestions"], 1);
    }
}
