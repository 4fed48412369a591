use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::QuizError;
use crate::grader::{grade, Grade};
use crate::ledger::{NewScore, ScoreLedger};
use crate::models::{
    Answer, LeaderboardEntry, NewQuiz, PublicQuestion, Quiz, QuizId, QuizSummary, ScoreRecord,
};
use crate::ranker::{Ranker, LEADERBOARD_SIZE};
use crate::timer::{Attempt, AttemptError, AttemptSnapshot, Clock};
use anyhow::Context;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistentSnapshot {
    quizzes: Vec<Quiz>,
    scores: Vec<ScoreRecord>,
    next_quiz_id: QuizId,
}

impl Default for PersistentSnapshot {
    fn default() -> Self {
        Self {
            quizzes: Vec::new(),
            scores: Vec::new(),
            next_quiz_id: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub record: ScoreRecord,
    pub grade: Grade,
    /// Zero-based position on the leaderboard, absent if it did not place.
    pub rank: Option<usize>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    pub id: Uuid,
    pub quiz_id: QuizId,
    pub taker: String,
    #[serde(flatten)]
    pub snapshot: AttemptSnapshot,
    pub question: Option<PublicQuestion>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AttemptOutcome {
    InProgress { attempt: AttemptView },
    Completed { submission: Submission },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub submitted: usize,
    pub discarded: usize,
}

/// A live attempt and, once it has been graded, its submission. The mutex
/// around it makes grading happen once per attempt.
#[derive(Debug)]
pub struct HostedAttempt {
    pub attempt: Attempt,
    pub submission: Option<Submission>,
}

pub type AttemptSlot = Arc<Mutex<HostedAttempt>>;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub ledger: Arc<ScoreLedger>,
    pub ranker: Arc<Ranker>,
    pub attempts: Arc<DashMap<Uuid, AttemptSlot>>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
    persist_lock: Arc<Mutex<()>>,
    persist_signal: Arc<Notify>,
}

impl AppState {
    /// Builds the state, restoring the local snapshot when one is configured
    /// and rebuilding every leaderboard from the ledger.
    pub async fn load(config: Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let snapshot = match config.local_state_path.as_deref() {
            Some(path) => read_snapshot(path).await?,
            None => None,
        }
        .unwrap_or_default();

        let catalog = Arc::new(Catalog::restore(snapshot.quizzes, snapshot.next_quiz_id));
        let ledger = Arc::new(ScoreLedger::restore(catalog.clone(), snapshot.scores));
        let ranker = Arc::new(Ranker::default());
        for quiz in catalog.list().await {
            let top = ledger.list_top(quiz.id, LEADERBOARD_SIZE).await;
            if !top.is_empty() {
                ranker.rebuild(quiz.id, &top);
            }
        }

        Ok(Self {
            catalog,
            ledger,
            ranker,
            attempts: Arc::new(DashMap::new()),
            clock,
            config: Arc::new(config),
            persist_lock: Arc::new(Mutex::new(())),
            persist_signal: Arc::new(Notify::new()),
        })
    }

    pub async fn create_quiz(&self, quiz: NewQuiz) -> Result<Arc<Quiz>, QuizError> {
        let quiz = self.catalog.create(quiz).await.map_err(QuizError::Validation)?;
        info!(quiz_id = quiz.id, topic = %quiz.topic, questions = quiz.questions.len(), "quiz created");
        self.request_persist();
        Ok(quiz)
    }

    pub async fn get_quiz(&self, quiz_id: QuizId) -> Result<Arc<Quiz>, QuizError> {
        self.catalog.get(quiz_id).await.ok_or(QuizError::NotFound(quiz_id))
    }

    pub async fn list_quizzes(&self) -> Vec<QuizSummary> {
        self.catalog
            .list()
            .await
            .iter()
            .map(|q| QuizSummary::from(q.as_ref()))
            .collect()
    }

    /// Grades a complete answer sheet and records the score. Rejected
    /// submissions leave the ledger and the leaderboard untouched.
    pub async fn submit_attempt(
        &self,
        quiz_id: QuizId,
        taker: &str,
        answers: Vec<Answer>,
    ) -> Result<Submission, QuizError> {
        let taker = normalize_taker(taker)?;
        let quiz = self
            .catalog
            .get(quiz_id)
            .await
            .ok_or(QuizError::InvalidQuiz(quiz_id))?;
        if answers.len() != quiz.questions.len() {
            return Err(QuizError::MalformedAnswers {
                expected: quiz.questions.len(),
                actual: answers.len(),
            });
        }
        self.record_graded(&quiz, taker, &answers).await
    }

    pub async fn get_leaderboard(&self, quiz_id: QuizId) -> Result<Vec<LeaderboardEntry>, QuizError> {
        if !self.catalog.contains(quiz_id).await {
            return Err(QuizError::NotFound(quiz_id));
        }
        Ok(self.ranker.top(quiz_id).await)
    }

    pub async fn list_scores(&self, quiz_id: QuizId, limit: usize) -> Result<Vec<ScoreRecord>, QuizError> {
        if !self.catalog.contains(quiz_id).await {
            return Err(QuizError::NotFound(quiz_id));
        }
        Ok(self.ledger.list_top(quiz_id, limit).await)
    }

    pub async fn start_attempt(&self, quiz_id: QuizId, taker: &str) -> Result<AttemptView, QuizError> {
        let taker = normalize_taker(taker)?;
        let quiz = self
            .catalog
            .get(quiz_id)
            .await
            .ok_or(QuizError::InvalidQuiz(quiz_id))?;

        let now = self.clock.now();
        let mut attempt = Attempt::new(quiz, taker);
        attempt.start(now)?;
        let id = Uuid::new_v4();
        let view = attempt_view(id, &attempt, now);
        self.attempts.insert(
            id,
            Arc::new(Mutex::new(HostedAttempt {
                attempt,
                submission: None,
            })),
        );
        info!(attempt_id = %id, quiz_id, taker, "attempt started");
        Ok(view)
    }

    pub async fn attempt_status(&self, id: Uuid) -> Result<AttemptOutcome, QuizError> {
        self.drive(id, |_, _| Ok(())).await
    }

    pub async fn record_answer(&self, id: Uuid, answer: Answer) -> Result<AttemptOutcome, QuizError> {
        self.drive(id, |attempt, now| attempt.record(now, answer)).await
    }

    pub async fn next_question(&self, id: Uuid) -> Result<AttemptOutcome, QuizError> {
        self.drive(id, |attempt, now| attempt.next(now)).await
    }

    pub async fn previous_question(&self, id: Uuid) -> Result<AttemptOutcome, QuizError> {
        self.drive(id, |attempt, now| attempt.previous(now)).await
    }

    pub async fn finish_attempt(&self, id: Uuid) -> Result<AttemptOutcome, QuizError> {
        self.drive(id, |attempt, now| attempt.submit(now)).await
    }

    /// Drops an unfinished attempt. Nothing is recorded for it.
    pub fn abandon_attempt(&self, id: Uuid) -> Result<(), QuizError> {
        self.attempts
            .remove(&id)
            .ok_or(QuizError::AttemptNotFound(id))?;
        info!(attempt_id = %id, "attempt abandoned");
        Ok(())
    }

    /// Submits attempts whose last countdown ran out and drops the ones idle
    /// past the configured TTL.
    pub async fn sweep_attempts(&self) -> SweepReport {
        let now = self.clock.now();
        let ttl = self.config.attempt_ttl;
        let slots: Vec<(Uuid, AttemptSlot)> = self
            .attempts
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut report = SweepReport::default();
        for (id, slot) in slots {
            let mut hosted = slot.lock().await;
            if hosted.submission.is_some() {
                continue;
            }
            hosted.attempt.sync(now);
            if hosted.attempt.is_completed() {
                match self.settle(id, &mut hosted).await {
                    Ok(_) => report.submitted += 1,
                    Err(err) => warn!(attempt_id = %id, "failed to submit expired attempt: {}", err),
                }
            } else if now.saturating_sub(hosted.attempt.last_activity()) > ttl {
                self.attempts.remove(&id);
                info!(attempt_id = %id, "idle attempt discarded");
                report.discarded += 1;
            }
        }
        report
    }

    /// Waits until a change has been made that the snapshot does not cover yet.
    pub async fn persist_requested(&self) {
        self.persist_signal.notified().await;
    }

    pub async fn persist_core_data(&self) -> anyhow::Result<()> {
        let Some(path) = self.config.local_state_path.as_ref() else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock().await;
        let snapshot = PersistentSnapshot {
            quizzes: self
                .catalog
                .list()
                .await
                .iter()
                .map(|q| q.as_ref().clone())
                .collect(),
            scores: self.ledger.all().await,
            next_quiz_id: self.catalog.next_quiz_id(),
        };
        let serialized = serde_json::to_vec_pretty(&snapshot)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serialized).await?;
        Ok(())
    }

    async fn drive(
        &self,
        id: Uuid,
        op: impl FnOnce(&mut Attempt, Duration) -> Result<(), AttemptError>,
    ) -> Result<AttemptOutcome, QuizError> {
        let slot = self
            .attempts
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(QuizError::AttemptNotFound(id))?;
        let mut hosted = slot.lock().await;
        let now = self.clock.now();

        if hosted.submission.is_none() {
            hosted.attempt.sync(now);
            let result = op(&mut hosted.attempt, now);
            // Completion wins over whatever the action reported.
            if !hosted.attempt.is_completed() {
                result?;
                return Ok(AttemptOutcome::InProgress {
                    attempt: attempt_view(id, &hosted.attempt, now),
                });
            }
        }
        let submission = self.settle(id, &mut hosted).await?;
        Ok(AttemptOutcome::Completed { submission })
    }

    /// Records a completed attempt's score unless that already happened and
    /// drops it from the registry. Callers hold the attempt's lock.
    async fn settle(&self, id: Uuid, hosted: &mut HostedAttempt) -> Result<Submission, QuizError> {
        if let Some(submission) = &hosted.submission {
            return Ok(submission.clone());
        }
        let attempt = &hosted.attempt;
        let submission = self
            .record_graded(attempt.quiz(), attempt.taker(), attempt.answers())
            .await?;
        hosted.submission = Some(submission.clone());
        self.attempts.remove(&id);
        Ok(submission)
    }

    async fn record_graded(&self, quiz: &Quiz, taker: &str, answers: &[Answer]) -> Result<Submission, QuizError> {
        let grade = grade(quiz, answers);
        let record = self
            .ledger
            .append(NewScore {
                quiz_id: quiz.id,
                taker: taker.to_string(),
                score: grade.score,
            })
            .await?;
        let (rank, leaderboard) = self.ranker.record(&record).await;
        info!(
            quiz_id = quiz.id,
            taker = %record.taker,
            score = record.score,
            rank = ?rank,
            "score recorded"
        );
        self.request_persist();
        Ok(Submission {
            record,
            grade,
            rank,
            leaderboard,
        })
    }

    /// Wakes the background persister. Requests made while a write is
    /// running collapse into one follow-up write.
    fn request_persist(&self) {
        if self.config.local_state_path.is_some() {
            self.persist_signal.notify_one();
        }
    }
}

fn normalize_taker(taker: &str) -> Result<&str, QuizError> {
    let taker = taker.trim();
    if taker.is_empty() {
        return Err(QuizError::InvalidTaker);
    }
    Ok(taker)
}

fn attempt_view(id: Uuid, attempt: &Attempt, now: Duration) -> AttemptView {
    let quiz = attempt.quiz();
    AttemptView {
        id,
        quiz_id: quiz.id,
        taker: attempt.taker().to_string(),
        snapshot: attempt.snapshot(now),
        question: quiz.questions.get(attempt.cursor()).map(PublicQuestion::from),
    }
}

async fn read_snapshot(path: &Path) -> anyhow::Result<Option<PersistentSnapshot>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    let snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("local snapshot {} is not valid", path.display()))?;
    info!("restored local state from {}", path.display());
    Ok(Some(snapshot))
}
