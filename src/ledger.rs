//! Append-only record of every graded attempt.
//!
//! The ledger is the source of truth for scores; leaderboards are derived from
//! it and can always be rebuilt with [`ScoreLedger::list_top`].

use crate::catalog::Catalog;
use crate::error::QuizError;
use crate::models::{QuizId, ScoreRecord};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct NewScore {
    pub quiz_id: QuizId,
    pub taker: String,
    pub score: u32,
}

#[derive(Default)]
struct Records {
    next_id: u64,
    by_quiz: HashMap<QuizId, Vec<ScoreRecord>>,
}

pub struct ScoreLedger {
    catalog: Arc<Catalog>,
    records: RwLock<Records>,
}

impl ScoreLedger {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::restore(catalog, Vec::new())
    }

    pub fn restore(catalog: Arc<Catalog>, mut records: Vec<ScoreRecord>) -> Self {
        records.sort_by_key(|r| r.id);
        let next_id = records.last().map(|r| r.id + 1).unwrap_or(1);
        let mut by_quiz: HashMap<QuizId, Vec<ScoreRecord>> = HashMap::new();
        for record in records {
            by_quiz.entry(record.quiz_id).or_default().push(record);
        }
        Self {
            catalog,
            records: RwLock::new(Records { next_id, by_quiz }),
        }
    }

    pub async fn append(&self, score: NewScore) -> Result<ScoreRecord, QuizError> {
        let quiz = self
            .catalog
            .get(score.quiz_id)
            .await
            .ok_or(QuizError::InvalidReference(score.quiz_id))?;

        let mut records = self.records.write().await;
        let record = ScoreRecord {
            id: records.next_id.max(1),
            quiz_id: quiz.id,
            taker: score.taker,
            topic: quiz.topic.clone(),
            score: score.score,
            created_at: Utc::now(),
        };
        records.next_id = record.id + 1;
        records
            .by_quiz
            .entry(quiz.id)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    /// Highest scores first; equal scores keep ledger order.
    pub async fn list_top(&self, quiz_id: QuizId, limit: usize) -> Vec<ScoreRecord> {
        let mut records = self.list_for_quiz(quiz_id).await;
        records.sort_by(|a, b| b.score.cmp(&a.score));
        records.truncate(limit);
        records
    }

    /// Every record for the quiz in append order.
    pub async fn list_for_quiz(&self, quiz_id: QuizId) -> Vec<ScoreRecord> {
        self.records
            .read()
            .await
            .by_quiz
            .get(&quiz_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn all(&self) -> Vec<ScoreRecord> {
        let records = self.records.read().await;
        let mut all: Vec<_> = records.by_quiz.values().flatten().cloned().collect();
        all.sort_by_key(|r| r.id);
        all
    }
}
