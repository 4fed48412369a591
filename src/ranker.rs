//! Bounded per-quiz leaderboards.
//!
//! Each quiz owns one [`TopK`] behind its own mutex, so submissions for the
//! same quiz serialize while different quizzes never contend.

use crate::models::{LeaderboardEntry, QuizId, ScoreRecord};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const LEADERBOARD_SIZE: usize = 10;

#[derive(Debug, Clone)]
struct Ranked {
    seq: u64,
    entry: LeaderboardEntry,
}

/// Sorted container holding at most `capacity` entries.
///
/// Entries are ordered by score descending, then by ledger sequence ascending,
/// so an earlier record beats a later one with the same score.
#[derive(Debug, Clone)]
pub struct TopK {
    capacity: usize,
    ranked: Vec<Ranked>,
}

impl TopK {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ranked: Vec::with_capacity(capacity + 1),
        }
    }

    /// Inserts the record and returns its zero-based rank, or `None` when it
    /// did not make the cut.
    pub fn insert(&mut self, record: &ScoreRecord) -> Option<usize> {
        let pos = self.ranked.partition_point(|r| {
            r.entry.score > record.score || (r.entry.score == record.score && r.seq < record.id)
        });
        if pos >= self.capacity {
            return None;
        }
        self.ranked.insert(
            pos,
            Ranked {
                seq: record.id,
                entry: LeaderboardEntry::from(record),
            },
        );
        self.ranked.truncate(self.capacity);
        Some(pos)
    }

    pub fn entries(&self) -> Vec<LeaderboardEntry> {
        self.ranked.iter().map(|r| r.entry.clone()).collect()
    }
}

#[derive(Default)]
pub struct Ranker {
    boards: DashMap<QuizId, Arc<Mutex<TopK>>>,
}

impl Ranker {
    fn board(&self, quiz_id: QuizId) -> Arc<Mutex<TopK>> {
        // Clone the handle so the map shard is released before awaiting the lock.
        self.boards
            .entry(quiz_id)
            .or_insert_with(|| Arc::new(Mutex::new(TopK::new(LEADERBOARD_SIZE))))
            .value()
            .clone()
    }

    /// Folds a new record into its quiz's leaderboard and returns the board
    /// as it stands after the update.
    pub async fn record(&self, record: &ScoreRecord) -> (Option<usize>, Vec<LeaderboardEntry>) {
        let board = self.board(record.quiz_id);
        let mut board = board.lock().await;
        let rank = board.insert(record);
        (rank, board.entries())
    }

    pub async fn top(&self, quiz_id: QuizId) -> Vec<LeaderboardEntry> {
        let Some(board) = self.boards.get(&quiz_id).map(|b| b.value().clone()) else {
            return Vec::new();
        };
        let board = board.lock().await;
        board.entries()
    }

    /// Replaces the quiz's board with one built from ledger records.
    pub fn rebuild<'a>(&self, quiz_id: QuizId, records: impl IntoIterator<Item = &'a ScoreRecord>) {
        let mut top = TopK::new(LEADERBOARD_SIZE);
        for record in records {
            top.insert(record);
        }
        self.boards.insert(quiz_id, Arc::new(Mutex::new(top)));
    }
}
