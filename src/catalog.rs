use crate::models::{validate_quiz, NewQuiz, Quiz, QuizId, ValidationIssue};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read-mostly store of quiz definitions. A quiz never changes once created,
/// so readers share it through an `Arc`.
pub struct Catalog {
    quizzes: RwLock<HashMap<QuizId, Arc<Quiz>>>,
    next_quiz_id: AtomicI64,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::restore(Vec::new(), 1)
    }
}

impl Catalog {
    pub fn restore(quizzes: Vec<Quiz>, next_quiz_id: QuizId) -> Self {
        let next_quiz_id = next_quiz_id
            .max(quizzes.iter().map(|q| q.id).max().unwrap_or(0) + 1)
            .max(1);
        Self {
            quizzes: RwLock::new(quizzes.into_iter().map(|q| (q.id, Arc::new(q))).collect()),
            next_quiz_id: AtomicI64::new(next_quiz_id),
        }
    }

    pub fn next_quiz_id(&self) -> QuizId {
        self.next_quiz_id.load(Ordering::SeqCst)
    }

    pub async fn create(&self, quiz: NewQuiz) -> Result<Arc<Quiz>, Vec<ValidationIssue>> {
        validate_quiz(&quiz)?;
        let id = self.next_quiz_id.fetch_add(1, Ordering::SeqCst);
        let quiz = Arc::new(Quiz {
            id,
            creator: quiz.creator.trim().to_string(),
            topic: quiz.topic.trim().to_string(),
            questions: quiz.questions,
            created_at: Utc::now(),
        });
        self.quizzes.write().await.insert(id, quiz.clone());
        Ok(quiz)
    }

    pub async fn get(&self, id: QuizId) -> Option<Arc<Quiz>> {
        self.quizzes.read().await.get(&id).cloned()
    }

    pub async fn contains(&self, id: QuizId) -> bool {
        self.quizzes.read().await.contains_key(&id)
    }

    /// All quizzes ordered by id.
    pub async fn list(&self) -> Vec<Arc<Quiz>> {
        let mut quizzes: Vec<_> = self.quizzes.read().await.values().cloned().collect();
        quizzes.sort_by_key(|q| q.id);
        quizzes
    }
}
