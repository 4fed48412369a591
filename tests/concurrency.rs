use futures::future::join_all;
use quizboard::models::{Answer, NewQuiz, Question, QuizOption};
use quizboard::{config::Config, routes::build_router, state::AppState, timer::ManualClock};
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use std::sync::Arc;

const QUESTIONS: usize = 30;

fn wide_quiz(topic: &str) -> NewQuiz {
    NewQuiz {
        creator: "Ada".into(),
        topic: topic.into(),
        questions: (0..QUESTIONS)
            .map(|i| Question {
                text: format!("q{i}"),
                options: vec![
                    QuizOption { text: "right".into(), is_correct: true },
                    QuizOption { text: "wrong".into(), is_correct: false },
                ],
                multi_correct: false,
                difficulty: Default::default(),
                time_limit_secs: 0,
            })
            .collect(),
    }
}

/// Answer sheet with exactly `correct` right answers.
fn sheet(correct: usize) -> Vec<Answer> {
    (0..QUESTIONS)
        .map(|i| Answer::Single(if i < correct { 0 } else { 1 }))
        .collect()
}

async fn state() -> AppState {
    AppState::load(Config::default(), Arc::new(ManualClock::default()))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_submissions_keep_exactly_the_ten_highest() {
    let state = state().await;
    let quiz_id = state.create_quiz(wide_quiz("Race")).await.unwrap().id;

    let mut takers: Vec<usize> = (1..=QUESTIONS).collect();
    takers.shuffle(&mut rand::thread_rng());
    let tasks = takers.into_iter().map(|correct| {
        let state = state.clone();
        tokio::spawn(async move {
            state
                .submit_attempt(quiz_id, &format!("t{correct}"), sheet(correct))
                .await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let board = state.get_leaderboard(quiz_id).await.unwrap();
    let scores: Vec<u32> = board.iter().map(|e| e.score).collect();
    let expected: Vec<u32> = (21..=30).rev().map(|c| c * 10).collect();
    assert_eq!(scores, expected);
    assert_eq!(state.ledger.list_for_quiz(quiz_id).await.len(), QUESTIONS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_submissions_keep_surviving_prior_entries() {
    let state = state().await;
    let quiz_id = state.create_quiz(wide_quiz("Prior")).await.unwrap().id;
    for correct in [30, 29, 3] {
        state
            .submit_attempt(quiz_id, &format!("early{correct}"), sheet(correct))
            .await
            .unwrap();
    }

    let tasks = (4..=20).map(|correct| {
        let state = state.clone();
        tokio::spawn(async move {
            state
                .submit_attempt(quiz_id, &format!("late{correct}"), sheet(correct))
                .await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let board = state.get_leaderboard(quiz_id).await.unwrap();
    let takers: Vec<&str> = board.iter().map(|e| e.taker.as_str()).collect();
    let mut expected = vec!["early30".to_string(), "early29".to_string()];
    expected.extend((13..=20).rev().map(|c| format!("late{c}")));
    assert_eq!(takers, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn quizzes_update_independently_under_load() {
    let state = state().await;
    let a = state.create_quiz(wide_quiz("A")).await.unwrap();
    let b = state.create_quiz(wide_quiz("B")).await.unwrap();

    let tasks = (1..=QUESTIONS).flat_map(|correct| {
        [a.id, b.id].map(|quiz_id| {
            let state = state.clone();
            tokio::spawn(async move {
                state
                    .submit_attempt(quiz_id, &format!("t{correct}"), sheet(correct))
                    .await
            })
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let board_a = state.get_leaderboard(a.id).await.unwrap();
    let board_b = state.get_leaderboard(b.id).await.unwrap();
    assert_eq!(board_a, board_b);
    assert_eq!(board_a.len(), 10);
    assert_eq!(board_a[0].score, 300);
    let ledger = state.ledger.all().await;
    assert!(ledger.iter().filter(|r| r.quiz_id == a.id).all(|r| r.topic == "A"));
    assert_eq!(ledger.len(), 2 * QUESTIONS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_http_submissions() {
    let state = state().await;
    let quiz = state.create_quiz(wide_quiz("Http")).await.unwrap();
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let base = format!("http://{}", addr);
    let client = reqwest::Client::new();

    let requests = (1..=QUESTIONS).map(|correct| {
        let client = client.clone();
        let url = format!("{}/api/v1/quizzes/{}/submissions", base, quiz.id);
        async move {
            client
                .post(url)
                .json(&json!({"taker": format!("t{correct}"), "answers": sheet(correct)}))
                .send()
                .await
                .unwrap()
                .status()
        }
    });
    for status in join_all(requests).await {
        assert_eq!(status, 201);
    }

    let board = client
        .get(format!("{}/api/v1/quizzes/{}/leaderboard", base, quiz.id))
        .send()
        .await
        .unwrap()
        .json::<Vec<Value>>()
        .await
        .unwrap();
    let scores: Vec<u64> = board.iter().map(|e| e["score"].as_u64().unwrap()).collect();
    assert_eq!(scores, (21..=30).rev().map(|c| c * 10).collect::<Vec<u64>>());
}
