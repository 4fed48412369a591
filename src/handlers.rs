use crate::error::{AppError, ErrorDetail};
use crate::models::{Answer, LeaderboardEntry, NewQuiz, PublicQuiz, Question, QuizId, QuizSummary, ScoreRecord};
use crate::state::{AppState, AttemptOutcome, AttemptView, Submission};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

const DEFAULT_SCORES_LIMIT: usize = 10;
const MAX_SCORES_LIMIT: usize = 100;

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn validation_error(errors: ValidationErrors, req_id: String) -> AppError {
    let details = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| ErrorDetail {
                field: field.to_string(),
                issue: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();
    AppError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "request validation failed", req_id)
        .with_details(details)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizPayload {
    #[validate(length(min = 1, max = 120, message = "must be 1-120 characters"))]
    pub quiz_creator: String,
    #[validate(length(min = 1, max = 120, message = "must be 1-120 characters"))]
    pub topic: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Serialize)]
pub struct QuizIdResponse {
    pub quiz_id: QuizId,
}

pub async fn create_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateQuizPayload>,
) -> Result<(StatusCode, Json<QuizIdResponse>), AppError> {
    let req_id = request_id_from_headers(&headers);
    payload
        .validate()
        .map_err(|e| validation_error(e, req_id.clone()))?;

    let quiz = NewQuiz {
        creator: payload.quiz_creator,
        topic: payload.topic,
        questions: payload.questions,
    };
    let quiz = state
        .create_quiz(quiz)
        .await
        .map_err(|e| AppError::from_quiz(e, req_id))?;
    Ok((StatusCode::CREATED, Json(QuizIdResponse { quiz_id: quiz.id })))
}

#[derive(Debug, Serialize)]
pub struct QuizListResponse {
    pub items: Vec<QuizSummary>,
    pub total: usize,
}

pub async fn list_quizzes(State(state): State<AppState>) -> Json<QuizListResponse> {
    let items = state.list_quizzes().await;
    Json(QuizListResponse { total: items.len(), items })
}

#[derive(Debug, Deserialize)]
pub struct QuizViewQuery {
    pub view: Option<String>,
}

/// Full definition for the author, or `?view=taker` for the copy without
/// correctness flags.
pub async fn get_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<QuizId>,
    Query(query): Query<QuizViewQuery>,
) -> Result<Response, AppError> {
    let req_id = request_id_from_headers(&headers);
    let quiz = state
        .get_quiz(id)
        .await
        .map_err(|e| AppError::from_quiz(e, req_id))?;
    match query.view.as_deref() {
        Some("taker") => Ok(Json(PublicQuiz::from(quiz.as_ref())).into_response()),
        _ => Ok(Json(quiz.as_ref().clone()).into_response()),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptPayload {
    #[serde(alias = "userId")]
    #[validate(length(min = 1, max = 64, message = "must be 1-64 characters"))]
    pub taker: String,
    pub answers: Vec<Answer>,
}

pub async fn submit_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<QuizId>,
    Json(payload): Json<SubmitAttemptPayload>,
) -> Result<(StatusCode, Json<Submission>), AppError> {
    let req_id = request_id_from_headers(&headers);
    payload
        .validate()
        .map_err(|e| validation_error(e, req_id.clone()))?;
    let submission = state
        .submit_attempt(id, &payload.taker, payload.answers)
        .await
        .map_err(|e| AppError::from_quiz(e, req_id))?;
    Ok((StatusCode::CREATED, Json(submission)))
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<QuizId>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let leaderboard = state
        .get_leaderboard(id)
        .await
        .map_err(|e| AppError::from_quiz(e, req_id))?;
    Ok(Json(leaderboard))
}

#[derive(Debug, Deserialize)]
pub struct ScoresQuery {
    pub limit: Option<usize>,
}

pub async fn list_scores(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<QuizId>,
    Query(query): Query<ScoresQuery>,
) -> Result<Json<Vec<ScoreRecord>>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let limit = query.limit.unwrap_or(DEFAULT_SCORES_LIMIT).min(MAX_SCORES_LIMIT);
    let scores = state
        .list_scores(id, limit)
        .await
        .map_err(|e| AppError::from_quiz(e, req_id))?;
    Ok(Json(scores))
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartAttemptPayload {
    #[validate(length(min = 1, max = 64, message = "must be 1-64 characters"))]
    pub taker: String,
}

pub async fn start_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<QuizId>,
    Json(payload): Json<StartAttemptPayload>,
) -> Result<(StatusCode, Json<AttemptView>), AppError> {
    let req_id = request_id_from_headers(&headers);
    payload
        .validate()
        .map_err(|e| validation_error(e, req_id.clone()))?;
    let view = state
        .start_attempt(id, &payload.taker)
        .await
        .map_err(|e| AppError::from_quiz(e, req_id))?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AttemptOutcome>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let outcome = state
        .attempt_status(id)
        .await
        .map_err(|e| AppError::from_quiz(e, req_id))?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct AnswerPayload {
    pub answer: Answer,
}

pub async fn record_answer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerPayload>,
) -> Result<Json<AttemptOutcome>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let outcome = state
        .record_answer(id, payload.answer)
        .await
        .map_err(|e| AppError::from_quiz(e, req_id))?;
    Ok(Json(outcome))
}

pub async fn next_question(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AttemptOutcome>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let outcome = state
        .next_question(id)
        .await
        .map_err(|e| AppError::from_quiz(e, req_id))?;
    Ok(Json(outcome))
}

pub async fn previous_question(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AttemptOutcome>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let outcome = state
        .previous_question(id)
        .await
        .map_err(|e| AppError::from_quiz(e, req_id))?;
    Ok(Json(outcome))
}

pub async fn finish_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AttemptOutcome>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let outcome = state
        .finish_attempt(id)
        .await
        .map_err(|e| AppError::from_quiz(e, req_id))?;
    Ok(Json(outcome))
}

pub async fn abandon_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let req_id = request_id_from_headers(&headers);
    state
        .abandon_attempt(id)
        .map_err(|e| AppError::from_quiz(e, req_id))?;
    Ok(StatusCode::NO_CONTENT)
}
