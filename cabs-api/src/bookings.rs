use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use cabs_booking::{BookingListUpdate, BookingListView, BookingScope};
use cabs_core::notice::messages;
use cabs_shared::Cab;
use futures_util::stream::{self, Stream};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::auth::decode_bearer;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct BookingsQuery {
    /// `mine` restricts the list to the bearer's own bookings
    pub scope: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", get(list_bookings))
        .route("/v1/bookings/stream", get(stream_bookings))
}

fn resolve_scope(state: &AppState, headers: &HeaderMap, query: &BookingsQuery) -> Result<BookingScope, AppError> {
    match query.scope.as_deref() {
        None | Some("all") => Ok(BookingScope::All),
        Some("mine") => {
            let claims = decode_bearer(headers, &state.auth.secret)
                .map_err(|_| AppError::AuthenticationError("Invalid token".to_string()))?
                .ok_or_else(|| AppError::AuthenticationError("Token required for scope=mine".to_string()))?;
            Ok(BookingScope::Requester(claims.sub))
        }
        Some(other) => Err(AppError::ValidationError(format!("Unknown scope: {}", other))),
    }
}

async fn open_view(state: &AppState, scope: BookingScope) -> Result<BookingListView, AppError> {
    let view = BookingListView::open(state.repo.as_ref(), scope).await;
    if let Some(message) = view.error() {
        return Err(AppError::UnavailableError(message.to_string()));
    }
    Ok(view)
}

/// Current booked list: the first snapshot of a booking list subscription
async fn list_bookings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Cab>>, AppError> {
    let scope = resolve_scope(&state, &headers, &query)?;
    let mut view = open_view(&state, scope).await?;

    match view.next_update().await {
        Some(BookingListUpdate::Refreshed(booked)) => Ok(Json(booked)),
        Some(BookingListUpdate::Failed(message)) => Err(AppError::UnavailableError(message)),
        None => Err(AppError::UnavailableError(messages::BOOKINGS_FETCH_FAILED.to_string())),
    }
}

/// Bookings screen: a `bookings` event with the full list on every change
async fn stream_bookings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let scope = resolve_scope(&state, &headers, &query)?;
    let view = open_view(&state, scope).await?;

    let events = stream::unfold(view, |mut view| async move {
        let event = match view.next_update().await? {
            BookingListUpdate::Refreshed(booked) => Event::default().event("bookings").json_data(&booked),
            BookingListUpdate::Failed(message) => Event::default()
                .event("error")
                .json_data(serde_json::json!({ "error": message })),
        };
        Some((event, view))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
