use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use cabs_booking::BookingError;
use cabs_catalog::{CabDetailView, CabDetails, CatalogReader, CatalogState, DetailUpdate};
use cabs_core::notice::messages;
use cabs_core::{BookOutcome, Notice};
use cabs_shared::{Cab, CabId};
use futures_util::stream::{self, Stream};
use tracing::{error, info};

use crate::error::AppError;
use crate::middleware::auth::{guest_auth_middleware, GuestClaims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let actions = Router::new()
        .route("/v1/cabs/{id}/book", post(book_cab))
        .route("/v1/cabs/{id}/cancel", post(cancel_booking))
        .route_layer(axum::middleware::from_fn_with_state(state, guest_auth_middleware));

    Router::new()
        .route("/v1/cabs", get(list_cabs))
        .route("/v1/cabs/{id}", get(get_cab))
        .route("/v1/cabs/{id}/stream", get(stream_cab))
        .merge(actions)
}

/// Catalog screen gaining focus: always a fresh read
async fn list_cabs(State(state): State<AppState>) -> Result<Json<Vec<Cab>>, AppError> {
    let mut reader = CatalogReader::new(state.repo.clone());
    match reader.on_focus().await {
        CatalogState::Loaded(cabs) => Ok(Json(cabs.clone())),
        CatalogState::Failed(message) => Err(AppError::UnavailableError(message.clone())),
        CatalogState::Loading => Err(AppError::InternalServerError("catalog still loading".to_string())),
    }
}

async fn get_cab(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CabDetails>, AppError> {
    let id = CabId::from(id);
    match state.repo.get_cab(&id).await {
        Ok(Some(cab)) => Ok(Json(CabDetails::from(&cab))),
        Ok(None) => Err(AppError::NotFoundError(messages::CAB_NOT_FOUND.to_string())),
        Err(e) => {
            error!("Failed to read cab {}: {}", id, e);
            Err(AppError::UnavailableError(messages::DETAIL_FETCH_FAILED.to_string()))
        }
    }
}

/// Detail screen: pushes `cab` events on every change and `error` events for
/// missing documents or a failed listener. The listener is released when the
/// client disconnects.
async fn stream_cab(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let view = CabDetailView::open(state.repo.as_ref(), CabId::from(id)).await;
    if !view.is_listening() {
        let message = view
            .error()
            .map(|n| n.message.clone())
            .unwrap_or_else(|| messages::DETAIL_FETCH_FAILED.to_string());
        return Err(AppError::UnavailableError(message));
    }

    let events = stream::unfold(view, |mut view| async move {
        let event = match view.next_update().await? {
            DetailUpdate::Updated(cab) => Event::default().event("cab").json_data(CabDetails::from(&cab)),
            DetailUpdate::Missing(notice) | DetailUpdate::Failed(notice) => {
                Event::default().event("error").json_data(&notice)
            }
        };
        Some((event, view))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn book_cab(
    State(state): State<AppState>,
    Extension(claims): Extension<GuestClaims>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Notice>) {
    let id = CabId::from(id);
    let result = state.bookings.book(&id, Some(claims.sub.as_str())).await;

    let status = match &result {
        Ok(BookOutcome::Booked) | Ok(BookOutcome::AlreadyBooked) => StatusCode::OK,
        Ok(BookOutcome::LimitReached { .. }) => StatusCode::CONFLICT,
        Err(BookingError::NotFound(_)) => StatusCode::NOT_FOUND,
        Err(BookingError::Store(e)) => {
            error!("Booking cab {} failed: {}", id, e);
            StatusCode::BAD_GATEWAY
        }
    };
    (status, Json(cabs_booking::book_notice(&result)))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<GuestClaims>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Notice>) {
    let id = CabId::from(id);
    let result = state.bookings.cancel(&id, Some(claims.sub.as_str())).await;

    let status = match &result {
        Ok(()) => {
            info!("Cancel of cab {} requested by {}", id, claims.sub);
            StatusCode::OK
        }
        Err(BookingError::NotFound(_)) => StatusCode::NOT_FOUND,
        Err(BookingError::Store(e)) => {
            error!("Cancelling cab {} failed: {}", id, e);
            StatusCode::BAD_GATEWAY
        }
    };
    (status, Json(cabs_booking::cancel_notice(&result)))
}
