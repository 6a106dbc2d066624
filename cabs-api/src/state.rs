use std::sync::Arc;
use cabs_booking::BookingService;
use cabs_core::CabRepository;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn CabRepository>,
    pub bookings: Arc<BookingService>,
    pub auth: AuthConfig,
}
