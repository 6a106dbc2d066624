pub mod list;
pub mod service;

pub use list::{booked_subset, BookingListUpdate, BookingListView, BookingScope};
pub use service::{book_notice, cancel_notice, BookingError, BookingService};
