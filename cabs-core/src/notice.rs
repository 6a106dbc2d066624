use serde::Serialize;

/// User-visible strings shared by the screens
pub mod messages {
    pub const CATALOG_FETCH_FAILED: &str = "Failed to fetch cabs";
    pub const CAB_NOT_FOUND: &str = "Cab not found!";
    pub const DETAIL_FETCH_FAILED: &str = "Failed to fetch cab details.";
    pub const BOOKINGS_FETCH_FAILED: &str = "Failed to fetch booked cabs.";
    pub const BOOK_SUCCEEDED: &str = "Cab has been booked successfully.";
    pub const BOOK_FAILED: &str = "Failed to book the cab.";
    pub const ALREADY_BOOKED: &str = "This cab is already booked.";
    pub const CANCEL_SUCCEEDED: &str = "Booking has been cancelled.";
    pub const CANCEL_FAILED: &str = "Failed to cancel the booking.";
    pub const LIMIT_REACHED_TITLE: &str = "Booking Limit Reached";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// Transient message shown to the user after an action or a failed read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: "Success".to_string(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "Error".to_string(),
            message: message.into(),
        }
    }

    /// Business-rule rejection, shown the same way as a failure alert
    pub fn limit_reached(limit: usize) -> Self {
        let noun = if limit == 1 { "cab" } else { "cabs" };
        Self {
            level: NoticeLevel::Error,
            title: messages::LIMIT_REACHED_TITLE.to_string(),
            message: format!("You can only book up to {} {} at a time.", count_word(limit), noun),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

fn count_word(n: usize) -> String {
    const WORDS: [&str; 11] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    ];
    WORDS.get(n).map(|w| w.to_string()).unwrap_or_else(|| n.to_string())
}
