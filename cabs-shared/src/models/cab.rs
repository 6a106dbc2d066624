use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Store-assigned document identifier, stable for the document's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CabId(String);

impl CabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier, used by stores when a document is created
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CabId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CabId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Booking status of a cab. Stored as a plain boolean (`true` = booked).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum CabStatus {
    #[default]
    Available,
    Booked,
}

impl CabStatus {
    pub fn is_booked(self) -> bool {
        matches!(self, CabStatus::Booked)
    }

    pub fn label(self) -> &'static str {
        match self {
            CabStatus::Available => "Available",
            CabStatus::Booked => "Booked",
        }
    }
}

impl From<bool> for CabStatus {
    fn from(booked: bool) -> Self {
        if booked {
            CabStatus::Booked
        } else {
            CabStatus::Available
        }
    }
}

impl From<CabStatus> for bool {
    fn from(status: CabStatus) -> Self {
        status.is_booked()
    }
}

impl fmt::Display for CabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A cab document as read from the `cabs` collection, tagged with its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cab {
    pub id: CabId,
    pub company_name: String,
    pub car_model: String,
    pub passenger_capacity: u32,
    pub rating: f64,
    pub cost_per_hour: f64,
    #[serde(default)]
    pub status: CabStatus,
    /// Requester holding the booking, if the booking was made with one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked_by: Option<String>,
}

impl Cab {
    pub fn from_new(id: CabId, new: NewCab) -> Self {
        Self {
            id,
            company_name: new.company_name,
            car_model: new.car_model,
            passenger_capacity: new.passenger_capacity,
            rating: new.rating,
            cost_per_hour: new.cost_per_hour,
            status: new.status,
            booked_by: new.booked_by,
        }
    }

    pub fn is_booked(&self) -> bool {
        self.status.is_booked()
    }

    /// Cost per hour as shown on the detail screen, e.g. `$45.00`
    pub fn cost_label(&self) -> String {
        format!("${:.2}", self.cost_per_hour)
    }

    pub fn is_booked_by(&self, requester: &str) -> bool {
        self.is_booked() && self.booked_by.as_deref() == Some(requester)
    }
}

/// Document body used for out-of-band seeding; the store assigns the id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCab {
    pub company_name: String,
    pub car_model: String,
    pub passenger_capacity: u32,
    pub rating: f64,
    pub cost_per_hour: f64,
    #[serde(default)]
    pub status: CabStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked_by: Option<String>,
}

impl NewCab {
    pub fn new(company_name: impl Into<String>, car_model: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            car_model: car_model.into(),
            passenger_capacity: 4,
            rating: 0.0,
            cost_per_hour: 0.0,
            status: CabStatus::Available,
            booked_by: None,
        }
    }

    pub fn with_capacity(mut self, passenger_capacity: u32) -> Self {
        self.passenger_capacity = passenger_capacity;
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_cost(mut self, cost_per_hour: f64) -> Self {
        self.cost_per_hour = cost_per_hour;
        self
    }

    pub fn booked(mut self) -> Self {
        self.status = CabStatus::Booked;
        self
    }
}
