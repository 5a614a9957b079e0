use serde::{Deserialize, Serialize};

/// Contact and shipping fields exactly as submitted.
///
/// Missing fields deserialize as empty strings so a partially filled form can
/// always be echoed back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderForm {
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
    pub email: String,
    pub description: String,
}

impl OrderForm {
    /// Apply the pre-validation normalization rules.
    ///
    /// Runs unconditionally, even when the form will go on to fail validation,
    /// so the redisplayed form shows the normalized values.
    pub fn normalized(mut self) -> Self {
        self.state = normalize_state(&self.state);
        self.email = normalize_email(&self.email);
        self.phone = normalize_phone(&self.phone);
        self.zip = self.zip.trim().to_string();
        self
    }
}

pub fn normalize_state(raw: &str) -> String {
    raw.to_uppercase().trim().to_string()
}

pub fn normalize_email(raw: &str) -> String {
    raw.to_lowercase().trim().to_string()
}

/// Strip everything that is not an ASCII digit.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
