use crate::error::{HostelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const COUNTRY_CODE: &str = "254";
const SUBSCRIBER_DIGITS: usize = 9;

/// A mobile number in the canonical `254XXXXXXXXX` form the gateway expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalizes user input such as `0712 345 678` or `+254712345678`.
    ///
    /// Non-digits are stripped, a leading trunk `0` is replaced by the country
    /// code and a bare subscriber number is prefixed with it.
    pub fn normalize(input: &str) -> Result<Self> {
        let digits: String = input.chars().filter(char::is_ascii_digit).collect();

        let canonical = if let Some(rest) = digits.strip_prefix('0') {
            format!("{COUNTRY_CODE}{rest}")
        } else if digits.starts_with(COUNTRY_CODE) {
            digits
        } else {
            format!("{COUNTRY_CODE}{digits}")
        };

        let valid = canonical.len() == COUNTRY_CODE.len() + SUBSCRIBER_DIGITS
            && canonical.starts_with(COUNTRY_CODE);
        if !valid {
            return Err(HostelError::ValidationError(format!(
                "'{input}' is not a valid phone number (e.g. 0712345678 or 254712345678)"
            )));
        }

        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = HostelError;

    fn try_from(value: String) -> Result<Self> {
        Self::normalize(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}
