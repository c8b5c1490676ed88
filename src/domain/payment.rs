use super::{PaymentId, StudentId};
use crate::error::{HostelError, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents a positive monetary amount in Kenyan shillings.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(HostelError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = HostelError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KSh {}", self.0.normalize())
    }
}

/// The `YYYY-MM` period a payment settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingMonth {
    year: i32,
    month: u32,
}

impl BillingMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(HostelError::ValidationError(format!(
                "{year}-{month:02} is not a valid billing month"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn containing(instant: DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }

    /// `YYYYMM`, as embedded in payment reference numbers.
    pub fn compact(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BillingMonth {
    type Err = HostelError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || HostelError::ValidationError(format!("'{s}' is not a YYYY-MM month"));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for BillingMonth {
    type Error = HostelError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BillingMonth> for String {
    fn from(month: BillingMonth) -> Self {
        month.to_string()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gateway-issued receipt code. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptCode(String);

impl ReceiptCode {
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub student_id: StudentId,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub payment_date: DateTime<Utc>,
    pub payment_method: String,
    pub reference_number: String,
    pub month: BillingMonth,
    pub checkout_request_id: String,
    #[serde(default)]
    pub transaction_code: Option<String>,
}

/// Payment row as submitted for insertion; always starts `pending`.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct NewPayment {
    pub student_id: StudentId,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub payment_date: DateTime<Utc>,
    pub payment_method: String,
    pub reference_number: String,
    pub month: BillingMonth,
    pub checkout_request_id: String,
}

/// The only two ways a pending payment may leave `pending`.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentSettlement {
    Completed {
        receipt: ReceiptCode,
        settled_at: DateTime<Utc>,
    },
    Failed,
}

impl Payment {
    /// Applies a settlement, refusing any transition out of a terminal state.
    pub fn settle(&mut self, settlement: &PaymentSettlement) -> Result<()> {
        if self.status.is_terminal() {
            return Err(HostelError::Conflict(format!(
                "payment {} is already {}",
                self.id, self.status
            )));
        }
        match settlement {
            PaymentSettlement::Completed {
                receipt,
                settled_at,
            } => {
                self.status = PaymentStatus::Completed;
                self.payment_date = *settled_at;
                self.transaction_code = Some(receipt.as_str().to_string());
            }
            PaymentSettlement::Failed => {
                self.status = PaymentStatus::Failed;
                self.transaction_code = None;
            }
        }
        Ok(())
    }
}

/// A billable item in the monthly statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Charge {
    RoomRent,
    Wifi,
    Electricity,
    Water,
    GymBasic,
    GymPremium,
    MealPlan,
    Maintenance,
}

impl Charge {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomRent => "Room Rent",
            Self::Wifi => "WiFi",
            Self::Electricity => "Electricity",
            Self::Water => "Water",
            Self::GymBasic => "Gym (Basic Plan)",
            Self::GymPremium => "Gym (Premium Plan)",
            Self::MealPlan => "Meal Plan",
            Self::Maintenance => "Maintenance",
        }
    }

    /// Flat monthly price; room rent is priced by the allocated room instead.
    pub fn flat_price(&self) -> Option<Decimal> {
        match self {
            Self::RoomRent => None,
            Self::Wifi => Some(dec!(1000)),
            Self::Electricity => Some(dec!(500)),
            Self::Water => Some(dec!(300)),
            Self::GymBasic => Some(dec!(800)),
            Self::GymPremium => Some(dec!(1200)),
            Self::MealPlan => Some(dec!(3000)),
            Self::Maintenance => Some(dec!(500)),
        }
    }
}

/// Input to the payment workflow.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub amount: Amount,
    /// Raw phone input; normalized by the workflow.
    pub phone: String,
    pub description: String,
    /// Defaults to the current month when absent.
    pub month: Option<BillingMonth>,
}

impl PaymentRequest {
    pub fn new(amount: Amount, phone: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            amount,
            phone: phone.into(),
            description: description.into(),
            month: None,
        }
    }

    pub fn for_month(mut self, month: BillingMonth) -> Self {
        self.month = Some(month);
        self
    }
}

/// `PAY-<first 4 of student id>-<YYYYMM>-<description>`, upper-cased.
pub fn reference_number(student: StudentId, month: BillingMonth, description: &str) -> String {
    let student = student.to_string();
    let prefix: String = student.chars().take(4).collect();
    format!("PAY-{prefix}-{}-{description}", month.compact()).to_uppercase()
}
