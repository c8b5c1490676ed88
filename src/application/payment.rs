use crate::domain::payment::{
    BillingMonth, NewPayment, Payment, PaymentRequest, PaymentSettlement, PaymentStatus,
    ReceiptCode, reference_number,
};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::{ClockRef, HostelStoreRef, PaymentGatewayRef, StkPush};
use crate::domain::session::Session;
use crate::error::{HostelError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub const PAYMENT_METHOD: &str = "mpesa";

/// How long and how often to ask the gateway about a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(120),
        }
    }
}

/// How a checkout ended, as far as this workflow observed it.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The gateway confirmed the payment and issued a receipt.
    Confirmed(ReceiptCode),
    /// The gateway reported failure or cancellation.
    Declined(String),
    /// No terminal answer arrived within the poll timeout.
    TimedOut(Duration),
}

impl Resolution {
    /// The user-facing error for an unsuccessful resolution.
    pub fn failure(&self) -> Option<HostelError> {
        match self {
            Self::Confirmed(_) => None,
            Self::Declined(reason) => Some(HostelError::GatewayError(format!(
                "payment was not completed: {reason}"
            ))),
            Self::TimedOut(waited) => Some(HostelError::Timeout(format!(
                "no payment confirmation after {}s",
                waited.as_secs()
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    /// The payment as re-read after settlement; always terminal.
    pub payment: Payment,
    pub resolution: Resolution,
}

/// Drives an STK push from initiation to a terminal payment record.
///
/// A payment only becomes `completed` after the gateway reported success with
/// a receipt code; declines and timeouts both settle it as `failed`.
pub struct PaymentWorkflow {
    store: HostelStoreRef,
    gateway: PaymentGatewayRef,
    clock: ClockRef,
    policy: PollPolicy,
}

impl PaymentWorkflow {
    pub fn new(
        store: HostelStoreRef,
        gateway: PaymentGatewayRef,
        clock: ClockRef,
        policy: PollPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            policy,
        }
    }

    #[instrument(skip(self, session, request), fields(student = %session.user_id, amount = %request.amount))]
    pub async fn pay(&self, session: &Session, request: PaymentRequest) -> Result<PaymentOutcome> {
        let student = session.user_id;
        let phone = PhoneNumber::normalize(&request.phone)?;
        let month = request
            .month
            .unwrap_or_else(|| BillingMonth::containing(self.clock.now()));

        if let Some(existing) = self.store.completed_payment_for(student, month).await? {
            return Err(HostelError::Conflict(format!(
                "payment for {month} has already been made (reference {})",
                existing.reference_number
            )));
        }

        let reference = reference_number(student, month, &request.description);
        let push = StkPush {
            amount: request.amount,
            phone,
            account_reference: reference.clone(),
            description: format!("Payment for: {}", request.description),
        };
        let ack = self.gateway.initiate(&push).await?;
        if !ack.is_accepted() {
            return Err(HostelError::GatewayError(format!(
                "payment initiation rejected ({}): {}",
                ack.response_code, ack.response_description
            )));
        }
        info!(checkout = %ack.checkout_request_id, %reference, "STK push accepted");

        let pending = self
            .store
            .insert_payment(NewPayment {
                student_id: student,
                amount: request.amount,
                status: PaymentStatus::Pending,
                payment_date: self.clock.now(),
                payment_method: PAYMENT_METHOD.to_string(),
                reference_number: reference.clone(),
                month,
                checkout_request_id: ack.checkout_request_id.clone(),
            })
            .await
            .map_err(|err| {
                HostelError::WriteError(format!("failed to create payment record: {err}"))
            })?;

        let resolution = self.await_confirmation(&ack.checkout_request_id).await;
        let settlement = match &resolution {
            Resolution::Confirmed(receipt) => PaymentSettlement::Completed {
                receipt: receipt.clone(),
                settled_at: self.clock.now(),
            },
            Resolution::Declined(_) | Resolution::TimedOut(_) => PaymentSettlement::Failed,
        };

        let rows = self
            .store
            .settle_payment(pending.id, &settlement, PaymentStatus::Pending)
            .await
            .map_err(|err| match &settlement {
                PaymentSettlement::Completed { .. } => HostelError::WriteError(format!(
                    "payment may have succeeded but its status could not be recorded; \
                     contact support with reference {reference}: {err}"
                )),
                PaymentSettlement::Failed => HostelError::WriteError(format!(
                    "failed to record failed payment {reference}: {err}"
                )),
            })?;
        if rows == 0 {
            return Err(HostelError::Conflict(format!(
                "payment {} was settled concurrently",
                pending.id
            )));
        }

        let payment = self
            .store
            .payment(pending.id)
            .await?
            .ok_or_else(|| HostelError::NotFound(format!("payment {}", pending.id)))?;

        match &resolution {
            Resolution::Confirmed(receipt) => {
                info!(payment_id = %payment.id, %receipt, "payment completed");
            }
            Resolution::Declined(_) | Resolution::TimedOut(_) => {
                error!(
                    payment_id = %payment.id,
                    %reference,
                    resolution = ?resolution,
                    "payment failed; the student must initiate a new payment"
                );
            }
        }

        Ok(PaymentOutcome {
            payment,
            resolution,
        })
    }

    /// Polls until the gateway gives a terminal answer or the timeout elapses.
    ///
    /// The final sleep is clipped to the remaining time so that a timeout is
    /// declared exactly at the deadline, after one last poll. A poll that does
    /// not answer within the remaining time (at least one interval) counts as
    /// still processing.
    async fn await_confirmation(&self, checkout_request_id: &str) -> Resolution {
        let started = self.clock.now();
        loop {
            let window = self.remaining(started).max(self.policy.interval);
            let answer = tokio::select! {
                biased;
                answer = self.gateway.poll_status(checkout_request_id) => Some(answer),
                _ = self.clock.sleep(window) => None,
            };
            match answer {
                Some(Ok(status)) if status.terminal && status.success => {
                    match status.receipt_code.and_then(ReceiptCode::new) {
                        Some(receipt) => return Resolution::Confirmed(receipt),
                        None => warn!(
                            checkout = checkout_request_id,
                            "gateway reported success without a receipt; still waiting"
                        ),
                    }
                }
                Some(Ok(status)) if status.terminal => {
                    return Resolution::Declined(
                        status
                            .description
                            .unwrap_or_else(|| "declined by the payment gateway".to_string()),
                    );
                }
                Some(Ok(_)) => debug!(checkout = checkout_request_id, "payment still processing"),
                Some(Err(err)) => warn!(
                    checkout = checkout_request_id,
                    error = %err,
                    "payment status poll failed; will retry"
                ),
                None => warn!(
                    checkout = checkout_request_id,
                    waited = ?window,
                    "payment status poll did not answer in time"
                ),
            }

            let remaining = self.remaining(started);
            if remaining.is_zero() {
                return Resolution::TimedOut(self.elapsed(started));
            }
            self.clock.sleep(self.policy.interval.min(remaining)).await;
        }
    }

    fn elapsed(&self, started: DateTime<Utc>) -> Duration {
        (self.clock.now() - started).to_std().unwrap_or_default()
    }

    fn remaining(&self, started: DateTime<Utc>) -> Duration {
        self.policy.timeout.saturating_sub(self.elapsed(started))
    }
}
