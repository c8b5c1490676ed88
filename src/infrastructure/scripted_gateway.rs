use crate::domain::ports::{PaymentGateway, PollStatus, StkPush, StkPushAck};
use crate::error::{HostelError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// An in-memory gateway that replays scripted answers.
///
/// Poll answers are consumed in order; once the script runs out every poll
/// reports the fallback status (in progress unless changed).
#[derive(Clone)]
pub struct ScriptedGateway {
    inner: Arc<Mutex<Script>>,
}

struct Script {
    ack: StkPushAck,
    polls: VecDeque<std::result::Result<PollStatus, String>>,
    fallback: PollStatus,
    pushes: Vec<StkPush>,
    poll_count: usize,
}

impl ScriptedGateway {
    /// A gateway that accepts every push with the given checkout handle.
    pub fn accepting(checkout_request_id: &str) -> Self {
        Self::with_ack(StkPushAck {
            response_code: StkPushAck::ACCEPTED.to_string(),
            checkout_request_id: checkout_request_id.to_string(),
            response_description: "Success. Request accepted for processing".to_string(),
        })
    }

    pub fn with_ack(ack: StkPushAck) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Script {
                ack,
                polls: VecDeque::new(),
                fallback: PollStatus::in_progress(),
                pushes: Vec::new(),
                poll_count: 0,
            })),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn then_poll(self, status: PollStatus) -> Self {
        self.script().polls.push_back(Ok(status));
        self
    }

    /// Queues a transport failure for the next poll.
    pub fn then_poll_error(self, message: &str) -> Self {
        self.script().polls.push_back(Err(message.to_string()));
        self
    }

    pub fn otherwise(self, status: PollStatus) -> Self {
        self.script().fallback = status;
        self
    }

    pub fn pushes(&self) -> Vec<StkPush> {
        self.script().pushes.clone()
    }

    pub fn poll_count(&self) -> usize {
        self.script().poll_count
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initiate(&self, push: &StkPush) -> Result<StkPushAck> {
        let mut script = self.script();
        script.pushes.push(push.clone());
        Ok(script.ack.clone())
    }

    async fn poll_status(&self, _checkout_request_id: &str) -> Result<PollStatus> {
        let mut script = self.script();
        script.poll_count += 1;
        match script.polls.pop_front() {
            Some(Ok(status)) => Ok(status),
            Some(Err(message)) => Err(HostelError::GatewayError(message)),
            None => Ok(script.fallback.clone()),
        }
    }
}
