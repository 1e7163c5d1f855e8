//! Scripted Gateway
//!
//! In-memory gateway for demos and tests. Verification answers are played
//! back from a script; once the script runs out the last answer repeats.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{Authorization, PaymentGateway, TransactionStatus, Verification};
use crate::error::{PaymentError, Result};
use crate::intent::PaymentIntent;

/// One scripted verification answer
#[derive(Clone, Debug)]
enum Answer {
    Status(TransactionStatus),
    TransportError(String),
}

#[derive(Default)]
struct Script {
    answers: VecDeque<Answer>,
    last: Option<Answer>,
    init_failure: Option<String>,
    initialized: Vec<PaymentIntent>,
}

/// Gateway with scripted answers
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
    verify_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway whose verifications answer with `statuses`, in order
    pub fn with_statuses(statuses: impl IntoIterator<Item = TransactionStatus>) -> Self {
        let gateway = Self::new();
        for status in statuses {
            gateway.push_status(status);
        }
        gateway
    }

    /// Gateway that refuses to initialize transactions
    pub fn failing_init(message: impl Into<String>) -> Self {
        let gateway = Self::new();
        gateway.lock().init_failure = Some(message.into());
        gateway
    }

    pub fn push_status(&self, status: TransactionStatus) {
        self.lock().answers.push_back(Answer::Status(status));
    }

    /// Queue a transport failure for the next verification
    pub fn push_error(&self, message: impl Into<String>) {
        self.lock().answers.push_back(Answer::TransportError(message.into()));
    }

    /// Intents submitted through `initialize`
    pub fn initialized(&self) -> Vec<PaymentIntent> {
        self.lock().initialized.clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_answer(&self) -> Answer {
        let mut script = self.lock();
        match script.answers.pop_front() {
            Some(answer) => {
                script.last = Some(answer.clone());
                answer
            }
            None => script
                .last
                .clone()
                .unwrap_or(Answer::Status(TransactionStatus::Pending)),
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initialize(&self, intent: &PaymentIntent) -> Result<Authorization> {
        let mut script = self.lock();
        if let Some(message) = &script.init_failure {
            return Err(PaymentError::GatewayInit(message.clone()));
        }
        script.initialized.push(intent.clone());

        Ok(Authorization {
            authorization_url: format!("https://checkout.example.test/{}", intent.reference()),
            access_code: format!("access_{}", script.initialized.len()),
            reference: intent.reference().to_string(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<Verification> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);

        let status = match self.next_answer() {
            Answer::Status(status) => status,
            Answer::TransportError(message) => return Err(PaymentError::Gateway(message)),
        };

        let (amount, currency) = self
            .lock()
            .initialized
            .iter()
            .find(|i| i.reference() == reference)
            .map_or((Decimal::ZERO, "USD".to_string()), |i| {
                (i.total_amount(), i.currency().code().to_string())
            });

        Ok(Verification {
            reference: reference.to_string(),
            status,
            amount,
            currency,
            paid_at: None,
            gateway_response: status.is_failure().then(|| "Declined".to_string()),
            customer_email: None,
        })
    }

    fn name(&self) -> &str {
        "Scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_plays_back_then_repeats() {
        let gateway = ScriptedGateway::with_statuses([TransactionStatus::Pending, TransactionStatus::Success]);
        gateway.push_error("connection reset");

        assert_eq!(gateway.verify("r").await.unwrap().status, TransactionStatus::Pending);
        assert_eq!(gateway.verify("r").await.unwrap().status, TransactionStatus::Success);
        assert!(gateway.verify("r").await.is_err());
        assert!(gateway.verify("r").await.is_err());
        assert_eq!(gateway.verify_calls(), 4);
    }

    #[tokio::test]
    async fn test_empty_script_is_pending() {
        let gateway = ScriptedGateway::new();
        let verification = gateway.verify("r").await.unwrap();
        assert_eq!(verification.status, TransactionStatus::Pending);
    }
}
