//! External collaborator contracts: email delivery and checkout sessions.
//!
//! The real providers live outside this process; these traits pin down the
//! narrow surface the handlers need, with in-process implementations for
//! development and tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use uuid::Uuid;

use trekly_core::{DomainError, DomainResult};

#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: Email) -> DomainResult<()>;
}

/// Development mailer: logs instead of delivering.
pub struct LoggingMailer;

impl Mailer for LoggingMailer {
    fn send(&self, email: Email) -> DomainResult<()> {
        tracing::info!(to = %email.to, subject = %email.subject, "sending email");
        Ok(())
    }
}

/// Test mailer: captures outgoing mail and can simulate one delivery failure.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail_next: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Make the next `send` fail, to exercise rollback paths.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: Email) -> DomainResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DomainError::internal("smtp connection refused"));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(email);
        Ok(())
    }
}

/// What the checkout provider needs to open a session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Our reference for reconciliation (the tour id).
    pub reference: String,
    pub name: String,
    pub amount: f64,
    pub currency: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// What comes back: where to send the customer.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

pub trait PaymentGateway: Send + Sync {
    fn create_checkout_session(&self, request: CheckoutRequest) -> DomainResult<CheckoutSession>;
}

/// Development gateway: mints a session pointing at a placeholder host.
#[derive(Default)]
pub struct FakePaymentGateway;

impl PaymentGateway for FakePaymentGateway {
    fn create_checkout_session(&self, request: CheckoutRequest) -> DomainResult<CheckoutSession> {
        let id = format!("cs_{}", Uuid::now_v7().simple());
        tracing::debug!(reference = %request.reference, amount = request.amount, "fake checkout session");
        Ok(CheckoutSession {
            url: format!("https://checkout.invalid/pay/{id}"),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_mailer_captures_and_fails_once() {
        let mailer = RecordingMailer::default();
        mailer.fail_next();
        let email = Email {
            to: "a@b.com".to_string(),
            subject: "hi".to_string(),
            body: "there".to_string(),
        };
        assert!(mailer.send(email.clone()).is_err());
        assert!(mailer.send(email).is_ok());
        assert_eq!(mailer.sent().len(), 1);
    }

    #[test]
    fn fake_gateway_sessions_are_unique() {
        let gateway = FakePaymentGateway;
        let request = CheckoutRequest {
            reference: "tour-1".to_string(),
            name: "The Forest Hiker Tour".to_string(),
            amount: 497.0,
            currency: "usd".to_string(),
            customer_email: "a@b.com".to_string(),
            success_url: "http://localhost/".to_string(),
            cancel_url: "http://localhost/tours".to_string(),
        };
        let a = gateway.create_checkout_session(request.clone()).unwrap();
        let b = gateway.create_checkout_session(request).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.url.contains(&a.id));
    }
}
