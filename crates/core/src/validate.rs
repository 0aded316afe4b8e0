//! Small validation helpers shared by the entity models.
//!
//! The models call these from explicit `validate()` functions rather than
//! relying on schema-level hooks, so every check is visible at the call site.

/// Collects validation failures so callers can report them all at once.
#[derive(Debug, Default)]
pub struct Violations {
    messages: Vec<String>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: impl Into<String>) {
        self.messages.push(msg.into());
    }

    pub fn require(&mut self, ok: bool, msg: &str) {
        if !ok {
            self.push(msg);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Turns the collected failures into a single `Validation` error.
    pub fn into_result(self) -> crate::DomainResult<()> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(crate::DomainError::validation_all(self.messages))
        }
    }
}

/// Loose email shape check: one `@` with a dot somewhere after it.
///
/// Deliverability is the mailer's problem; this only rejects obvious typos.
pub fn is_email(s: &str) -> bool {
    let Some((local, host)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty() && host.contains('.') && !host.starts_with('.') && !host.ends_with('.')
}
