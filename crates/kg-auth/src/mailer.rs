/// Template for first-time account confirmation.
pub const CONFIRM_ACCOUNT: &str = "confirm_account";
/// Template for confirming a changed email address.
pub const CONFIRM_CHANGE_EMAIL: &str = "confirm_account_change_email";
/// Template for password reset.
pub const RESET_PASSWORD: &str = "reset_password";

/// Outbound transactional email, ready for a delivery backend to render
/// and send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRequest {
    pub recipient: String,
    pub template: &'static str,
    pub token: String,
    pub username: String,
    pub application: String,
}

/// Delivery seam. Flows enqueue; the backend decides transport. The
/// default process wires a queue-backed implementation here; tests
/// capture requests in memory.
pub trait Mailer {
    fn send(&self, request: EmailRequest);
}

/// Mailer that drops everything, for flows that run without email.
pub struct NullMailer;

impl Mailer for NullMailer {
    fn send(&self, request: EmailRequest) {
        log::debug!("email suppressed: {} to {}", request.template, request.recipient);
    }
}
