//! Email delivery with pluggable providers.
//!
//! `EmailProvider` implementations (Resend over HTTPS, or an SMTP relay)
//! move messages over the wire; the contact callbacks render one email per
//! job type and are registered in a `DeliveryRegistry` the queue processor
//! dispatches through.

mod contact_mail;
mod provider;
mod resend_provider;
mod smtp_provider;

pub mod templates;

pub use contact_mail::{DEFAULT_FROM, OwnerNotification, SenderAutoReply, contact_registry};
pub use provider::{DeliveryCallback, DeliveryRegistry, EmailMessage, EmailProvider};
pub use resend_provider::ResendProvider;
pub use smtp_provider::SmtpProvider;
