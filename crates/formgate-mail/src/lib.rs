//! Formgate Mail Library
//!
//! Outbound notification email: the provider abstraction with its five
//! concrete implementations (SMTP, SendGrid, Resend, Mailgun, AWS SES), the
//! per-tenant provider cache, and the notification renderer.
//!
//! Dispatch policy (tenant provider first, platform fallback with the monthly
//! cap) lives with the API; this crate only knows how to build providers and
//! produce message bodies.

pub mod cache;
pub mod factory;
pub mod mailgun;
pub mod provider;
pub mod render;
pub mod resend;
pub mod sendgrid;
pub mod ses;
pub mod smtp;

pub use cache::MailProviderCache;
pub use factory::create_provider;
pub use provider::{parse_recipients, MailError, MailProvider};
pub use render::{FileAttachment, RenderedNotification, SubmissionNotification};
