pub mod channel;
pub mod error;
pub mod evaluator;
pub mod formatter;

pub use channel::{AlertChannel, ChatWebhook, DesktopChannel, InstantMessengerWebhook};
pub use error::AlertError;
pub use evaluator::{AlertDispatcher, DispatchOutcome};
pub use formatter::format_alert;
