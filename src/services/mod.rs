pub mod grading;
pub mod notifications;
pub mod payments;
pub mod reorder;
pub mod storage;

pub use grading::GradingError;
pub use notifications::{notify_admins, LogNotifier, Notifier, NotifyError, TicketEvent, TicketNotice, WebhookNotifier};
pub use payments::{CheckoutSession, PaymentError, PaymentGateway, StripeGateway};
pub use reorder::{plan_reorder, ReorderError, ReorderPlan};
pub use storage::{FileCategory, FileStorage, LocalFileStorage, StorageError, StoredFile, Upload};
