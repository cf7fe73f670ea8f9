mod journal;

pub mod orders;
pub mod installments;
pub mod collection;
pub mod reconcile;
pub mod scheduler;

pub use collection::{CollectionService, CollectionSummary, ReminderSummary};
pub use installments::{InstallmentService, PayInstallment, PaymentConfirmation};
pub use orders::{CancellationOutcome, OrderService};
pub use reconcile::{Reconciler, DEFAULT_STALE_AFTER};
pub use scheduler::{DailyTrigger, JobSchedule, Scheduler};
