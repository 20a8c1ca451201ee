//! Telephony number inventory and provisioning.
//!
//! Purchases numbers from carriers, allocates virtual numbers, keeps the
//! inventory in [`number_store`], renews numbers on a billing cycle and
//! publishes lifecycle events. [`NumberHandler`] is the entry point for
//! every operation.

pub mod billing;
pub mod config;
pub mod error;
pub mod handler;
pub mod notify;
pub mod providers;
pub mod renewer;
pub mod virtual_number;

pub use billing::BalanceChecker;
pub use config::Config;
pub use error::{NotifyError, NumberError, NumberResult, ProviderError};
pub use handler::{Customer, Flow, HandlerSettings, NumberHandler, RegisterNumber};
pub use notify::{EventType, LogNotifier, Notifier, NumberEvent, WebhookNotifier};
pub use providers::{
    AvailableNumber, NumberFeature, ProviderAdapter, ProviderNumber, ProviderRegistry,
    TelnyxProvider, TwilioProvider,
};
pub use renewer::{spawn_renewer, Renewer};
