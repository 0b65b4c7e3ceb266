pub mod api;
pub mod bindings;
pub mod checkout;
pub mod client;
pub mod config;
pub mod error;
pub mod interop;
mod page;
pub mod plan;
pub mod view;

pub use checkout::{Checkout, CheckoutState, SubmitOutcome};
pub use client::{PaymentGateway, StripeError, StripeGateway};
pub use config::CheckoutConfig;
pub use error::CheckoutError;
pub use interop::load_stripejs;
pub use page::{plan_select, start};
pub use plan::Plan;
