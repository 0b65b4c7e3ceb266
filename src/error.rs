//! Error type shared by the checkout flow.
//!
//! Every failure ends the current attempt; the user resubmits. The text that
//! ends up in the card error element comes from [`CheckoutError::user_message`].

use thiserror::Error;
use wasm_bindgen::JsValue;

use crate::client::StripeError;

/// Shown when a failure carries nothing the customer can act on.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Shown when checkout is attempted before a plan was picked.
pub const NO_PLAN_MESSAGE: &str = "Please select a plan.";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckoutError {
    /// Stripe.js rejected the card or the call itself.
    #[error("stripe: {0}")]
    Stripe(#[from] StripeError),

    /// The backend answered with an `error` field.
    #[error("backend: {0}")]
    Backend(String),

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The response body was not the JSON we expected.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Non-success HTTP status without a readable body.
    #[error("request failed with status {0}")]
    Status(u16),

    #[error("no plan selected")]
    NoPlanSelected,

    /// A DOM call threw (listener registration, script injection).
    #[error("dom: {0}")]
    Dom(String),
}

impl CheckoutError {
    /// Text for the inline error element.
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Stripe(err) => err.message.clone(),
            CheckoutError::Backend(message) => message.clone(),
            CheckoutError::NoPlanSelected => NO_PLAN_MESSAGE.to_string(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    pub(crate) fn dom(value: JsValue) -> Self {
        CheckoutError::Dom(js_message(&value))
    }
}

impl From<gloo_net::Error> for CheckoutError {
    fn from(err: gloo_net::Error) -> Self {
        match err {
            gloo_net::Error::SerdeError(err) => CheckoutError::Decode(err.to_string()),
            other => CheckoutError::Network(other.to_string()),
        }
    }
}

/// Best-effort text of a thrown JS value.
pub(crate) fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}
