//! subscription_checkout/src/client.rs
//!
//! High-level Rust API over the Stripe.js calls the subscription page makes.
//!
//! This module provides:
//! - `CardElementOptions` to style the `card` element the way the checkout page does.
//! - `mount_card_element()` to create Elements and mount the card input.
//! - `create_payment_method()` to tokenize the entered card into a reusable payment method.
//! - `redirect_to_checkout()` to hand the customer over to a hosted Checkout Session.
//! - `CardChange` for the widget's `change` events.
//! - `PaymentGateway`, the seam the checkout flow talks to, and `StripeGateway`,
//!   its Stripe.js implementation.
//!
//! # Example Usage
//! ```rust,ignore
//! use subscription_checkout::client::{mount_card_element, create_payment_method, CardElementOptions};
//! use subscription_checkout::bindings::new_stripe;
//!
//! let stripe = new_stripe("pk_test_...");
//! let (_elements, card) = mount_card_element(&stripe, "#card-element", CardElementOptions::default())?;
//! // ...later, on submit
//! let payment_method_id = create_payment_method(&stripe, &card, "ada").await?;
//! ```

use std::cell::OnceCell;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_wasm_bindgen::{from_value, to_value};
use thiserror::Error;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use web_sys::js_sys::{Object, Reflect};

use crate::bindings::{JsCardElement, JsElements, JsStripe};

/// Options for `elements.create("card", { style })`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CardElementOptions {
    /// Stripe Elements style object (`base`, `invalid`, ...).
    pub style: serde_json::Value,

    /// Hide the postal code field.
    #[serde(rename = "hidePostalCode", skip_serializing_if = "Option::is_none")]
    pub hide_postal_code: Option<bool>,
}

impl Default for CardElementOptions {
    fn default() -> Self {
        Self {
            style: json!({
                "base": {
                    "color": "#32325d",
                    "fontFamily": "\"Helvetica Neue\", Helvetica, sans-serif",
                    "fontSmoothing": "antialiased",
                    "fontSize": "16px",
                    "::placeholder": { "color": "#aab7c4" }
                },
                "invalid": {
                    "color": "#fa755a",
                    "iconColor": "#fa755a"
                }
            }),
            hide_postal_code: None,
        }
    }
}

/// Payload of the card element's `change` event.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CardChange {
    /// Validation problem with the current input, if any.
    #[serde(default)]
    pub error: Option<StripeError>,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub empty: bool,
}

/// Representation of a Stripe.js error object.
#[derive(Clone, Debug, Deserialize, PartialEq, Error)]
#[error("{message}")]
pub struct StripeError {
    /// Human-readable message.
    pub message: String,
    /// Stripe’s error type, e.g. `"card_error"`.
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    /// Optional Stripe error code, e.g. `"card_declined"`.
    #[serde(default)]
    pub code: Option<String>,
}

impl StripeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            code: None,
        }
    }
}

/// The Stripe.js operations the checkout flow depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait(?Send)]
pub trait PaymentGateway {
    /// Tokenize the entered card; returns the payment method id (`pm_...`).
    async fn create_payment_method(&self, billing_name: &str) -> Result<String, StripeError>;

    /// Send the browser to the hosted page of a Checkout Session.
    async fn redirect_to_checkout(&self, session_id: &str) -> Result<(), StripeError>;
}

/// Shown when Stripe.js or the publishable key never arrived.
pub const STRIPE_UNAVAILABLE_MESSAGE: &str =
    "Card payments are unavailable right now. Please reload the page.";

/// [`PaymentGateway`] backed by the one Stripe.js client of the page.
///
/// The client is filled in once the publishable key arrives; until then every
/// call fails with [`STRIPE_UNAVAILABLE_MESSAGE`]. `card` stays empty when the
/// customer already has a stored payment method and the card element was
/// never mounted.
#[derive(Debug, Default)]
pub struct StripeGateway {
    stripe: OnceCell<JsStripe>,
    card: OnceCell<JsCardElement>,
}

impl StripeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the page's Stripe client. Only the first call has an effect.
    pub fn set_stripe(&self, stripe: JsStripe) {
        if self.stripe.set(stripe).is_err() {
            log::warn!("Stripe client already initialized");
        }
    }

    /// Install the mounted card element. Only the first call has an effect.
    pub fn set_card(&self, card: JsCardElement) {
        if self.card.set(card).is_err() {
            log::warn!("card element already mounted");
        }
    }

    pub fn stripe(&self) -> Option<&JsStripe> {
        self.stripe.get()
    }

    fn client(&self) -> Result<&JsStripe, StripeError> {
        self.stripe
            .get()
            .ok_or_else(|| StripeError::new(STRIPE_UNAVAILABLE_MESSAGE))
    }
}

#[async_trait(?Send)]
impl PaymentGateway for StripeGateway {
    async fn create_payment_method(&self, billing_name: &str) -> Result<String, StripeError> {
        let stripe = self.client()?;
        let card = self
            .card
            .get()
            .ok_or_else(|| StripeError::new("Card details are not available."))?;
        create_payment_method(stripe, card, billing_name).await
    }

    async fn redirect_to_checkout(&self, session_id: &str) -> Result<(), StripeError> {
        redirect_to_checkout(self.client()?, session_id).await
    }
}

/// Create an Elements instance and mount a `card` element into `mount_id`.
///
/// # Arguments
///
/// * `stripe` – The page's Stripe client.
/// * `mount_id` – CSS selector, e.g. `"#card-element"`.
/// * `options` – Style for the card input.
///
/// # Returns
///
/// On success, `(JsElements, JsCardElement)`. On failure, a `StripeError`.
pub fn mount_card_element(
    stripe: &JsStripe,
    mount_id: &str,
    options: CardElementOptions,
) -> Result<(JsElements, JsCardElement), StripeError> {
    let elements = stripe.elements().map_err(js_to_stripe_error)?;

    let options_js = to_value(&options).map_err(serde_error_to_stripe_error)?;
    let card = elements
        .create_element("card", options_js)
        .map_err(js_to_stripe_error)?;

    card.mount(mount_id).map_err(js_to_stripe_error)?;

    Ok((elements, card))
}

/// Tokenize the card for recurring use.
///
/// Calls `stripe.createPaymentMethod({ type: "card", card, billing_details: { name } })`
/// and returns `paymentMethod.id`.
///
/// # Errors
///
/// The `error` of the resolved result (e.g. an incomplete card number), or a
/// rejected promise, as a `StripeError`.
pub async fn create_payment_method(
    stripe: &JsStripe,
    card: &JsCardElement,
    billing_name: &str,
) -> Result<String, StripeError> {
    let billing_details = Object::new();
    set(&billing_details, "name", &JsValue::from_str(billing_name))?;

    let opts = Object::new();
    set(&opts, "type", &JsValue::from_str("card"))?;
    set(&opts, "card", card.as_ref())?;
    set(&opts, "billing_details", &billing_details)?;

    let promise = stripe
        .create_payment_method(opts.into())
        .map_err(js_to_stripe_error)?;
    let result = JsFuture::from(promise).await.map_err(js_to_stripe_error)?;
    error_field(&result)?;

    Reflect::get(&result, &JsValue::from_str("paymentMethod"))
        .ok()
        .and_then(|pm| Reflect::get(&pm, &JsValue::from_str("id")).ok())
        .and_then(|id| id.as_string())
        .ok_or_else(|| StripeError::new("Stripe did not return a payment method."))
}

/// Redirect to the Stripe-hosted Checkout page for `session_id`.
///
/// On success the browser leaves the page, so the promise normally never
/// settles; it only resolves when Stripe reports an error.
pub async fn redirect_to_checkout(stripe: &JsStripe, session_id: &str) -> Result<(), StripeError> {
    let opts = Object::new();
    set(&opts, "sessionId", &JsValue::from_str(session_id))?;

    let promise = stripe
        .redirect_to_checkout(opts.into())
        .map_err(js_to_stripe_error)?;
    let result = JsFuture::from(promise).await.map_err(js_to_stripe_error)?;
    error_field(&result)
}

/// Fail with the `error` member of a resolved Stripe.js result, if present.
fn error_field(result: &JsValue) -> Result<(), StripeError> {
    match Reflect::get(result, &JsValue::from_str("error")) {
        Ok(err) if !err.is_undefined() && !err.is_null() => Err(js_to_stripe_error(err)),
        _ => Ok(()),
    }
}

fn set(target: &Object, key: &str, value: &JsValue) -> Result<(), StripeError> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(js_to_stripe_error)
}

/// Convert any caught `JsValue` into a `StripeError` with best effort.
pub(crate) fn js_to_stripe_error(value: JsValue) -> StripeError {
    from_value::<StripeError>(value.clone())
        .unwrap_or_else(|_| StripeError::new(crate::error::js_message(&value)))
}

/// Convert a `serde_wasm_bindgen::Error` (from `to_value`) into `StripeError`.
fn serde_error_to_stripe_error(err: serde_wasm_bindgen::Error) -> StripeError {
    StripeError::new(err.to_string())
}
