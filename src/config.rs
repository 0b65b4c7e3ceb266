//! Checkout configuration.
//!
//! Defaults match the Django payments app. A template can override any field
//! through a `window.checkoutConfig` object; the older page globals
//! (`has_payment_method`, `billing_name`, `csrf_token`) still win when set.

use gloo_utils::format::JsValueSerdeExt;
use serde::{Deserialize, Deserializer};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::js_sys::Reflect;
use web_sys::{HtmlDocument, Window};

/// Global the template may define with overrides.
pub const CONFIG_GLOBAL: &str = "checkoutConfig";

/// Cookie Django stores the CSRF token in.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Ids of the elements the template renders.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementIds {
    pub card_element: String,
    pub card_errors: String,
    pub subscription_form: String,
    pub submit_checkout: String,
    pub spinner: String,
    pub button_text: String,
    pub price_id: String,
    pub plan: String,
    pub price: String,
    pub submit_btn: String,
}

impl Default for ElementIds {
    fn default() -> Self {
        Self {
            card_element: "card-element".into(),
            card_errors: "card-errors".into(),
            subscription_form: "subscription-form".into(),
            submit_checkout: "submitCheckout".into(),
            spinner: "spinner".into(),
            button_text: "button-text".into(),
            price_id: "priceId".into(),
            plan: "plan".into(),
            price: "price".into(),
            submit_btn: "submitBtn".into(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckoutConfig {
    pub config_url: String,
    pub create_subscription_url: String,
    pub checkout_session_url: String,
    /// Where the browser goes once the subscription is active.
    pub completion_url: String,
    /// Skips the config request when the template already knows the key.
    pub publishable_key: Option<String>,
    pub billing_name: String,
    pub csrf_token: String,
    /// Rendered once by the server; never refreshed during the session.
    #[serde(deserialize_with = "deserialize_flag")]
    pub has_payment_method: bool,
    pub elements: ElementIds,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            config_url: "/api/frontend/payments/config/".into(),
            create_subscription_url: "/api/frontend/payments/create-sub".into(),
            checkout_session_url: "/api/frontend/payments/create-checkout-session/".into(),
            completion_url: "/api/frontend/payments/charge/complete".into(),
            publishable_key: None,
            billing_name: String::new(),
            csrf_token: String::new(),
            has_payment_method: false,
            elements: ElementIds::default(),
        }
    }
}

impl CheckoutConfig {
    /// Read the configuration the page was rendered with.
    ///
    /// A malformed `checkoutConfig` is logged and replaced by the defaults so
    /// the form is still wired up.
    pub fn from_window(window: &Window) -> Self {
        let mut config = match global(window, CONFIG_GLOBAL).map(|v| v.into_serde::<Self>()) {
            Some(Ok(config)) => config,
            Some(Err(err)) => {
                log::error!("ignoring invalid window.{}: {}", CONFIG_GLOBAL, err);
                Self::default()
            }
            None => Self::default(),
        };

        if let Some(flag) = global(window, "has_payment_method") {
            config.has_payment_method = js_flag(&flag);
        }
        if let Some(name) = global(window, "billing_name").and_then(|v| v.as_string()) {
            config.billing_name = name;
        }
        if let Some(token) = global(window, "csrf_token").and_then(|v| v.as_string()) {
            config.csrf_token = token;
        }
        if config.csrf_token.is_empty() {
            if let Some(token) = window
                .document()
                .and_then(|doc| doc.dyn_into::<HtmlDocument>().ok())
                .and_then(|doc| doc.cookie().ok())
                .and_then(|cookie| cookie_value(&cookie, CSRF_COOKIE))
            {
                config.csrf_token = token;
            }
        }
        if config.csrf_token.is_empty() {
            log::warn!("no CSRF token found; subscription requests will be rejected");
        }

        config
    }

    /// Whether the card element should be mounted: only for customers without
    /// a stored payment method, and only when the page has a place for it.
    pub fn mounts_card(&self, has_mount_target: bool) -> bool {
        !self.has_payment_method && has_mount_target
    }
}

fn global(window: &Window, name: &str) -> Option<JsValue> {
    Reflect::get(window, &JsValue::from_str(name))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

fn js_flag(value: &JsValue) -> bool {
    value
        .as_bool()
        .or_else(|| value.as_string().map(|s| parse_flag(&s)))
        .unwrap_or(false)
}

/// Templates render Python booleans (`"True"` / `"False"`).
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    matches!(value.as_str(), "true" | "1" | "yes")
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(flag) => flag,
        Flag::Text(text) => parse_flag(&text),
    })
}

/// Value of `name` in a `document.cookie` string.
pub fn cookie_value(cookie: &str, name: &str) -> Option<String> {
    cookie.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
