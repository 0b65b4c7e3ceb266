//! interop.rs
//!
//! Load Stripe.js v3 at runtime when the template did not include it.
//!
//! # Overview
//! [`load_stripejs`] resolves immediately when `window.Stripe` already
//! exists. Otherwise it injects a single
//! `<script id="stripejs-sdk" src="https://js.stripe.com/v3/" defer>`
//! into `<head>` and resolves once the script's `load` event fires. A tag
//! with that id that is present while `window.Stripe` is not has already
//! finished or failed, so it is replaced rather than waited on.
//!
//! # Usage
//! ```rust,ignore
//! use subscription_checkout::interop::load_stripejs;
//!
//! wasm_bindgen_futures::spawn_local(async {
//!     load_stripejs().await.expect("Stripe.js unavailable");
//!     let stripe = subscription_checkout::bindings::new_stripe("pk_test_...");
//! });
//! ```

use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::js_sys::{Function, Promise, Reflect};
use web_sys::{EventTarget, HtmlScriptElement};

use crate::error::CheckoutError;

pub const STRIPEJS_SCRIPT_ID: &str = "stripejs-sdk";
pub const STRIPEJS_URL: &str = "https://js.stripe.com/v3/";

/// `true` once `window.Stripe` exists (script loaded & parsed).
pub fn stripejs_loaded() -> bool {
    web_sys::window()
        .and_then(|win| Reflect::has(&win, &JsValue::from_str("Stripe")).ok())
        .unwrap_or(false)
}

/// What [`load_stripejs`] has to do for the current page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptAction {
    Ready,
    Inject,
    /// Drop the existing tag and inject a fresh one.
    Replace,
}

pub fn script_action(stripe_loaded: bool, has_script_tag: bool) -> ScriptAction {
    match (stripe_loaded, has_script_tag) {
        (true, _) => ScriptAction::Ready,
        (false, false) => ScriptAction::Inject,
        (false, true) => ScriptAction::Replace,
    }
}

/// Make sure Stripe.js is available.
pub async fn load_stripejs() -> Result<(), CheckoutError> {
    let document = gloo_utils::document();
    let existing = document.get_element_by_id(STRIPEJS_SCRIPT_ID);
    match script_action(stripejs_loaded(), existing.is_some()) {
        ScriptAction::Ready => return Ok(()),
        ScriptAction::Inject => {}
        ScriptAction::Replace => {
            log::warn!(
                "#{} present but Stripe is not loaded; reinjecting",
                STRIPEJS_SCRIPT_ID
            );
            if let Some(stale) = existing {
                stale.remove();
            }
        }
    }

    let script: HtmlScriptElement = document
        .create_element("script")
        .map_err(CheckoutError::dom)?
        .dyn_into()
        .map_err(|_| CheckoutError::Dom("created element is not a script".into()))?;
    script.set_id(STRIPEJS_SCRIPT_ID);
    script.set_src(STRIPEJS_URL);
    script.set_defer(true);

    // Listeners go on before the tag is attached so `load` cannot be missed.
    let target: &EventTarget = script.as_ref();
    let mut listen = |resolve: Function, reject: Function| {
        let registered = target
            .add_event_listener_with_callback("load", &resolve)
            .and_then(|_| target.add_event_listener_with_callback("error", &reject));
        if let Err(err) = registered {
            let _ = reject.call1(&JsValue::NULL, &err);
        }
    };
    let loaded = JsFuture::from(Promise::new(&mut listen));

    gloo_utils::head()
        .append_child(&script)
        .map_err(CheckoutError::dom)?;
    log::debug!("injected {}", STRIPEJS_URL);

    loaded
        .await
        .map(|_| ())
        .map_err(|_| CheckoutError::Dom(format!("failed to load {}", STRIPEJS_URL)))
}
