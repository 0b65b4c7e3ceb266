//! subscription_checkout/src/bindings.rs
//!
//! Low‐level wasm-bindgen bindings to the parts of Stripe.js v3 the checkout
//! page uses: the client, the Elements factory, the `card` element, and the
//! two promise-returning calls (`createPaymentMethod`, `redirectToCheckout`).
//!
//! Higher-level wrappers live in `client.rs`.

use wasm_bindgen::prelude::*;
use web_sys::js_sys::{Function, Promise};

#[wasm_bindgen]
extern "C" {
    //------------------------------------------------------------------------------
    // Core Types
    //------------------------------------------------------------------------------

    /// Raw Stripe.js client handle.
    #[wasm_bindgen(js_name = Stripe, js_namespace = window)]
    #[derive(Debug, Clone)]
    pub type JsStripe;

    /// Raw Elements factory handle.
    #[wasm_bindgen(js_name = Elements)]
    #[derive(Debug, Clone)]
    pub type JsElements;

    /// Raw `card` element handle (the iframe-hosted card input).
    #[wasm_bindgen(js_name = CardElement)]
    #[derive(Debug, Clone)]
    pub type JsCardElement;

    //------------------------------------------------------------------------------
    // Constructors
    //------------------------------------------------------------------------------

    /// Construct a new `JsStripe` from a publishable key.
    ///
    /// ```js
    ///   const stripe = Stripe("pk_test_...");
    /// ```
    #[wasm_bindgen(js_name = Stripe, js_namespace = window)]
    pub fn new_stripe(publishable_key: &str) -> JsStripe;

    //------------------------------------------------------------------------------
    // Instance Methods
    //------------------------------------------------------------------------------

    /// `stripe.elements()` → `JsElements`
    #[wasm_bindgen(method, catch, js_name = elements)]
    pub fn elements(this: &JsStripe) -> Result<JsElements, JsValue>;

    /// `elements.create("card", options)` → `JsCardElement`
    #[wasm_bindgen(method, catch, js_name = create)]
    pub fn create_element(
        this: &JsElements,
        element_type: &str,
        options: JsValue,
    ) -> Result<JsCardElement, JsValue>;

    /// `card.mount(selector)` → `()`
    #[wasm_bindgen(method, catch, js_name = mount)]
    pub fn mount(this: &JsCardElement, selector: &str) -> Result<(), JsValue>;

    /// `card.on(event, handler)` for `focus`, `blur` and `change`.
    #[wasm_bindgen(method, js_name = on)]
    pub fn on(this: &JsCardElement, event: &str, handler: &Function);

    /// `stripe.createPaymentMethod({ type, card, billing_details })` → JS `Promise`
    #[wasm_bindgen(method, catch, js_name = createPaymentMethod)]
    pub fn create_payment_method(this: &JsStripe, options: JsValue) -> Result<Promise, JsValue>;

    /// `stripe.redirectToCheckout({ sessionId })` → JS `Promise`
    #[wasm_bindgen(method, catch, js_name = redirectToCheckout)]
    pub fn redirect_to_checkout(this: &JsStripe, options: JsValue) -> Result<Promise, JsValue>;
}
