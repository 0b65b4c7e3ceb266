//! Wires [`Checkout`] into the server-rendered subscription page.
//!
//! `start` reads the page configuration and registers the form, plan and
//! hosted-checkout listeners straight away. Stripe.js and the publishable key
//! are fetched afterwards; until they arrive the gateway refuses card calls,
//! while a customer with a stored payment method can already check out.
//!
//! Templates with inline handlers can call the exported `planSelect(name,
//! price, priceId)` once the wasm module is loaded, e.g.
//! `window.planSelect = wasm.planSelect`.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Element, Event};

use crate::api::{HttpPaymentsApi, PaymentsApi};
use crate::bindings::{new_stripe, JsCardElement};
use crate::checkout::Checkout;
use crate::client::{
    mount_card_element, CardChange, CardElementOptions, StripeGateway, STRIPE_UNAVAILABLE_MESSAGE,
};
use crate::config::CheckoutConfig;
use crate::error::CheckoutError;
use crate::interop::load_stripejs;
use crate::plan::{Plan, PRICE_ID_ATTR};
use crate::view::{CheckoutView, DomView};

type PageCheckout = Checkout<DomView, StripeGateway, HttpPaymentsApi>;

thread_local! {
    static PAGE: RefCell<Option<Rc<PageCheckout>>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));

    let window = gloo_utils::window();
    let document = gloo_utils::document();
    let config = CheckoutConfig::from_window(&window);
    let api = HttpPaymentsApi::new(&config);

    let view = DomView::new(document.clone(), config.elements.clone());
    let gateway = StripeGateway::new();
    let checkout = Rc::new(Checkout::new(view, gateway, api.clone(), &config));
    checkout.prepare();
    if let Err(err) = bind(&document, &config, &checkout) {
        log::error!("could not wire up the checkout form: {}", err);
    }
    PAGE.with(|page| *page.borrow_mut() = Some(checkout.clone()));

    spawn_local(async move {
        if let Err(err) = init_stripe(&document, &config, &api, &checkout).await {
            log::error!("Stripe.js unavailable: {}", err);
            if !checkout.has_payment_method() {
                checkout.view().show_error(STRIPE_UNAVAILABLE_MESSAGE);
            }
        }
    });
}

/// Select a plan from an inline `onclick` handler.
#[wasm_bindgen(js_name = planSelect)]
pub fn plan_select(name: String, price: String, price_id: String) {
    PAGE.with(|page| match page.borrow().as_ref() {
        Some(checkout) => checkout.select_plan(Plan::new(name, price, price_id)),
        None => log::warn!("planSelect({}) called before checkout was ready", name),
    });
}

fn bind(
    document: &Document,
    config: &CheckoutConfig,
    checkout: &Rc<PageCheckout>,
) -> Result<(), CheckoutError> {
    let ids = &config.elements;
    bind_plan_buttons(document, checkout)?;
    if let Some(form) = document.get_element_by_id(&ids.subscription_form) {
        bind_submit(&form, checkout)?;
    }
    if let Some(button) = document.get_element_by_id(&ids.submit_btn) {
        bind_hosted_checkout(&button, checkout)?;
    }
    log::info!(
        "subscription checkout ready (stored payment method: {})",
        checkout.has_payment_method()
    );
    Ok(())
}

/// Load Stripe.js, create the page's one client and, for a new card, mount
/// the card element.
async fn init_stripe(
    document: &Document,
    config: &CheckoutConfig,
    api: &HttpPaymentsApi,
    checkout: &Rc<PageCheckout>,
) -> Result<(), CheckoutError> {
    load_stripejs().await?;
    let publishable_key = match &config.publishable_key {
        Some(key) => key.clone(),
        None => api.fetch_config().await?.public_key,
    };
    let gateway = checkout.gateway();
    gateway.set_stripe(new_stripe(&publishable_key));

    let card_element = &config.elements.card_element;
    let has_mount_target = document.get_element_by_id(card_element).is_some();
    if !config.mounts_card(has_mount_target) {
        if !config.has_payment_method {
            log::warn!("#{} not found; card entry disabled", card_element);
        }
        return Ok(());
    }

    if let Some(stripe) = gateway.stripe() {
        let selector = format!("#{}", card_element);
        let options = CardElementOptions::default();
        let (_elements, card) = mount_card_element(stripe, &selector, options)?;
        observe_card(&card, checkout);
        gateway.set_card(card);
    }
    Ok(())
}

fn observe_card(card: &JsCardElement, checkout: &Rc<PageCheckout>) {
    for (event, focused) in [("focus", true), ("blur", false)] {
        let checkout = checkout.clone();
        let handler = Closure::<dyn FnMut()>::new(move || checkout.card_focus_changed(focused));
        card.on(event, handler.as_ref().unchecked_ref());
        handler.forget(); // lives as long as the card element
    }

    let checkout = checkout.clone();
    let on_change = Closure::<dyn FnMut(JsValue)>::new(move |event: JsValue| {
        let change = serde_wasm_bindgen::from_value::<CardChange>(event).unwrap_or_default();
        checkout.card_changed(&change);
    });
    card.on("change", on_change.as_ref().unchecked_ref());
    on_change.forget();
}

fn bind_plan_buttons(
    document: &Document,
    checkout: &Rc<PageCheckout>,
) -> Result<(), CheckoutError> {
    let buttons = document
        .query_selector_all(&format!("[{}]", PRICE_ID_ATTR))
        .map_err(CheckoutError::dom)?;
    for index in 0..buttons.length() {
        let Some(button) = buttons
            .item(index)
            .and_then(|node| node.dyn_into::<Element>().ok())
        else {
            continue;
        };
        let checkout = checkout.clone();
        let target = button.clone();
        let handler = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
            if let Some(plan) = Plan::from_element(&target) {
                checkout.select_plan(plan);
            }
        });
        button
            .add_event_listener_with_callback("click", handler.as_ref().unchecked_ref())
            .map_err(CheckoutError::dom)?;
        handler.forget();
    }
    Ok(())
}

fn bind_submit(form: &Element, checkout: &Rc<PageCheckout>) -> Result<(), CheckoutError> {
    let checkout = checkout.clone();
    let handler = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        event.prevent_default();
        let checkout = checkout.clone();
        spawn_local(async move {
            checkout.submit().await;
        });
    });
    form.add_event_listener_with_callback("submit", handler.as_ref().unchecked_ref())
        .map_err(CheckoutError::dom)?;
    handler.forget();
    Ok(())
}

fn bind_hosted_checkout(
    button: &Element,
    checkout: &Rc<PageCheckout>,
) -> Result<(), CheckoutError> {
    let checkout = checkout.clone();
    let handler = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
        let checkout = checkout.clone();
        spawn_local(async move {
            // Failures are already shown inline.
            let _ = checkout.start_hosted_checkout().await;
        });
    });
    button
        .add_event_listener_with_callback("click", handler.as_ref().unchecked_ref())
        .map_err(CheckoutError::dom)?;
    handler.forget();
    Ok(())
}
