//! What the checkout flow does to the page.
//!
//! [`CheckoutView`] is the only way the flow touches the DOM, so the flow can
//! run against a recording view in tests. [`DomView`] drives the
//! server-rendered template through web-sys.

use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlInputElement};

use crate::config::ElementIds;
use crate::plan::Plan;

/// CSS class that hides the spinner and the button label.
pub const HIDDEN_CLASS: &str = "hidden";

/// CSS class on the error element while the card input has focus.
pub const FOCUSED_CLASS: &str = "focused";

pub trait CheckoutView {
    fn set_submit_enabled(&self, enabled: bool);

    fn set_spinner_visible(&self, visible: bool);

    fn set_button_text_visible(&self, visible: bool);

    /// Check every input whose `name` equals `name`; uncheck all others.
    fn check_plan_input(&self, name: &str);

    /// Write the plan's name, price and price id into their labels.
    fn set_plan_labels(&self, plan: &Plan);

    /// Replace the inline error text. An empty string clears it.
    fn show_error(&self, message: &str);

    fn set_error_focused(&self, focused: bool);

    fn navigate(&self, url: &str);
}

#[derive(Clone, Debug)]
pub struct DomView {
    document: Document,
    ids: ElementIds,
}

impl DomView {
    pub fn new(document: Document, ids: ElementIds) -> Self {
        Self { document, ids }
    }

    /// Look up `id`, warning when the template does not render it.
    fn element(&self, id: &str) -> Option<Element> {
        let element = self.document.get_element_by_id(id);
        if element.is_none() {
            log::warn!("checkout element #{} is missing from the page", id);
        }
        element
    }

    fn set_hidden(&self, id: &str, hidden: bool) {
        if let Some(element) = self.element(id) {
            let classes = element.class_list();
            let result = if hidden {
                classes.add_1(HIDDEN_CLASS)
            } else {
                classes.remove_1(HIDDEN_CLASS)
            };
            if let Err(err) = result {
                log::warn!("could not toggle #{}: {:?}", id, err);
            }
        }
    }

    fn set_text(&self, id: &str, text: &str) {
        if let Some(element) = self.element(id) {
            element.set_text_content(Some(text));
        }
    }
}

impl CheckoutView for DomView {
    fn set_submit_enabled(&self, enabled: bool) {
        if let Some(button) = self.element(&self.ids.submit_checkout) {
            let result = if enabled {
                button.remove_attribute("disabled")
            } else {
                button.set_attribute("disabled", "")
            };
            if let Err(err) = result {
                log::warn!("could not toggle the submit button: {:?}", err);
            }
        }
    }

    fn set_spinner_visible(&self, visible: bool) {
        self.set_hidden(&self.ids.spinner, !visible);
    }

    fn set_button_text_visible(&self, visible: bool) {
        self.set_hidden(&self.ids.button_text, !visible);
    }

    fn check_plan_input(&self, name: &str) {
        let inputs = self.document.get_elements_by_tag_name("input");
        for index in 0..inputs.length() {
            if let Some(input) = inputs
                .item(index)
                .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
            {
                input.set_checked(input.name() == name);
            }
        }
    }

    fn set_plan_labels(&self, plan: &Plan) {
        self.set_text(&self.ids.plan, &plan.name);
        self.set_text(&self.ids.price, &plan.price);
        self.set_text(&self.ids.price_id, &plan.price_id);
    }

    fn show_error(&self, message: &str) {
        self.set_text(&self.ids.card_errors, message);
    }

    fn set_error_focused(&self, focused: bool) {
        if let Some(element) = self.element(&self.ids.card_errors) {
            let classes = element.class_list();
            let result = if focused {
                classes.add_1(FOCUSED_CLASS)
            } else {
                classes.remove_1(FOCUSED_CLASS)
            };
            if let Err(err) = result {
                log::warn!("could not toggle focus on the card errors: {:?}", err);
            }
        }
    }

    fn navigate(&self, url: &str) {
        let location = match self.document.location() {
            Some(location) => location,
            None => {
                log::error!("no location to navigate to {}", url);
                return;
            }
        };
        if let Err(err) = location.set_href(url) {
            log::error!("navigation to {} failed: {:?}", url, err);
        }
    }
}
