//! Pricing plans offered on the checkout page.

use web_sys::Element;

pub const NAME_ATTR: &str = "data-plan-name";
pub const PRICE_ATTR: &str = "data-plan-price";
pub const PRICE_ID_ATTR: &str = "data-price-id";

/// A plan as the page presents it. Values are taken verbatim from the markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    /// Display name, also the `name` attribute of the plan's radio input.
    pub name: String,
    /// Display price, e.g. `"€29 / month"`.
    pub price: String,
    /// Backend price identifier (`price_...`).
    pub price_id: String,
}

impl Plan {
    pub fn new(
        name: impl Into<String>,
        price: impl Into<String>,
        price_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
            price_id: price_id.into(),
        }
    }

    /// Read a plan from a button's `data-*` attributes.
    ///
    /// Needs a price id; missing name or price become empty labels.
    pub fn from_element(element: &Element) -> Option<Self> {
        let price_id = element.get_attribute(PRICE_ID_ATTR)?;
        Some(Self::new(
            element.get_attribute(NAME_ATTR).unwrap_or_default(),
            element.get_attribute(PRICE_ATTR).unwrap_or_default(),
            price_id,
        ))
    }
}
