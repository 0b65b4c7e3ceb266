//! The subscription checkout flow.
//!
//! [`Checkout`] owns everything the page mutates: the selected plan, the
//! submit state, and the single Stripe gateway. It handles:
//! 1. Plan selection (radio inputs, labels, enabling submit).
//! 2. Card widget feedback (focus styling, inline validation errors).
//! 3. Form submission, as an explicit state machine:
//!    `Idle → Submitting → Redirecting`, or back to `Idle` with an error shown.
//!    - No stored payment method: tokenize the card, then create the subscription.
//!    - Stored payment method: create the subscription with `payment_method: null`.
//! 4. The hosted Checkout Session alternative.
//!
//! Everything goes through [`CheckoutView`], [`PaymentGateway`] and
//! [`PaymentsApi`], so the flow runs the same against the DOM and in tests.

use std::cell::{Cell, RefCell};

use crate::api::{HostedCheckout, PaymentsApi, SubscriptionRequest, SubscriptionResponse};
use crate::client::{CardChange, PaymentGateway};
use crate::config::CheckoutConfig;
use crate::error::CheckoutError;
use crate::plan::Plan;
use crate::view::CheckoutView;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckoutState {
    Idle,
    Submitting,
    /// The subscription is active and the browser is leaving the page.
    Redirecting,
}

/// How a submit attempt ended.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    /// A previous attempt was still in flight.
    Ignored,
    /// Navigation to the completion URL was started.
    Redirected(String),
    /// The backend answered without an error but the subscription is not
    /// active (e.g. `"incomplete"`). Nothing is shown to the customer.
    NotActive(Option<String>),
    Failed(CheckoutError),
}

pub struct Checkout<V, G, A> {
    view: V,
    gateway: G,
    api: A,
    has_payment_method: bool,
    billing_name: String,
    completion_url: String,
    state: Cell<CheckoutState>,
    selected: RefCell<Option<Plan>>,
}

impl<V, G, A> Checkout<V, G, A>
where
    V: CheckoutView,
    G: PaymentGateway,
    A: PaymentsApi,
{
    pub fn new(view: V, gateway: G, api: A, config: &CheckoutConfig) -> Self {
        Self {
            view,
            gateway,
            api,
            has_payment_method: config.has_payment_method,
            billing_name: config.billing_name.clone(),
            completion_url: config.completion_url.clone(),
            state: Cell::new(CheckoutState::Idle),
            selected: RefCell::new(None),
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn state(&self) -> CheckoutState {
        self.state.get()
    }

    pub fn selected_plan(&self) -> Option<Plan> {
        self.selected.borrow().clone()
    }

    pub fn has_payment_method(&self) -> bool {
        self.has_payment_method
    }

    /// Initial page state: nothing selected, so nothing to submit.
    pub fn prepare(&self) {
        self.view.set_spinner_visible(false);
        self.view.set_button_text_visible(true);
        self.view.set_submit_enabled(false);
    }

    pub fn select_plan(&self, plan: Plan) {
        log::info!("plan selected: {} ({})", plan.name, plan.price_id);
        self.view.check_plan_input(&plan.name);
        self.view.set_plan_labels(&plan);
        *self.selected.borrow_mut() = Some(plan);
        if self.state.get() == CheckoutState::Idle {
            self.view.set_submit_enabled(true);
        }
    }

    /// Spinner on and submit disabled while a request is out; the inverse after.
    pub fn set_loading(&self, loading: bool) {
        self.view.set_submit_enabled(!loading);
        self.view.set_spinner_visible(loading);
        self.view.set_button_text_visible(!loading);
    }

    pub fn card_focus_changed(&self, focused: bool) {
        self.view.set_error_focused(focused);
    }

    /// Show the widget's validation message, or clear the previous one.
    pub fn card_changed(&self, change: &CardChange) {
        let message = change.error.as_ref().map(|err| err.message.as_str());
        self.view.show_error(message.unwrap_or_default());
    }

    /// Run one checkout attempt.
    pub async fn submit(&self) -> SubmitOutcome {
        if self.state.get() != CheckoutState::Idle {
            log::debug!("checkout already in progress; submit ignored");
            return SubmitOutcome::Ignored;
        }
        self.state.set(CheckoutState::Submitting);
        self.set_loading(true);

        match self.subscribe().await {
            Ok(response) if response.is_active() => {
                log::info!("subscription active, redirecting");
                self.redirect_to_completion();
                SubmitOutcome::Redirected(self.completion_url.clone())
            }
            Ok(response) => {
                log::warn!(
                    "subscription status {:?}; staying on the page",
                    response.status
                );
                self.finish();
                SubmitOutcome::NotActive(response.status)
            }
            Err(err) => {
                log::error!("checkout failed: {}", err);
                self.view.show_error(&err.user_message());
                self.finish();
                SubmitOutcome::Failed(err)
            }
        }
    }

    /// Ask the backend for a Checkout Session for the selected plan and hand
    /// over to the Stripe-hosted page.
    pub async fn start_hosted_checkout(&self) -> Result<(), CheckoutError> {
        let result = self.redirect_to_session().await;
        if let Err(err) = &result {
            log::error!("hosted checkout failed: {}", err);
            self.view.show_error(&err.user_message());
        }
        result
    }

    async fn subscribe(&self) -> Result<SubscriptionResponse, CheckoutError> {
        let plan = self.selected_plan().ok_or(CheckoutError::NoPlanSelected)?;

        let payment_method = if self.has_payment_method {
            None
        } else {
            let billing_name = &self.billing_name;
            Some(self.gateway.create_payment_method(billing_name).await?)
        };

        let request = SubscriptionRequest {
            price_id: plan.price_id,
            payment_method,
        };
        self.api.create_subscription(&request).await?.into_result()
    }

    async fn redirect_to_session(&self) -> Result<(), CheckoutError> {
        let plan = self.selected_plan().ok_or(CheckoutError::NoPlanSelected)?;
        match self.api.create_checkout_session(&plan.price_id).await? {
            HostedCheckout::Session(session_id) => {
                log::info!("redirecting to checkout session {}", session_id);
                self.gateway.redirect_to_checkout(&session_id).await?;
            }
            HostedCheckout::Subscribed => {
                log::info!("subscribed without a checkout session, redirecting");
                self.redirect_to_completion();
            }
        }
        Ok(())
    }

    fn redirect_to_completion(&self) {
        self.state.set(CheckoutState::Redirecting);
        self.view.navigate(&self.completion_url);
    }

    fn finish(&self) {
        self.state.set(CheckoutState::Idle);
        self.set_loading(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BackendError, MockPaymentsApi};
    use crate::client::{MockPaymentGateway, StripeError, StripeGateway, STRIPE_UNAVAILABLE_MESSAGE};
    use crate::error::NO_PLAN_MESSAGE;

    const COMPLETE: &str = "/api/frontend/payments/charge/complete";

    /// Records what the flow did to the page.
    struct RecordingView {
        inputs: RefCell<Vec<(String, bool)>>,
        submit_enabled: Cell<bool>,
        spinner_visible: Cell<bool>,
        button_text_visible: Cell<bool>,
        labels: RefCell<Option<Plan>>,
        error: RefCell<String>,
        focused: Cell<bool>,
        navigated: RefCell<Option<String>>,
    }

    impl RecordingView {
        fn new() -> Self {
            let inputs = ["Trial", "Standard", "Premium"]
                .iter()
                .map(|name| (name.to_string(), false))
                .collect();
            Self {
                inputs: RefCell::new(inputs),
                submit_enabled: Cell::new(true),
                spinner_visible: Cell::new(true),
                button_text_visible: Cell::new(true),
                labels: RefCell::new(None),
                error: RefCell::new(String::new()),
                focused: Cell::new(false),
                navigated: RefCell::new(None),
            }
        }

        fn checked(&self) -> Vec<String> {
            self.inputs
                .borrow()
                .iter()
                .filter(|(_, checked)| *checked)
                .map(|(name, _)| name.clone())
                .collect()
        }

        fn error(&self) -> String {
            self.error.borrow().clone()
        }
    }

    impl CheckoutView for RecordingView {
        fn set_submit_enabled(&self, enabled: bool) {
            self.submit_enabled.set(enabled);
        }

        fn set_spinner_visible(&self, visible: bool) {
            self.spinner_visible.set(visible);
        }

        fn set_button_text_visible(&self, visible: bool) {
            self.button_text_visible.set(visible);
        }

        fn check_plan_input(&self, name: &str) {
            for (input, checked) in self.inputs.borrow_mut().iter_mut() {
                *checked = input == name;
            }
        }

        fn set_plan_labels(&self, plan: &Plan) {
            *self.labels.borrow_mut() = Some(plan.clone());
        }

        fn show_error(&self, message: &str) {
            *self.error.borrow_mut() = message.to_string();
        }

        fn set_error_focused(&self, focused: bool) {
            self.focused.set(focused);
        }

        fn navigate(&self, url: &str) {
            *self.navigated.borrow_mut() = Some(url.to_string());
        }
    }

    fn checkout<G: PaymentGateway>(
        has_payment_method: bool,
        gateway: G,
        api: MockPaymentsApi,
    ) -> Checkout<RecordingView, G, MockPaymentsApi> {
        let config = CheckoutConfig {
            has_payment_method,
            billing_name: "ada".into(),
            ..CheckoutConfig::default()
        };
        let checkout = Checkout::new(RecordingView::new(), gateway, api, &config);
        checkout.prepare();
        checkout
    }

    fn standard() -> Plan {
        Plan::new("Standard", "€29", "price_standard")
    }

    fn active() -> SubscriptionResponse {
        SubscriptionResponse {
            status: Some("active".into()),
            error: None,
        }
    }

    fn declined() -> SubscriptionResponse {
        SubscriptionResponse {
            status: None,
            error: Some(BackendError::Detailed {
                message: "Card declined".into(),
            }),
        }
    }

    #[test]
    fn submit_is_disabled_until_a_plan_is_selected() {
        let checkout = checkout(false, MockPaymentGateway::new(), MockPaymentsApi::new());
        assert!(!checkout.view().submit_enabled.get());
        assert!(!checkout.view().spinner_visible.get());

        checkout.select_plan(standard());
        assert!(checkout.view().submit_enabled.get());
    }

    #[test]
    fn selecting_a_plan_checks_only_its_input() {
        let checkout = checkout(false, MockPaymentGateway::new(), MockPaymentsApi::new());

        checkout.select_plan(standard());
        checkout.select_plan(Plan::new("Premium", "€59", "price_premium"));

        assert_eq!(checkout.view().checked(), vec!["Premium".to_string()]);
        let labels = checkout.view().labels.borrow().clone().unwrap();
        assert_eq!(labels, Plan::new("Premium", "€59", "price_premium"));
        assert_eq!(checkout.selected_plan().unwrap().price_id, "price_premium");
    }

    #[test]
    fn unknown_plan_name_unchecks_everything() {
        let checkout = checkout(false, MockPaymentGateway::new(), MockPaymentsApi::new());
        checkout.select_plan(standard());
        checkout.select_plan(Plan::new("Enterprise", "call us", "price_ent"));
        assert!(checkout.view().checked().is_empty());
    }

    #[test]
    fn loading_round_trip_restores_the_button() {
        let checkout = checkout(false, MockPaymentGateway::new(), MockPaymentsApi::new());
        checkout.select_plan(standard());

        checkout.set_loading(true);
        assert!(!checkout.view().submit_enabled.get());
        assert!(checkout.view().spinner_visible.get());
        assert!(!checkout.view().button_text_visible.get());

        checkout.set_loading(false);
        checkout.set_loading(false);
        assert!(checkout.view().submit_enabled.get());
        assert!(!checkout.view().spinner_visible.get());
        assert!(checkout.view().button_text_visible.get());
    }

    #[test]
    fn card_events_drive_the_error_element() {
        let checkout = checkout(false, MockPaymentGateway::new(), MockPaymentsApi::new());

        checkout.card_focus_changed(true);
        assert!(checkout.view().focused.get());
        checkout.card_focus_changed(false);
        assert!(!checkout.view().focused.get());

        checkout.card_changed(&CardChange {
            error: Some(StripeError::new("Your card number is incomplete.")),
            ..CardChange::default()
        });
        assert_eq!(checkout.view().error(), "Your card number is incomplete.");

        checkout.card_changed(&CardChange::default());
        assert_eq!(checkout.view().error(), "");
    }

    #[tokio::test]
    async fn new_card_is_tokenized_and_forwarded() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment_method()
            .withf(|name| name == "ada")
            .times(1)
            .returning(|_| Ok("pm_123".to_string()));

        let mut api = MockPaymentsApi::new();
        api.expect_create_subscription()
            .withf(|request| {
                request.price_id == "price_standard"
                    && request.payment_method.as_deref() == Some("pm_123")
            })
            .times(1)
            .returning(|_| Ok(active()));

        let checkout = checkout(false, gateway, api);
        checkout.select_plan(standard());

        let outcome = checkout.submit().await;

        assert_eq!(outcome, SubmitOutcome::Redirected(COMPLETE.to_string()));
        let navigated = checkout.view().navigated.borrow().clone();
        assert_eq!(navigated.as_deref(), Some(COMPLETE));
        assert_eq!(checkout.state(), CheckoutState::Redirecting);
        assert!(checkout.view().spinner_visible.get());
    }

    #[tokio::test]
    async fn selecting_a_plan_while_redirecting_keeps_submit_disabled() {
        let mut api = MockPaymentsApi::new();
        api.expect_create_subscription()
            .times(1)
            .returning(|_| Ok(active()));

        let checkout = checkout(true, MockPaymentGateway::new(), api);
        checkout.select_plan(standard());
        checkout.submit().await;
        assert_eq!(checkout.state(), CheckoutState::Redirecting);

        checkout.select_plan(Plan::new("Premium", "€59", "price_premium"));

        assert!(!checkout.view().submit_enabled.get());
        assert!(checkout.view().spinner_visible.get());
        assert_eq!(checkout.view().checked(), vec!["Premium".to_string()]);
    }

    #[tokio::test]
    async fn stored_payment_method_skips_the_card() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment_method().never();

        let mut api = MockPaymentsApi::new();
        api.expect_create_subscription()
            .withf(|request| request.payment_method.is_none())
            .times(1)
            .returning(|_| Ok(active()));

        let checkout = checkout(true, gateway, api);
        checkout.select_plan(standard());

        let outcome = checkout.submit().await;
        assert_eq!(outcome, SubmitOutcome::Redirected(COMPLETE.to_string()));
    }

    #[tokio::test]
    async fn backend_error_is_shown_and_the_form_reset() {
        let mut api = MockPaymentsApi::new();
        api.expect_create_subscription()
            .times(1)
            .returning(|_| Ok(declined()));

        let checkout = checkout(true, MockPaymentGateway::new(), api);
        checkout.select_plan(standard());

        let outcome = checkout.submit().await;

        assert_eq!(
            outcome,
            SubmitOutcome::Failed(CheckoutError::Backend("Card declined".into()))
        );
        assert_eq!(checkout.view().error(), "Card declined");
        assert_eq!(checkout.state(), CheckoutState::Idle);
        assert!(checkout.view().submit_enabled.get());
        assert!(!checkout.view().spinner_visible.get());
        assert!(checkout.view().navigated.borrow().is_none());
    }

    #[tokio::test]
    async fn card_error_stops_before_the_backend() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment_method()
            .returning(|_| Err(StripeError::new("Your card was declined.")));

        let mut api = MockPaymentsApi::new();
        api.expect_create_subscription().never();

        let checkout = checkout(false, gateway, api);
        checkout.select_plan(standard());

        let outcome = checkout.submit().await;

        assert!(matches!(outcome, SubmitOutcome::Failed(CheckoutError::Stripe(_))));
        assert_eq!(checkout.view().error(), "Your card was declined.");
        assert_eq!(checkout.state(), CheckoutState::Idle);
        assert!(checkout.view().submit_enabled.get());
    }

    #[tokio::test]
    async fn incomplete_subscription_returns_to_idle_silently() {
        let mut api = MockPaymentsApi::new();
        api.expect_create_subscription().returning(|_| {
            Ok(SubscriptionResponse {
                status: Some("incomplete".into()),
                error: None,
            })
        });

        let checkout = checkout(true, MockPaymentGateway::new(), api);
        checkout.select_plan(standard());

        let outcome = checkout.submit().await;

        assert_eq!(outcome, SubmitOutcome::NotActive(Some("incomplete".into())));
        assert_eq!(checkout.view().error(), "");
        assert_eq!(checkout.state(), CheckoutState::Idle);
        assert!(!checkout.view().spinner_visible.get());
    }

    #[tokio::test]
    async fn network_failure_shows_generic_message() {
        let mut api = MockPaymentsApi::new();
        api.expect_create_subscription()
            .returning(|_| Err(CheckoutError::Network("connection refused".into())));

        let checkout = checkout(true, MockPaymentGateway::new(), api);
        checkout.select_plan(standard());

        let outcome = checkout.submit().await;

        assert!(matches!(outcome, SubmitOutcome::Failed(CheckoutError::Network(_))));
        assert_eq!(checkout.view().error(), crate::error::GENERIC_ERROR_MESSAGE);
        assert_eq!(checkout.state(), CheckoutState::Idle);
    }

    #[tokio::test]
    async fn submit_without_plan_asks_for_one() {
        let mut api = MockPaymentsApi::new();
        api.expect_create_subscription().never();

        let checkout = checkout(true, MockPaymentGateway::new(), api);

        let outcome = checkout.submit().await;

        assert_eq!(
            outcome,
            SubmitOutcome::Failed(CheckoutError::NoPlanSelected)
        );
        assert_eq!(checkout.view().error(), NO_PLAN_MESSAGE);
        assert_eq!(checkout.state(), CheckoutState::Idle);
    }

    #[tokio::test]
    async fn submit_after_redirect_is_ignored() {
        let mut api = MockPaymentsApi::new();
        api.expect_create_subscription()
            .times(1)
            .returning(|_| Ok(active()));

        let checkout = checkout(true, MockPaymentGateway::new(), api);
        checkout.select_plan(standard());

        checkout.submit().await;
        assert_eq!(checkout.submit().await, SubmitOutcome::Ignored);
    }

    #[tokio::test]
    async fn retry_after_failure_is_allowed() {
        let mut api = MockPaymentsApi::new();
        let mut seq = mockall::Sequence::new();
        api.expect_create_subscription()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(declined()));
        api.expect_create_subscription()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(active()));

        let checkout = checkout(true, MockPaymentGateway::new(), api);
        checkout.select_plan(standard());

        assert!(matches!(checkout.submit().await, SubmitOutcome::Failed(_)));
        assert_eq!(
            checkout.submit().await,
            SubmitOutcome::Redirected(COMPLETE.to_string())
        );
    }

    #[tokio::test]
    async fn hosted_checkout_uses_the_selected_price() {
        let mut api = MockPaymentsApi::new();
        api.expect_create_checkout_session()
            .withf(|price_id| price_id == "price_standard")
            .times(1)
            .returning(|_| Ok(HostedCheckout::Session("cs_test_1".into())));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_redirect_to_checkout()
            .withf(|session_id| session_id == "cs_test_1")
            .times(1)
            .returning(|_| Ok(()));

        let checkout = checkout(false, gateway, api);
        checkout.select_plan(standard());

        assert_eq!(checkout.start_hosted_checkout().await, Ok(()));
        assert_eq!(checkout.view().error(), "");
    }

    #[tokio::test]
    async fn hosted_checkout_without_plan_never_calls_the_backend() {
        let mut api = MockPaymentsApi::new();
        api.expect_create_checkout_session().never();

        let checkout = checkout(false, MockPaymentGateway::new(), api);

        assert_eq!(
            checkout.start_hosted_checkout().await,
            Err(CheckoutError::NoPlanSelected)
        );
        assert_eq!(checkout.view().error(), NO_PLAN_MESSAGE);
    }

    #[tokio::test]
    async fn hosted_checkout_redirect_error_is_shown() {
        let mut api = MockPaymentsApi::new();
        api.expect_create_checkout_session()
            .returning(|_| Ok(HostedCheckout::Session("cs_test_1".into())));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_redirect_to_checkout()
            .returning(|_| Err(StripeError::new("No such checkout session")));

        let checkout = checkout(false, gateway, api);
        checkout.select_plan(standard());

        assert!(checkout.start_hosted_checkout().await.is_err());
        assert_eq!(checkout.view().error(), "No such checkout session");
    }

    #[tokio::test]
    async fn hosted_checkout_for_a_subscribed_customer_goes_to_completion() {
        let mut api = MockPaymentsApi::new();
        api.expect_create_checkout_session()
            .times(1)
            .returning(|_| Ok(HostedCheckout::Subscribed));

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_redirect_to_checkout().never();

        let checkout = checkout(true, gateway, api);
        checkout.select_plan(standard());

        assert_eq!(checkout.start_hosted_checkout().await, Ok(()));
        let navigated = checkout.view().navigated.borrow().clone();
        assert_eq!(navigated.as_deref(), Some(COMPLETE));
        assert_eq!(checkout.state(), CheckoutState::Redirecting);
    }

    #[tokio::test]
    async fn stored_payment_method_checks_out_before_stripe_loads() {
        let mut api = MockPaymentsApi::new();
        api.expect_create_subscription()
            .withf(|request| request.payment_method.is_none())
            .times(1)
            .returning(|_| Ok(active()));

        let checkout = checkout(true, StripeGateway::new(), api);
        checkout.select_plan(standard());

        let outcome = checkout.submit().await;
        assert_eq!(outcome, SubmitOutcome::Redirected(COMPLETE.to_string()));
    }

    #[tokio::test]
    async fn new_card_without_stripe_fails_and_resets_the_form() {
        let mut api = MockPaymentsApi::new();
        api.expect_create_subscription().never();

        let checkout = checkout(false, StripeGateway::new(), api);
        checkout.select_plan(standard());

        let outcome = checkout.submit().await;

        assert!(matches!(outcome, SubmitOutcome::Failed(CheckoutError::Stripe(_))));
        assert_eq!(checkout.view().error(), STRIPE_UNAVAILABLE_MESSAGE);
        assert_eq!(checkout.state(), CheckoutState::Idle);
        assert!(checkout.view().submit_enabled.get());
        assert!(!checkout.view().spinner_visible.get());
    }
}
