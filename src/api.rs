//! Backend payments API.
//!
//! Three endpoints: the Stripe publishable key, subscription creation, and
//! Checkout Session creation. Requests go out same-origin with the Django
//! CSRF header.

use async_trait::async_trait;
use gloo_net::http::{Request, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use web_sys::RequestCredentials;

use crate::config::CheckoutConfig;
use crate::error::CheckoutError;

/// Subscription status that completes the checkout.
pub const ACTIVE_STATUS: &str = "active";

/// `GET config/` response.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct PaymentsConfig {
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

/// `POST create-sub` body.
///
/// `payment_method` is serialized as `null` when the customer pays with the
/// method already stored on their account.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SubscriptionRequest {
    pub price_id: String,
    pub payment_method: Option<String>,
}

/// Error member of a backend response.
///
/// The API documents `{ "message": ... }`, the Django view sends the bare
/// string; both are accepted.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum BackendError {
    Detailed { message: String },
    Plain(String),
}

impl BackendError {
    pub fn message(&self) -> &str {
        match self {
            BackendError::Detailed { message } => message,
            BackendError::Plain(message) => message,
        }
    }
}

/// `POST create-sub` response. Only `status` and `error` are read; the rest
/// of the Stripe subscription object is ignored.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SubscriptionResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<BackendError>,
}

impl SubscriptionResponse {
    /// The response itself, or its backend error as a failure.
    pub fn into_result(self) -> Result<Self, CheckoutError> {
        match self.error {
            Some(err) => Err(CheckoutError::Backend(err.message().to_string())),
            None => Ok(self),
        }
    }

    pub fn is_active(&self) -> bool {
        self.error.is_none() && self.status.as_deref() == Some(ACTIVE_STATUS)
    }
}

/// What `create-checkout-session/` handed back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostedCheckout {
    /// A Checkout Session to redirect to.
    Session(String),
    /// The backend subscribed the customer directly; there is nothing to pay.
    Subscribed,
}

/// `GET create-checkout-session/` response.
///
/// The view answers `{sessionId}` normally, but when the customer can be
/// subscribed straight away it returns the subscription object instead.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CheckoutSessionResponse {
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<BackendError>,
}

impl CheckoutSessionResponse {
    pub fn into_hosted_checkout(self) -> Result<HostedCheckout, CheckoutError> {
        if let Some(err) = self.error {
            return Err(CheckoutError::Backend(err.message().to_string()));
        }
        match (self.session_id, self.status.as_deref()) {
            (Some(session_id), _) => Ok(HostedCheckout::Session(session_id)),
            (None, Some(ACTIVE_STATUS)) => Ok(HostedCheckout::Subscribed),
            (None, status) => Err(CheckoutError::Decode(format!(
                "response has no sessionId (status {:?})",
                status
            ))),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait(?Send)]
pub trait PaymentsApi {
    async fn fetch_config(&self) -> Result<PaymentsConfig, CheckoutError>;

    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionResponse, CheckoutError>;

    /// Ask for a Checkout Session for `price_id`.
    async fn create_checkout_session(
        &self,
        price_id: &str,
    ) -> Result<HostedCheckout, CheckoutError>;
}

/// [`PaymentsApi`] over `fetch`, via gloo-net.
#[derive(Clone, Debug)]
pub struct HttpPaymentsApi {
    config_url: String,
    create_subscription_url: String,
    checkout_session_url: String,
    csrf_token: String,
}

impl HttpPaymentsApi {
    pub fn new(config: &CheckoutConfig) -> Self {
        Self {
            config_url: config.config_url.clone(),
            create_subscription_url: config.create_subscription_url.clone(),
            checkout_session_url: config.checkout_session_url.clone(),
            csrf_token: config.csrf_token.clone(),
        }
    }
}

#[async_trait(?Send)]
impl PaymentsApi for HttpPaymentsApi {
    async fn fetch_config(&self) -> Result<PaymentsConfig, CheckoutError> {
        let response = Request::get(&self.config_url).send().await?;
        read_json(&response).await
    }

    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionResponse, CheckoutError> {
        log::debug!("creating subscription for price {}", request.price_id);
        let response = Request::post(&self.create_subscription_url)
            .header("X-CSRFToken", &self.csrf_token)
            .credentials(RequestCredentials::SameOrigin)
            .json(request)?
            .send()
            .await?;
        read_json(&response).await
    }

    async fn create_checkout_session(
        &self,
        price_id: &str,
    ) -> Result<HostedCheckout, CheckoutError> {
        let response = Request::get(&self.checkout_session_url)
            .query([("plan_id", price_id)])
            .send()
            .await?;
        read_json::<CheckoutSessionResponse>(&response)
            .await?
            .into_hosted_checkout()
    }
}

/// Decode a JSON body whatever the status; error payloads come back with 4xx.
async fn read_json<T: DeserializeOwned>(response: &Response) -> Result<T, CheckoutError> {
    match response.json::<T>().await {
        Ok(body) => Ok(body),
        Err(_) if !response.ok() => Err(CheckoutError::Status(response.status())),
        Err(err) => Err(err.into()),
    }
}
