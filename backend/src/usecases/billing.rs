use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use domain::{
    entities::plans::PlanEntity,
    repositories::{
        identity::IdentityProvider, plans::PlanRepository,
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        enums::{billing_types::BillingType, plan_intervals::PlanInterval},
        subscriptions::CheckoutUpsert,
    },
};
use infra::payments::stripe_client::{StripeClient, StripeEvent, StripeSubscription};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::errors::{EngineError, UseCaseResult, is_unique_violation};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_customer(&self, email: &str, user_id: Uuid) -> AnyResult<String>;

    async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: Option<String>,
        success_url: &str,
        cancel_url: &str,
        metadata: HashMap<String, String>,
    ) -> AnyResult<String>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_customer(&self, email: &str, user_id: Uuid) -> AnyResult<String> {
        self.create_customer(email, user_id).await
    }

    async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: Option<String>,
        success_url: &str,
        cancel_url: &str,
        metadata: HashMap<String, String>,
    ) -> AnyResult<String> {
        self.create_checkout_session(price_id, customer_id, success_url, cancel_url, metadata)
            .await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }
}

/// Reconciles payment-gateway state into subscription rows. Checkout opens
/// a session only; the row appears when the signed completion event lands.
pub struct BillingUseCase<P, S, I, G>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    subscription_repo: Arc<S>,
    identity: Arc<I>,
    gateway: Arc<G>,
    success_url: String,
    cancel_url: String,
}

impl<P, S, I, G> BillingUseCase<P, S, I, G>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: IdentityProvider + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        plan_repo: Arc<P>,
        subscription_repo: Arc<S>,
        identity: Arc<I>,
        gateway: Arc<G>,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            plan_repo,
            subscription_repo,
            identity,
            gateway,
            success_url,
            cancel_url,
        }
    }

    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        plan_code: &str,
    ) -> UseCaseResult<String> {
        info!(%user_id, plan_code, "billing: checkout session requested");

        let plan = self
            .plan_repo
            .find_by_code(plan_code)
            .await
            .map_err(|err| {
                error!(%user_id, plan_code, db_error = ?err, "billing: failed to load plan");
                EngineError::Internal(err)
            })?
            .ok_or_else(|| EngineError::NotFound(format!("plan {plan_code}")))?;

        if BillingType::from_str(&plan.billing_type) != Some(BillingType::Recurring) {
            warn!(%user_id, plan_code, "billing: checkout refused for non-recurring plan");
            return Err(EngineError::InvalidPlan(format!(
                "plan {plan_code} is not purchasable"
            )));
        }

        let price_id = plan.stripe_price_id.clone().ok_or_else(|| {
            warn!(%user_id, plan_code, "billing: plan has no gateway price configured");
            EngineError::InvalidPlan(format!("plan {plan_code} has no price configured"))
        })?;

        let profile = self.identity.resolve_user(user_id).await.map_err(|err| {
            error!(%user_id, error = %err, "billing: identity lookup failed before checkout");
            EngineError::ExternalLookupFailed("identity provider".to_string())
        })?;

        let email = profile.email.ok_or_else(|| {
            warn!(%user_id, "billing: user has no email, cannot open checkout");
            EngineError::ExternalLookupFailed("user email".to_string())
        })?;

        let customer_id = self
            .gateway
            .create_customer(&email, user_id)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "billing: failed to create gateway customer");
                EngineError::Internal(err)
            })?;

        let metadata = HashMap::from([
            ("user_id".to_string(), user_id.to_string()),
            ("plan_code".to_string(), plan_code.to_string()),
        ]);

        let checkout_url = self
            .gateway
            .create_checkout_session(
                &price_id,
                Some(customer_id),
                &self.success_url,
                &self.cancel_url,
                metadata,
            )
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    plan_code,
                    price_id = %price_id,
                    error = ?err,
                    "billing: gateway checkout session creation failed"
                );
                EngineError::Internal(err)
            })?;

        info!(%user_id, plan_code, "billing: checkout session created");
        Ok(checkout_url)
    }

    /// Handles a raw webhook delivery. Signature failures are the only hard
    /// rejection; everything else is either processed or acknowledged so the
    /// gateway does not retry events no redelivery can fix.
    pub async fn handle_event(&self, payload: &[u8], signature: &str) -> UseCaseResult<()> {
        let event = self
            .gateway
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "billing: webhook signature verification failed");
                EngineError::SignatureInvalid
            })?;

        info!(event_type = %event.type_, "billing: webhook verified");

        match event.type_.as_str() {
            "checkout.session.completed" => self.handle_checkout_completed(&event).await,
            "invoice.payment_failed" => {
                // Grace on payment failure: the period stands until it
                // lapses and the expiry sweep reclaims it.
                info!("billing: payment failure acknowledged without action");
                Ok(())
            }
            _ => {
                debug!(event_type = %event.type_, "billing: unhandled webhook event type");
                Ok(())
            }
        }
    }

    async fn handle_checkout_completed(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let Some(session) = StripeClient::extract_checkout_session(event) else {
            warn!("billing: checkout event without a session object, acknowledging");
            return Ok(());
        };

        let Some(user_id) = session
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get("user_id"))
            .and_then(|value| Uuid::parse_str(value).ok())
        else {
            warn!("billing: checkout session missing user_id metadata, acknowledging");
            return Ok(());
        };

        let Some(subscription_ref) = session.subscription.clone() else {
            warn!(%user_id, "billing: checkout session missing subscription id, acknowledging");
            return Ok(());
        };

        let gateway_subscription = self
            .gateway
            .retrieve_subscription(&subscription_ref)
            .await
            .map_err(|err| {
                // Transient; a non-2xx makes the gateway redeliver.
                error!(
                    %user_id,
                    subscription_ref = %subscription_ref,
                    error = ?err,
                    "billing: failed to retrieve gateway subscription"
                );
                EngineError::ExternalLookupFailed("gateway subscription".to_string())
            })?;

        let Some(price_id) = gateway_subscription.price_id() else {
            warn!(
                %user_id,
                subscription_ref = %subscription_ref,
                "billing: gateway subscription carries no price, acknowledging"
            );
            return Ok(());
        };

        let plan = match self
            .plan_repo
            .find_by_stripe_price_id(price_id)
            .await
            .map_err(|err| {
                error!(%user_id, price_id, db_error = ?err, "billing: plan lookup failed");
                EngineError::Internal(err)
            })? {
            Some(plan) => plan,
            None => {
                // Permanently unresolvable; retrying would only storm.
                warn!(
                    %user_id,
                    price_id,
                    "billing: no plan matches purchased price, acknowledging"
                );
                return Ok(());
            }
        };

        let (period_start, period_end) = Self::period_bounds(&gateway_subscription, &plan);

        let upsert = CheckoutUpsert {
            user_id,
            plan_id: plan.id,
            period_start,
            period_end,
            stripe_customer_ref: session.customer.clone(),
            stripe_subscription_ref: subscription_ref.clone(),
        };

        match self.subscription_repo.upsert_from_checkout(upsert.clone()).await {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                // Another delivery of the same event flipped the current
                // flag first; rerun the write against the winner's state.
                warn!(
                    %user_id,
                    subscription_ref = %subscription_ref,
                    "billing: lost a current-flag race on checkout upsert, retrying once"
                );
                self.subscription_repo
                    .upsert_from_checkout(upsert)
                    .await
                    .map_err(|retry_err| {
                        error!(
                            %user_id,
                            subscription_ref = %subscription_ref,
                            db_error = ?retry_err,
                            "billing: checkout upsert retry failed"
                        );
                        if is_unique_violation(&retry_err) {
                            // Non-2xx; the gateway redelivers and the next
                            // attempt lands on settled state.
                            EngineError::Concurrency
                        } else {
                            EngineError::Internal(retry_err)
                        }
                    })?;
            }
            Err(err) => {
                error!(
                    %user_id,
                    plan_id = %plan.id,
                    subscription_ref = %subscription_ref,
                    db_error = ?err,
                    "billing: failed to upsert subscription after checkout"
                );
                return Err(EngineError::Internal(err));
            }
        }

        info!(
            %user_id,
            plan_code = %plan.code,
            subscription_ref = %subscription_ref,
            "billing: checkout reconciled into subscription"
        );

        Ok(())
    }

    /// Period bounds from the gateway when it reports them, otherwise
    /// `now + interval` computed locally from the plan.
    fn period_bounds(
        gateway_subscription: &StripeSubscription,
        plan: &PlanEntity,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();

        let start = gateway_subscription
            .period_start()
            .and_then(ts_to_datetime)
            .unwrap_or(now);

        let fallback_length = PlanInterval::from_str(&plan.billing_interval)
            .and_then(|interval| interval.approximate_duration())
            .unwrap_or_else(|| Duration::days(30));

        let end = gateway_subscription
            .period_end()
            .and_then(ts_to_datetime)
            .unwrap_or(start + fallback_length);

        (start, end)
    }
}

fn ts_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use domain::entities::subscriptions::SubscriptionEntity;
    use domain::repositories::identity::{MockIdentityProvider, UserProfile};
    use domain::repositories::plans::MockPlanRepository;
    use domain::repositories::subscriptions::MockSubscriptionRepository;
    use domain::value_objects::enums::user_roles::UserRole;
    use infra::payments::stripe_client::{
        StripeEventData, StripePrice, StripeSubscriptionItem, StripeSubscriptionItems,
    };
    use serde_json::json;

    fn unique_violation() -> anyhow::Error {
        anyhow::Error::new(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key value violates unique constraint".to_string()),
        ))
    }

    fn recurring_plan(price_id: &str) -> PlanEntity {
        PlanEntity {
            id: Uuid::new_v4(),
            code: "STANDARD_MONTHLY".to_string(),
            name: "Standard (monthly)".to_string(),
            billing_type: "recurring".to_string(),
            billing_interval: "month".to_string(),
            scans_per_day: 25,
            trial_days: 0,
            price_minor: 990,
            stripe_price_id: Some(price_id.to_string()),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn checkout_event(user_id: Uuid, subscription_ref: &str) -> StripeEvent {
        StripeEvent {
            id: Some("evt_1".to_string()),
            type_: "checkout.session.completed".to_string(),
            data: StripeEventData {
                object: json!({
                    "id": "cs_1",
                    "subscription": subscription_ref,
                    "customer": "cus_1",
                    "metadata": {
                        "user_id": user_id.to_string(),
                        "plan_code": "STANDARD_MONTHLY",
                    },
                }),
            },
        }
    }

    fn gateway_subscription(price_id: &str, start: i64, end: i64) -> StripeSubscription {
        StripeSubscription {
            current_period_start: Some(start),
            current_period_end: Some(end),
            items: StripeSubscriptionItems {
                data: vec![StripeSubscriptionItem {
                    current_period_start: None,
                    current_period_end: None,
                    price: Some(StripePrice {
                        id: Some(price_id.to_string()),
                    }),
                }],
            },
        }
    }

    fn subscription_row(user_id: Uuid, plan_id: Uuid) -> SubscriptionEntity {
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            plan_id,
            status: "active".to_string(),
            current_period_start: Utc::now(),
            current_period_end: Some(Utc::now() + Duration::days(30)),
            is_current: true,
            is_active: true,
            ended_at: None,
            stripe_customer_ref: Some("cus_1".to_string()),
            stripe_subscription_ref: Some("sub_1".to_string()),
            created_at: Utc::now(),
        }
    }

    fn usecase(
        plan_repo: MockPlanRepository,
        subscription_repo: MockSubscriptionRepository,
        identity: MockIdentityProvider,
        gateway: MockPaymentGateway,
    ) -> BillingUseCase<
        MockPlanRepository,
        MockSubscriptionRepository,
        MockIdentityProvider,
        MockPaymentGateway,
    > {
        BillingUseCase::new(
            Arc::new(plan_repo),
            Arc::new(subscription_repo),
            Arc::new(identity),
            Arc::new(gateway),
            "https://app.example.com/billing/success".to_string(),
            "https://app.example.com/billing/cancel".to_string(),
        )
    }

    #[tokio::test]
    async fn checkout_rejects_non_recurring_plans() {
        let mut plan_repo = MockPlanRepository::new();
        plan_repo.expect_find_by_code().returning(|_| {
            let mut plan = recurring_plan("price_1");
            plan.billing_type = "free".to_string();
            Ok(Some(plan))
        });

        let usecase = usecase(
            plan_repo,
            MockSubscriptionRepository::new(),
            MockIdentityProvider::new(),
            MockPaymentGateway::new(),
        );

        let err = usecase
            .create_checkout_session(Uuid::new_v4(), "FREE_PLAN")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPlan(_)));
    }

    #[tokio::test]
    async fn checkout_rejects_plans_without_a_gateway_price() {
        let mut plan_repo = MockPlanRepository::new();
        plan_repo.expect_find_by_code().returning(|_| {
            let mut plan = recurring_plan("price_1");
            plan.stripe_price_id = None;
            Ok(Some(plan))
        });

        let usecase = usecase(
            plan_repo,
            MockSubscriptionRepository::new(),
            MockIdentityProvider::new(),
            MockPaymentGateway::new(),
        );

        let err = usecase
            .create_checkout_session(Uuid::new_v4(), "STANDARD_MONTHLY")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPlan(_)));
    }

    #[tokio::test]
    async fn checkout_opens_a_session_with_user_metadata() {
        let user_id = Uuid::new_v4();

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_code()
            .returning(|_| Ok(Some(recurring_plan("price_1"))));

        let mut identity = MockIdentityProvider::new();
        identity.expect_resolve_user().returning(move |_| {
            Ok(UserProfile {
                id: user_id,
                role: UserRole::Member,
                email: Some("user@example.com".to_string()),
            })
        });

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_customer()
            .returning(|_, _| Ok("cus_1".to_string()));
        gateway
            .expect_create_checkout_session()
            .withf(move |price_id, customer, _, _, metadata| {
                price_id == "price_1"
                    && customer.as_deref() == Some("cus_1")
                    && metadata.get("user_id") == Some(&user_id.to_string())
                    && metadata.get("plan_code") == Some(&"STANDARD_MONTHLY".to_string())
            })
            .returning(|_, _, _, _, _| Ok("https://checkout.stripe.com/c/pay/cs_1".to_string()));

        let usecase = usecase(
            plan_repo,
            MockSubscriptionRepository::new(),
            identity,
            gateway,
        );

        let url = usecase
            .create_checkout_session(user_id, "STANDARD_MONTHLY")
            .await
            .unwrap();
        assert!(url.starts_with("https://checkout.stripe.com/"));
    }

    #[tokio::test]
    async fn invalid_signature_rejects_without_processing() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(anyhow!("invalid webhook signature")));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_upsert_from_checkout().times(0);

        let usecase = usecase(
            MockPlanRepository::new(),
            subscription_repo,
            MockIdentityProvider::new(),
            gateway,
        );

        let err = usecase.handle_event(b"{}", "t=1,v1=bad").await.unwrap_err();
        assert!(matches!(err, EngineError::SignatureInvalid));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn completed_checkout_upserts_by_subscription_ref() {
        let user_id = Uuid::new_v4();
        let plan = recurring_plan("price_1");
        let plan_id = plan.id;
        let start = Utc::now().timestamp();
        let end = (Utc::now() + Duration::days(30)).timestamp();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(checkout_event(user_id, "sub_1")));
        gateway
            .expect_retrieve_subscription()
            .returning(move |_| Ok(gateway_subscription("price_1", start, end)));

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_stripe_price_id()
            .returning(move |_| Ok(Some(plan.clone())));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_upsert_from_checkout()
            .withf(move |upsert| {
                upsert.user_id == user_id
                    && upsert.plan_id == plan_id
                    && upsert.stripe_subscription_ref == "sub_1"
                    && upsert.stripe_customer_ref.as_deref() == Some("cus_1")
            })
            .times(1)
            .returning(move |upsert| Ok(subscription_row(upsert.user_id, upsert.plan_id)));

        let usecase = usecase(
            plan_repo,
            subscription_repo,
            MockIdentityProvider::new(),
            gateway,
        );

        usecase.handle_event(b"{}", "t=1,v1=good").await.unwrap();
    }

    #[tokio::test]
    async fn checkout_upsert_race_is_retried_once() {
        let user_id = Uuid::new_v4();
        let plan = recurring_plan("price_1");
        let start = Utc::now().timestamp();
        let end = (Utc::now() + Duration::days(30)).timestamp();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(checkout_event(user_id, "sub_1")));
        gateway
            .expect_retrieve_subscription()
            .returning(move |_| Ok(gateway_subscription("price_1", start, end)));

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_stripe_price_id()
            .returning(move |_| Ok(Some(plan.clone())));

        let mut subscription_repo = MockSubscriptionRepository::new();
        let mut attempts = 0;
        subscription_repo
            .expect_upsert_from_checkout()
            .times(2)
            .returning(move |upsert| {
                attempts += 1;
                if attempts == 1 {
                    Err(unique_violation())
                } else {
                    Ok(subscription_row(upsert.user_id, upsert.plan_id))
                }
            });

        let usecase = usecase(
            plan_repo,
            subscription_repo,
            MockIdentityProvider::new(),
            gateway,
        );

        usecase.handle_event(b"{}", "t=1,v1=good").await.unwrap();
    }

    #[tokio::test]
    async fn persistent_checkout_upsert_race_maps_to_concurrency() {
        let user_id = Uuid::new_v4();
        let plan = recurring_plan("price_1");
        let start = Utc::now().timestamp();
        let end = (Utc::now() + Duration::days(30)).timestamp();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(checkout_event(user_id, "sub_1")));
        gateway
            .expect_retrieve_subscription()
            .returning(move |_| Ok(gateway_subscription("price_1", start, end)));

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_stripe_price_id()
            .returning(move |_| Ok(Some(plan.clone())));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_upsert_from_checkout()
            .times(2)
            .returning(|_| Err(unique_violation()));

        let usecase = usecase(
            plan_repo,
            subscription_repo,
            MockIdentityProvider::new(),
            gateway,
        );

        let err = usecase.handle_event(b"{}", "t=1,v1=good").await.unwrap_err();
        assert!(matches!(err, EngineError::Concurrency));
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn replayed_checkout_event_upserts_the_same_key_each_time() {
        let user_id = Uuid::new_v4();
        let plan = recurring_plan("price_1");
        let plan_id = plan.id;
        let start = Utc::now().timestamp();
        let end = (Utc::now() + Duration::days(30)).timestamp();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .times(2)
            .returning(move |_, _| Ok(checkout_event(user_id, "sub_1")));
        gateway
            .expect_retrieve_subscription()
            .times(2)
            .returning(move |_| Ok(gateway_subscription("price_1", start, end)));

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_stripe_price_id()
            .returning(move |_| Ok(Some(plan.clone())));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_upsert_from_checkout()
            .withf(move |upsert| {
                upsert.user_id == user_id
                    && upsert.plan_id == plan_id
                    && upsert.stripe_subscription_ref == "sub_1"
            })
            .times(2)
            .returning(move |upsert| Ok(subscription_row(upsert.user_id, upsert.plan_id)));

        let usecase = usecase(
            plan_repo,
            subscription_repo,
            MockIdentityProvider::new(),
            gateway,
        );

        // Webhook deliveries are at-least-once; both land on the same
        // (user_id, subscription ref) key, so the second is a no-op rewrite
        // rather than a duplicate row.
        usecase.handle_event(b"{}", "t=1,v1=good").await.unwrap();
        usecase.handle_event(b"{}", "t=1,v1=good").await.unwrap();
    }

    #[tokio::test]
    async fn unknown_price_is_acknowledged_without_a_row() {
        let user_id = Uuid::new_v4();
        let start = Utc::now().timestamp();
        let end = (Utc::now() + Duration::days(30)).timestamp();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(checkout_event(user_id, "sub_1")));
        gateway
            .expect_retrieve_subscription()
            .returning(move |_| Ok(gateway_subscription("price_retired", start, end)));

        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_find_by_stripe_price_id()
            .returning(|_| Ok(None));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_upsert_from_checkout().times(0);

        let usecase = usecase(
            plan_repo,
            subscription_repo,
            MockIdentityProvider::new(),
            gateway,
        );

        // 2xx acknowledgement; redelivery cannot resolve a retired price.
        usecase.handle_event(b"{}", "t=1,v1=good").await.unwrap();
    }

    #[tokio::test]
    async fn payment_failed_is_a_deliberate_no_op() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_verify_webhook_signature().returning(|_, _| {
            Ok(StripeEvent {
                id: Some("evt_2".to_string()),
                type_: "invoice.payment_failed".to_string(),
                data: StripeEventData {
                    object: json!({"subscription": "sub_1"}),
                },
            })
        });

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_upsert_from_checkout().times(0);
        subscription_repo.expect_expire().times(0);

        let usecase = usecase(
            MockPlanRepository::new(),
            subscription_repo,
            MockIdentityProvider::new(),
            gateway,
        );

        usecase.handle_event(b"{}", "t=1,v1=good").await.unwrap();
    }
}
