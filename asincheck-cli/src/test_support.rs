//! In-memory gateway for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use asincheck_common::api::{
    BillingInfo, CheckResponse, CheckResult, Plan, SubscriptionData, Usage, UsageReport,
};
use tokio::time::Instant;

use crate::gateway::{Gateway, GatewayError};

type CheckFn = Box<dyn Fn(&str) -> Result<CheckResponse, GatewayError> + Send + Sync>;

pub(crate) struct FakeGateway {
    pub ready: bool,
    check_fn: CheckFn,
    pub subscription: Mutex<Result<SubscriptionData, String>>,
    pub billing: Mutex<Result<BillingInfo, String>>,
    pub check_calls: Mutex<Vec<(String, Instant)>>,
    pub subscription_calls: AtomicUsize,
    pub billing_calls: AtomicUsize,
    /// Held by a test to park `subscription_data` mid-call
    pub subscription_gate: tokio::sync::Mutex<()>,
}

impl FakeGateway {
    /// Every ASIN comes back `Eligible`
    pub fn new() -> Self {
        Self::with_check(|asin| {
            Ok(CheckResponse {
                success: true,
                results: vec![eligible(asin)],
                usage: None,
                message: None,
            })
        })
    }

    pub fn with_check<F>(check: F) -> Self
    where
        F: Fn(&str) -> Result<CheckResponse, GatewayError> + Send + Sync + 'static,
    {
        Self {
            ready: true,
            check_fn: Box::new(check),
            subscription: Mutex::new(Ok(subscription_fixture(10, 100))),
            billing: Mutex::new(Ok(BillingInfo::default())),
            check_calls: Mutex::new(Vec::new()),
            subscription_calls: AtomicUsize::new(0),
            billing_calls: AtomicUsize::new(0),
            subscription_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn not_ready() -> Self {
        Self {
            ready: false,
            ..Self::new()
        }
    }

    pub fn set_subscription(&self, value: Result<SubscriptionData, String>) {
        *self.subscription.lock().unwrap() = value;
    }

    pub fn set_billing(&self, value: Result<BillingInfo, String>) {
        *self.billing.lock().unwrap() = value;
    }

    pub fn checked_asins(&self) -> Vec<String> {
        self.check_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(asin, _)| asin.clone())
            .collect()
    }

    pub fn fetch_rounds(&self) -> usize {
        self.subscription_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn ensure_ready(&self) -> Result<(), GatewayError> {
        if self.ready {
            Ok(())
        } else {
            Err(GatewayError::NotAuthenticated)
        }
    }

    async fn check_asins(&self, asins: &[String]) -> Result<CheckResponse, GatewayError> {
        let asin = asins.first().cloned().unwrap_or_default();
        self.check_calls
            .lock()
            .unwrap()
            .push((asin.clone(), Instant::now()));
        (self.check_fn)(&asin)
    }

    async fn subscription_data(&self) -> Result<SubscriptionData, GatewayError> {
        self.subscription_calls.fetch_add(1, Ordering::SeqCst);
        drop(self.subscription_gate.lock().await);
        self.subscription
            .lock()
            .unwrap()
            .clone()
            .map_err(GatewayError::Rejected)
    }

    async fn billing_info(&self) -> Result<BillingInfo, GatewayError> {
        self.billing_calls.fetch_add(1, Ordering::SeqCst);
        self.billing
            .lock()
            .unwrap()
            .clone()
            .map_err(GatewayError::Rejected)
    }
}

pub(crate) fn eligible(asin: &str) -> CheckResult {
    CheckResult {
        asin: asin.to_string(),
        title: Some(format!("Item {}", asin)),
        detailed_status: Some("Eligible".to_string()),
        sellable: Some(true),
        ..Default::default()
    }
}

pub(crate) fn with_status(asin: &str, status: &str) -> CheckResult {
    CheckResult {
        asin: asin.to_string(),
        detailed_status: Some(status.to_string()),
        sellable: Some(false),
        ..Default::default()
    }
}

pub(crate) fn response(result: CheckResult, usage: Option<UsageReport>) -> CheckResponse {
    CheckResponse {
        success: true,
        results: vec![result],
        usage,
        message: None,
    }
}

pub(crate) fn subscription_fixture(current: i64, limit: i64) -> SubscriptionData {
    SubscriptionData {
        plan: Plan {
            code: "basic".to_string(),
            name: "Basic".to_string(),
            monthly_limit: limit,
            is_active: true,
            ..Default::default()
        },
        usage: Usage {
            current,
            limit,
            percentage: Usage::compute_percentage(current, limit),
            reset_date: None,
        },
        ..Default::default()
    }
}
