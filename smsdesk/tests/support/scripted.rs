//! In-memory `ActivationApi` replaying a fixed list of status responses.
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use smsdesk::api::{ActivationApi, ActivationStatus, PurchaseReceipt, RefundReceipt};
use smsdesk::async_trait::async_trait;
use smsdesk::ApiError;
use tokio::{sync::Notify, time::Instant};

pub struct ScriptedApi {
    purchase: Mutex<VecDeque<Result<PurchaseReceipt, ApiError>>>,
    statuses: Mutex<VecDeque<Result<ActivationStatus, ApiError>>>,
    refund_result: Mutex<Result<RefundReceipt, ApiError>>,
    buy_calls: AtomicUsize,
    status_calls: Mutex<Vec<Instant>>,
    refunds: Mutex<Vec<(String, f64)>>,
    check_gate: Option<Arc<Notify>>,
}

pub fn receipt(activation_id: &str, credits_spent: f64) -> PurchaseReceipt {
    PurchaseReceipt {
        balance: 100.0 - credits_spent,
        activation_id: activation_id.to_string(),
        phone_number: "+5511999990000".to_string(),
        credits_spent,
    }
}

pub fn status(status: &str, code: Option<&str>) -> Result<ActivationStatus, ApiError> {
    Ok(ActivationStatus {
        status: Some(status.to_string()),
        code: code.map(str::to_string),
    })
}

impl ScriptedApi {
    /// Purchases of `A1` for 5 credits; once the script runs out every check
    /// reports "0" (pending).
    pub fn new(statuses: Vec<Result<ActivationStatus, ApiError>>) -> Self {
        Self {
            purchase: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(statuses.into()),
            refund_result: Mutex::new(Ok(RefundReceipt { balance: 100.0 })),
            buy_calls: AtomicUsize::new(0),
            status_calls: Mutex::new(Vec::new()),
            refunds: Mutex::new(Vec::new()),
            check_gate: None,
        }
    }

    /// Queue purchase outcomes; once exhausted purchases succeed.
    pub fn with_purchases(self, results: Vec<Result<PurchaseReceipt, ApiError>>) -> Self {
        *self.purchase.lock().unwrap() = results.into();
        self
    }

    pub fn with_refund_result(self, result: Result<RefundReceipt, ApiError>) -> Self {
        *self.refund_result.lock().unwrap() = result;
        self
    }

    /// Hold every status check until `gate` is notified.
    pub fn with_check_gate(mut self, gate: Arc<Notify>) -> Self {
        self.check_gate = Some(gate);
        self
    }

    pub fn buy_calls(&self) -> usize {
        self.buy_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.lock().unwrap().len()
    }

    pub fn status_call_times(&self) -> Vec<Instant> {
        self.status_calls.lock().unwrap().clone()
    }

    pub fn refunds(&self) -> Vec<(String, f64)> {
        self.refunds.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivationApi for ScriptedApi {
    async fn buy_number(
        &self,
        _service: &str,
        _country: &str,
    ) -> Result<PurchaseReceipt, ApiError> {
        self.buy_calls.fetch_add(1, Ordering::SeqCst);
        self.purchase
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(receipt("A1", 5.0)))
    }

    async fn activation_status(&self, _activation_id: &str) -> Result<ActivationStatus, ApiError> {
        self.status_calls.lock().unwrap().push(Instant::now());
        if let Some(gate) = &self.check_gate {
            gate.notified().await;
        }
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| status("0", None))
    }

    async fn refund(
        &self,
        activation_id: &str,
        credits_spent: f64,
    ) -> Result<RefundReceipt, ApiError> {
        self.refunds
            .lock()
            .unwrap()
            .push((activation_id.to_string(), credits_spent));
        self.refund_result.lock().unwrap().clone()
    }
}
