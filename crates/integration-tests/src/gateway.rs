//! A payment gateway whose verify answers are set by the test.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::json;

use texos_core::GatewayStatus;
use texos_core::gateway::{
    GatewayError, GatewayVerification, InitializedPayment, PaymentGateway, PaymentInit,
};

/// What the gateway reports when a reference is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failed,
    Abandoned,
    Pending,
    Reversed,
    /// The verify call times out.
    Timeout,
    /// The verify call fails at the transport level.
    Unreachable,
}

#[derive(Debug, Default)]
struct Script {
    verdicts: HashMap<String, Verdict>,
    /// Overrides the amount reported back, for mismatch tests.
    reported_amounts: HashMap<String, i64>,
    initialized: Vec<PaymentInit>,
    verify_calls: HashMap<String, usize>,
    refuse_initialize: bool,
}

/// Scripted [`PaymentGateway`].
///
/// `initialize` echoes the reference and remembers the amount; `verify`
/// answers with the scripted verdict (pending until scripted) and, by
/// default, the amount that was initialized.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn script(&self, reference: &str, verdict: Verdict) {
        self.lock().verdicts.insert(reference.to_owned(), verdict);
    }

    /// Script a verdict that reports a specific amount in kobo.
    pub fn script_with_amount(&self, reference: &str, verdict: Verdict, amount_minor: i64) {
        let mut script = self.lock();
        script.verdicts.insert(reference.to_owned(), verdict);
        script
            .reported_amounts
            .insert(reference.to_owned(), amount_minor);
    }

    /// Make every following `initialize` call fail.
    pub fn refuse_initialize(&self) {
        self.lock().refuse_initialize = true;
    }

    #[must_use]
    pub fn initialized(&self) -> Vec<PaymentInit> {
        self.lock().initialized.clone()
    }

    #[must_use]
    pub fn verify_calls(&self, reference: &str) -> usize {
        self.lock().verify_calls.get(reference).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initialize(&self, request: &PaymentInit) -> Result<InitializedPayment, GatewayError> {
        let mut script = self.lock();
        if script.refuse_initialize {
            return Err(GatewayError::Rejected("Invalid key".to_owned()));
        }
        script.initialized.push(request.clone());

        Ok(InitializedPayment {
            reference: request.reference.clone(),
            authorization_url: Some(format!(
                "https://checkout.gateway.test/{}",
                request.reference
            )),
            access_code: Some(format!("ac_{}", request.reference)),
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, GatewayError> {
        let mut script = self.lock();
        *script.verify_calls.entry(reference.to_owned()).or_default() += 1;

        let verdict = script
            .verdicts
            .get(reference)
            .copied()
            .unwrap_or(Verdict::Pending);
        let status = match verdict {
            Verdict::Success => GatewayStatus::Success,
            Verdict::Failed => GatewayStatus::Failed,
            Verdict::Abandoned => GatewayStatus::Abandoned,
            Verdict::Pending => GatewayStatus::Pending,
            Verdict::Reversed => GatewayStatus::Reversed,
            Verdict::Timeout => return Err(GatewayError::Timeout),
            Verdict::Unreachable => {
                return Err(GatewayError::Transport("connection reset by peer".to_owned()));
            }
        };

        let amount_minor = script
            .reported_amounts
            .get(reference)
            .copied()
            .or_else(|| {
                script
                    .initialized
                    .iter()
                    .find(|init| init.reference == reference)
                    .map(|init| init.amount_minor)
            })
            .unwrap_or(0);

        Ok(GatewayVerification {
            status,
            amount_minor,
            gateway_response: Some(format!("{verdict:?}")),
            raw: json!({
                "reference": reference,
                "status": status,
                "amount": amount_minor,
            }),
        })
    }
}
