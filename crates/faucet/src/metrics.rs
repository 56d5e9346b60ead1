//! Prometheus metrics for claim processing

use crate::error::{FaucetError, FaucetResult};
use prometheus::{
    histogram_opts, opts, Encoder, Histogram, IntCounterVec, IntGauge, Registry, TextEncoder,
};

fn metric_error(e: prometheus::Error) -> FaucetError {
    FaucetError::Unexpected(format!("metrics: {}", e))
}

/// Faucet metrics, registered in a registry owned by the service
pub struct FaucetMetrics {
    registry: Registry,
    /// Claims by outcome code (`SUCCESS` or an error code)
    pub claims_total: IntCounterVec,
    pub claim_duration: Histogram,
    pub last_nonce: IntGauge,
}

impl FaucetMetrics {
    pub fn new() -> FaucetResult<Self> {
        let registry = Registry::new();

        let claims_total = IntCounterVec::new(
            opts!("faucet_claims_total", "Claim requests by outcome"),
            &["outcome"],
        )
        .map_err(metric_error)?;

        let claim_duration = Histogram::with_opts(
            histogram_opts!(
                "faucet_claim_duration_seconds",
                "Time from request to response for claims",
                vec![0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
            ),
        )
        .map_err(metric_error)?;

        let last_nonce = IntGauge::with_opts(opts!(
            "faucet_last_nonce",
            "Last nonce issued to the faucet wallet"
        ))
        .map_err(metric_error)?;

        registry.register(Box::new(claims_total.clone())).map_err(metric_error)?;
        registry.register(Box::new(claim_duration.clone())).map_err(metric_error)?;
        registry.register(Box::new(last_nonce.clone())).map_err(metric_error)?;

        Ok(Self {
            registry,
            claims_total,
            claim_duration,
            last_nonce,
        })
    }

    pub fn record_outcome<T>(&self, result: &FaucetResult<T>) {
        let outcome = match result {
            Ok(_) => "SUCCESS",
            Err(e) => e.code(),
        };
        self.claims_total.with_label_values(&[outcome]).inc();
    }

    /// Text exposition format
    pub fn gather(&self) -> FaucetResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metric_error)?;
        String::from_utf8(buffer).map_err(|e| FaucetError::Unexpected(e.to_string()))
    }
}
