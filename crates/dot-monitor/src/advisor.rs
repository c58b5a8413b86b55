//! Single-flight advisory service.
//!
//! Wraps the primary provider with a deadline and the fallback policy. At
//! most one request runs at a time; the gate is a [`FlightGuard`] that
//! reopens when dropped, so a cancelled or panicking request cannot leave the
//! service stuck busy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use safety_core::advisory::fallback_for;
use safety_core::{Advisory, AdvisoryError, AdvisoryInput, AdvisoryProvider, DegradedResponse};
use tracing::{error, info, warn};

/// Proof that the caller holds the single advisory slot.
#[derive(Debug)]
pub struct FlightGuard {
    in_flight: Arc<AtomicBool>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct AdvisoryService {
    primary: Arc<dyn AdvisoryProvider>,
    timeout: Duration,
    in_flight: Arc<AtomicBool>,
}

impl AdvisoryService {
    pub fn new(primary: Arc<dyn AdvisoryProvider>, timeout: Duration) -> Self {
        Self {
            primary,
            timeout,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.primary.name()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the advisory slot, or `Busy` if a request is outstanding.
    pub fn try_begin(&self) -> Result<FlightGuard, AdvisoryError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AdvisoryError::Busy)?;
        Ok(FlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Run one advisory request end to end.
    ///
    /// Only `Busy` is returned as an error; every provider failure comes back
    /// as a degraded response.
    pub async fn request(
        &self,
        input: &AdvisoryInput,
    ) -> Result<DegradedResponse<Advisory>, AdvisoryError> {
        let flight = self.try_begin()?;
        Ok(self.run_flight(flight, input).await)
    }

    /// Run a request under an already-claimed slot. The slot is released when
    /// this returns.
    pub async fn run_flight(
        &self,
        _flight: FlightGuard,
        input: &AdvisoryInput,
    ) -> DegradedResponse<Advisory> {
        let provider = self.primary.name();
        let outcome = match tokio::time::timeout(self.timeout, self.primary.advise(input)).await {
            Ok(result) => result,
            Err(_) => Err(AdvisoryError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(advisory) => {
                info!(provider, risk = %advisory.risk_level, "Advisory ready");
                DegradedResponse::full(advisory, provider)
            }
            Err(err) => {
                let category = err.category();
                if category.uses_local_fallback() {
                    warn!(provider, %category, error = %err, "Advisory degraded to local rules");
                } else {
                    error!(provider, %category, error = %err, "Advisory failed");
                }
                fallback_for(&err, input).unwrap_or_else(|| {
                    DegradedResponse::unavailable(Advisory::analysis_failed(), &err.to_string())
                })
            }
        }
    }
}

impl std::fmt::Debug for AdvisoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisoryService")
            .field("provider", &self.primary.name())
            .field("timeout", &self.timeout)
            .field("busy", &self.is_busy())
            .finish()
    }
}
