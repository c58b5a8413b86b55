//! Advisory provider selection.

pub mod gemini;

use std::sync::Arc;

use safety_core::{AdvisoryProvider, LocalRuleProvider};
use tracing::{info, warn};

use crate::config::MonitorConfig;

pub use gemini::GeminiProvider;

/// Primary provider for a session: Gemini when a key is configured,
/// otherwise the local rule table.
pub fn primary_provider(config: &MonitorConfig) -> Arc<dyn AdvisoryProvider> {
    match GeminiProvider::new(&config.gemini) {
        Ok(provider) => {
            info!(model = %config.gemini.model, "Using Gemini advisory provider");
            Arc::new(provider)
        }
        Err(e) => {
            warn!(error = %e, "Remote advisories disabled; serving local rules only");
            Arc::new(LocalRuleProvider::new())
        }
    }
}
