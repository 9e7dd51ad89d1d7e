//! Calculator hand-off wiring.

use std::sync::Arc;

use tracing::{info, warn};

use cadenza_core::calculator::{
    CalculationDispatcher, CalculationSink, DisabledSink, DispatcherSettings,
    HttpCalculatorClient,
};

use crate::config::ApiConfig;

/// Build the sink completed compositions are submitted to. Without a
/// configured URL, or when the HTTP client cannot be built, requests are
/// logged and dropped.
pub fn calculation_sink(config: &ApiConfig) -> Arc<dyn CalculationSink> {
    let Some(url) = config.calculator_url.as_deref() else {
        info!("CALCULATOR_URL not set, calculator hand-off disabled");
        return Arc::new(DisabledSink);
    };
    match HttpCalculatorClient::new(url, config.calculator_timeout) {
        Ok(client) => {
            let settings = DispatcherSettings {
                max_attempts: config.calculator_max_attempts,
                ..DispatcherSettings::default()
            };
            info!(url, max_attempts = settings.max_attempts, "calculator dispatcher started");
            Arc::new(CalculationDispatcher::spawn(Arc::new(client), settings))
        }
        Err(e) => {
            warn!(error = %e, "calculator client unavailable, hand-off disabled");
            Arc::new(DisabledSink)
        }
    }
}
