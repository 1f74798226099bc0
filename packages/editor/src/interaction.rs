//! # Interactions
//!
//! Links and buttons carry an [`Interaction`]. Invoking one goes through host
//! hooks: a [`LinkResolver`] for urls and a [`ScriptHost`] for scripts. The
//! same script host evaluates dynamic text expressions.
//!
//! Failures are returned to the caller, which shows them next to the node
//! that was activated.

use crate::errors::InteractionError;
use async_trait::async_trait;
use scribing_flow::Interaction;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub url: String,
    /// Browsing context to open the url in, `None` for the current one
    pub target: Option<String>,
}

#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<ResolvedLink, InteractionError>;
}

#[async_trait]
pub trait ScriptHost: Send + Sync {
    async fn eval(&self, script: &str, vars: &Map<String, Value>) -> Result<Value, InteractionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionOutcome {
    Navigate(ResolvedLink),
    Evaluated(Value),
}

#[derive(Clone, Default)]
pub struct InteractionInvoker {
    links: Option<Arc<dyn LinkResolver>>,
    scripts: Option<Arc<dyn ScriptHost>>,
}

impl InteractionInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_link_resolver(mut self, resolver: Arc<dyn LinkResolver>) -> Self {
        self.links = Some(resolver);
        self
    }

    pub fn with_script_host(mut self, host: Arc<dyn ScriptHost>) -> Self {
        self.scripts = Some(host);
        self
    }

    /// Run an interaction. `Ok(None)` when `cancel` fired before the result
    /// was ready; the result is then discarded.
    pub async fn invoke(
        &self,
        interaction: &Interaction,
        vars: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<Option<InteractionOutcome>, InteractionError> {
        let outcome = match interaction {
            Interaction::OpenUrl { url } => {
                let resolver = self.links.as_ref().ok_or(InteractionError::NoLinkResolver)?;
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    resolved = resolver.resolve(url) => Some(InteractionOutcome::Navigate(resolved?)),
                }
            }
            Interaction::RunScript { script } => self
                .evaluate(script, vars, cancel)
                .await?
                .map(InteractionOutcome::Evaluated),
        };

        if cancel.is_cancelled() {
            debug!("Interaction finished after cancellation; result dropped");
            return Ok(None);
        }
        Ok(outcome)
    }

    /// Evaluate a script or dynamic text expression
    pub async fn evaluate(
        &self,
        expression: &str,
        vars: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, InteractionError> {
        let host = self.scripts.as_ref().ok_or(InteractionError::NoScriptHost)?;
        let value = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            value = host.eval(expression, vars) => value?,
        };
        if cancel.is_cancelled() {
            return Ok(None);
        }
        Ok(Some(value))
    }
}
