use loadcollect_common::{CollectError, CollectInputs, Result, ResultSet};
use loadcollect_payload::PayloadClient;
use std::sync::Arc;
use tracing::Span;
use uuid::Uuid;

use crate::config::{CollectorConfig, PartialResultPolicy};
use crate::context::ExecutionContext;
use crate::coordinator::{Coordinator, Incomplete};
use crate::duration::parse_duration;
use crate::runner::{LoadGenRunner, Query, QueryRunner};
use crate::store::ExperimentStore;

/// Entry point of a `metrics/collect` run: loads the experiment's previous results,
/// generates load against every version in parallel, and stores the merged totals.
pub struct Collector {
    config: CollectorConfig,
    runner: Arc<dyn QueryRunner>,
    store: Arc<dyn ExperimentStore>,
    payload: PayloadClient,
    span: Span,
}

impl Collector {
    /// Collector that spawns `config.loadgen` for each version.
    pub fn new(config: CollectorConfig, store: Arc<dyn ExperimentStore>, span: Span) -> Result<Self> {
        let runner = Arc::new(LoadGenRunner::new(config.loadgen.clone(), span.clone()));
        Self::with_runner(config, runner, store, span)
    }

    pub fn with_runner(
        config: CollectorConfig,
        runner: Arc<dyn QueryRunner>,
        store: Arc<dyn ExperimentStore>,
        span: Span,
    ) -> Result<Self> {
        let payload = PayloadClient::new(config.payload.clone(), span.clone())?;
        Ok(Self { config, runner, store, payload, span })
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Run one collection round and return the merged results.
    ///
    /// Nothing is stored unless every version completes, except when the config
    /// asks for partial results to be persisted. Load-only inputs never touch the
    /// store.
    pub async fn collect(&self, ctx: &ExecutionContext, mut inputs: CollectInputs) -> Result<ResultSet> {
        let span = tracing::info_span!(
            parent: &self.span,
            "collect",
            run_id = %Uuid::new_v4(),
            experiment = %ctx.experiment,
        );

        inputs.apply_defaults(&self.config.default_time, self.config.default_qps);
        inputs.validate()?;
        let time = inputs.time.clone().unwrap_or_else(|| self.config.default_time.clone());
        let duration = parse_duration(&time)
            .map_err(|e| CollectError::Config(format!("invalid time {time:?}: {e}")))?;
        let mut queries = self.queries(ctx, &inputs, &time)?;

        let prior = if inputs.load_only {
            ResultSet::new()
        } else {
            match self.store.load(&ctx.experiment)? {
                Some(blob) => ResultSet::decode(&blob)?,
                None => ResultSet::new(),
            }
        };
        tracing::debug!(parent: &span, prior_versions = prior.len(), load_only = inputs.load_only, "Loaded prior results");

        // Dropping `staged` removes the payload file, after every worker has
        // reported or the wait has given up.
        let staged = match &inputs.payload_url {
            Some(url) => Some(self.payload.stage(url).await?),
            None => None,
        };
        if let Some(staged) = &staged {
            for query in &mut queries {
                query.payload_file = Some(staged.path().to_path_buf());
            }
        }

        let deadline = duration + self.config.deadline_margin;
        let coordinator = Coordinator::new(Arc::clone(&self.runner), span.clone());
        let outcome = coordinator.collect(queries, prior, deadline).await;
        drop(staged);

        match outcome {
            Ok(merged) => {
                if !inputs.load_only {
                    self.store.store(&ctx.experiment, &merged.encode()?)?;
                }
                tracing::info!(parent: &span, versions = merged.len(), "Collection complete");
                Ok(merged)
            }
            Err(Incomplete { error, partial }) => {
                if self.config.partial_results == PartialResultPolicy::Persist && !inputs.load_only {
                    self.persist_partial(&span, ctx, &partial);
                }
                tracing::error!(parent: &span, error = %error, "Collection failed");
                Err(error)
            }
        }
    }

    fn queries(&self, ctx: &ExecutionContext, inputs: &CollectInputs, time: &str) -> Result<Vec<Query>> {
        inputs
            .versions
            .iter()
            .map(|version| -> Result<Query> {
                let headers = version
                    .headers
                    .iter()
                    .map(|(name, value)| -> Result<(String, String)> {
                        Ok((name.clone(), ctx.interpolate(value)?))
                    })
                    .collect::<Result<_>>()?;
                Ok(Query {
                    version: version.name.clone(),
                    time: time.to_string(),
                    qps: version.qps.unwrap_or(self.config.default_qps),
                    headers,
                    url: ctx.interpolate(&version.url)?,
                    payload_file: None,
                })
            })
            .collect()
    }

    /// Failing to write partial results must not mask the error that caused them.
    fn persist_partial(&self, span: &Span, ctx: &ExecutionContext, partial: &ResultSet) {
        let stored = partial.encode().and_then(|blob| self.store.store(&ctx.experiment, &blob));
        match stored {
            Ok(()) => tracing::warn!(parent: span, versions = partial.len(), "Stored partial results"),
            Err(e) => tracing::warn!(parent: span, error = %e, "Could not store partial results"),
        }
    }
}
