// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Orchestrator: dispatches one document to every registered module on the
// blocking pool, isolates failures and timeouts, then scores the results.
//
// Modules are synchronous and CPU-bound, so each runs under
// `tokio::task::spawn_blocking` with its own `tokio::time::timeout`. A
// module that errors, panics or runs out of time is replaced by a neutral
// failed result; the analysis itself never fails because of one module.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{Span, debug, info, instrument, warn};
use uuid::Uuid;

use trustmark_core::error::{Result, TrustmarkError};
use trustmark_core::{
    AnalysisContext, AnalysisReport, AnalyzerConfig, DocumentFacts, ModuleResult, clamp_confidence,
};
use trustmark_detect::{
    ContentModule, DetectionModule, ExternalModule, FontsModule, ImagesModule, MetadataModule,
    RegistryClient, StructureModule, TemplateModule, TemplateStore, VisualModule,
};
use trustmark_document::PdfExtractor;

use crate::scoring::aggregate;
use crate::summary::summarize;

// -- Cancellation -------------------------------------------------------------

/// Cancels one analysis as a whole. Clones share the same signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender gone: nobody can cancel any more.
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

// -- Orchestrator -------------------------------------------------------------

pub struct Orchestrator {
    config: AnalyzerConfig,
    /// Registration order is report order.
    modules: Vec<Arc<dyn DetectionModule>>,
}

impl Orchestrator {
    /// Validate the configuration and register the built-in modules.
    ///
    /// Template and external verification need collaborators and are added
    /// through [`Orchestrator::with_template_store`] and
    /// [`Orchestrator::with_registry`].
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        let mut modules: Vec<Arc<dyn DetectionModule>> = vec![
            Arc::new(MetadataModule),
            Arc::new(ContentModule),
            Arc::new(VisualModule),
            Arc::new(FontsModule),
            Arc::new(ImagesModule::new(config.forensics.clone())),
        ];
        if config.modules.structure {
            modules.push(Arc::new(StructureModule));
        }

        info!(
            modules = modules.len(),
            timeout_ms = config.module_timeout_ms,
            "Orchestrator ready"
        );
        Ok(Self { config, modules })
    }

    /// Register the template module, if enabled.
    pub fn with_template_store(self, store: Arc<dyn TemplateStore>) -> Self {
        if !self.config.modules.template {
            debug!("Template module disabled, store ignored");
            return self;
        }
        self.with_module(Arc::new(TemplateModule::new(store)))
    }

    /// Register the external verification module, if enabled.
    pub fn with_registry(self, client: Arc<dyn RegistryClient>) -> Self {
        if !self.config.modules.external {
            debug!("External module disabled, registry ignored");
            return self;
        }
        self.with_module(Arc::new(ExternalModule::new(client)))
    }

    /// Register any additional module. Its weight comes from `weights.custom`.
    pub fn with_module(mut self, module: Arc<dyn DetectionModule>) -> Self {
        debug!(module = module.name(), "Module registered");
        self.modules.push(module);
        self
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|module| module.name()).collect()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// A fresh context stamped with the current time.
    pub fn context(&self) -> AnalysisContext {
        AnalysisContext::new(Utc::now())
            .with_expected_domains(self.config.expected_domains.clone())
            .with_issuer_name(self.config.issuer_name.clone())
    }

    // -- Entry points ---------------------------------------------------------

    /// Read and analyze a PDF file. Only ingestion errors reach the caller.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn analyze_file(&self, path: impl AsRef<Path>) -> Result<AnalysisReport> {
        let path = path.as_ref().to_path_buf();
        let facts = tokio::task::spawn_blocking(move || {
            PdfExtractor::open(&path).map(|extractor| extractor.extract())
        })
        .await
        .map_err(|err| TrustmarkError::Extraction(format!("ingestion task failed: {err}")))??;

        Ok(self.analyze(facts, self.context()).await)
    }

    /// Analyze a PDF already in memory.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub async fn analyze_bytes(&self, bytes: Vec<u8>) -> Result<AnalysisReport> {
        let facts = tokio::task::spawn_blocking(move || {
            PdfExtractor::from_bytes(bytes).map(|extractor| extractor.extract())
        })
        .await
        .map_err(|err| TrustmarkError::Extraction(format!("ingestion task failed: {err}")))??;

        Ok(self.analyze(facts, self.context()).await)
    }

    /// Like [`Orchestrator::analyze`], but gives up as soon as `cancel` fires.
    ///
    /// No partial report is produced. Dropping the pending analysis aborts
    /// the per-module tasks; blocking work already started is detached and
    /// its result discarded.
    pub async fn analyze_with_cancel(
        &self,
        facts: DocumentFacts,
        ctx: AnalysisContext,
        cancel: &CancelToken,
    ) -> Result<AnalysisReport> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Analysis cancelled");
                Err(TrustmarkError::Cancelled)
            }

            report = self.analyze(facts, ctx) => Ok(report),
        }
    }

    /// Run every module concurrently and build the report.
    #[instrument(skip_all, name = "analysis", fields(analysis_id = tracing::field::Empty, modules = self.modules.len()))]
    pub async fn analyze(&self, facts: DocumentFacts, ctx: AnalysisContext) -> AnalysisReport {
        let analysis_id = Uuid::new_v4();
        Span::current().record("analysis_id", tracing::field::display(analysis_id));
        let started = Instant::now();

        let file_hash = facts.file_hash.clone();
        let facts = Arc::new(facts);
        let ctx = Arc::new(ctx);
        let timeout = self.config.module_timeout();
        let timeout_ms = self.config.module_timeout_ms;

        let mut tasks = JoinSet::new();
        for (index, module) in self.modules.iter().enumerate() {
            let module = Arc::clone(module);
            let facts = Arc::clone(&facts);
            let ctx = Arc::clone(&ctx);
            let span = Span::current();

            tasks.spawn(async move {
                let name = module.name().to_string();
                let work = tokio::task::spawn_blocking(move || {
                    let _entered = span.enter();
                    module.analyze(&facts, &ctx)
                });

                let outcome = match tokio::time::timeout(timeout, work).await {
                    Err(_) => Err(TrustmarkError::ModuleTimeout {
                        module: name.clone(),
                        timeout_ms,
                    }),
                    Ok(Err(join_err)) if join_err.is_panic() => {
                        Err(TrustmarkError::module(&name, "module panicked"))
                    }
                    Ok(Err(join_err)) => Err(TrustmarkError::module(&name, join_err.to_string())),
                    Ok(Ok(result)) => result,
                };
                (index, name, outcome)
            });
        }

        let mut slots: Vec<Option<ModuleResult>> = vec![None; self.modules.len()];
        while let Some(joined) = tasks.join_next().await {
            let Ok((index, name, outcome)) = joined else {
                // The wrapper task never panics; an abort leaves its slot empty.
                continue;
            };
            let result = match outcome {
                Ok(mut result) => {
                    result.module_name = name;
                    result.confidence = clamp_confidence(result.confidence);
                    result.score = result.score.min(100);
                    debug!(
                        module = %result.module_name,
                        score = result.score,
                        confidence = result.confidence,
                        flags = result.flags.len(),
                        "Module finished"
                    );
                    result
                }
                Err(err) => {
                    warn!(module = %name, error = %err, "Module failed, using neutral result");
                    ModuleResult::failed(name)
                }
            };
            slots[index] = Some(result);
        }

        let module_results: Vec<ModuleResult> = slots
            .into_iter()
            .zip(&self.modules)
            .map(|(slot, module)| slot.unwrap_or_else(|| ModuleResult::failed(module.name())))
            .collect();

        let scored = aggregate(&module_results, &self.config.weights);
        let summary = summarize(&module_results, scored.risk_level, scored.low_confidence);
        let analysis_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            trust_score = scored.trust_score,
            risk_level = %scored.risk_level,
            low_confidence = scored.low_confidence,
            elapsed_ms = analysis_time_ms,
            "Analysis complete"
        );

        AnalysisReport {
            analysis_id,
            file_hash,
            trust_score: scored.trust_score,
            risk_level: scored.risk_level,
            module_results,
            summary,
            analysis_time_ms,
            low_confidence: scored.low_confidence,
            analyzed_at: Utc::now(),
        }
    }
}
