use crate::llm::{CompletionModel, ProviderError};
use crate::models::{BigOReport, ComplexityReport, OptimizationReport};
use crate::normalize::{normalize_outcome, Normalize};
use crate::prompt::{build_prompt, PromptKind};
use std::sync::Arc;
use tracing::{error, info};

/// Prompt, call the model, normalize the reply.
pub struct AnalysisService {
    model: Arc<dyn CompletionModel>,
    absorb_provider_errors: bool,
}

impl AnalysisService {
    pub fn new(model: Arc<dyn CompletionModel>, absorb_provider_errors: bool) -> Self {
        Self {
            model,
            absorb_provider_errors,
        }
    }

    pub async fn analyze(&self, code: &str, language: &str) -> Result<ComplexityReport, ProviderError> {
        self.run(PromptKind::Analysis, code, language).await
    }

    pub async fn big_o(&self, code: &str, language: &str) -> Result<BigOReport, ProviderError> {
        self.run(PromptKind::BigO, code, language).await
    }

    pub async fn optimize(&self, code: &str, language: &str) -> Result<OptimizationReport, ProviderError> {
        self.run(PromptKind::Optimization, code, language).await
    }

    /// Only fails when provider errors are configured to surface.
    async fn run<T: Normalize>(
        &self,
        kind: PromptKind,
        code: &str,
        language: &str,
    ) -> Result<T, ProviderError> {
        let prompt = build_prompt(kind, code, language);
        info!(
            "requesting {:?} from {} ({} chars of {})",
            kind,
            self.model.name(),
            code.len(),
            language
        );
        let outcome = self.model.complete(&prompt).await;
        match outcome {
            Err(e) if !self.absorb_provider_errors => {
                error!("{:?} request failed: {}", kind, e);
                Err(e)
            }
            outcome => Ok(normalize_outcome(outcome, code)),
        }
    }
}
