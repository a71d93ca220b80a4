// src/scan.rs

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::llm::{self, LlmClient, ModelName, OpenAiClient};
use crate::normalize;
use crate::parse;
use crate::prompt::{self, EmbeddedTemplates, FsTemplateStore, TemplateStore};
use crate::receipt::Receipt;

/// The scan entry point: prompt → dispatch → parse → normalize.
///
/// Collaborators are injected at construction; there is no ambient state,
/// so concurrent scans on one scanner are independent. Failures at any
/// stage propagate unchanged — the orchestrator adds no error kinds of
/// its own.
pub struct ReceiptScanner {
    templates: Arc<dyn TemplateStore>,
    llm: Arc<dyn LlmClient>,
    default_model: ModelName,
}

impl ReceiptScanner {
    pub fn new(templates: Arc<dyn TemplateStore>, llm: Arc<dyn LlmClient>) -> ReceiptScanner {
        ReceiptScanner {
            templates,
            llm,
            default_model: ModelName::default(),
        }
    }

    pub fn with_default_model(mut self, model: ModelName) -> ReceiptScanner {
        self.default_model = model;
        self
    }

    /// Assemble the production wiring from configuration. This is the
    /// only place collaborators are resolved; the pipeline itself never
    /// reaches for globals.
    pub fn from_config(config: &Config) -> Result<ReceiptScanner> {
        let templates: Arc<dyn TemplateStore> = match &config.prompt_dir {
            Some(dir) => Arc::new(FsTemplateStore::new(dir)),
            None => Arc::new(EmbeddedTemplates),
        };
        let llm = Arc::new(OpenAiClient::from_config(&config.llm)?);
        let default_model: ModelName = config.llm.default_model.parse()?;

        Ok(ReceiptScanner::new(templates, llm).with_default_model(default_model))
    }

    /// Extract a validated [`Receipt`] from receipt text.
    pub async fn scan(&self, text: &str, model: Option<ModelName>) -> Result<Receipt> {
        let model = model.unwrap_or(self.default_model);

        let context = HashMap::from([("context".to_string(), text.to_string())]);
        let prompt = prompt::render(self.templates.as_ref(), "receipt", &context)?;
        info!(model = model.id(), prompt_len = prompt.len(), "Prompt rendered");

        let raw = llm::invoke(self.llm.as_ref(), model, &prompt).await?;
        info!(raw_len = raw.len(), "Model response received");

        let data = parse::parse(&raw)?;
        let receipt = normalize::normalize(&data)?;
        info!(
            merchant = %receipt.merchant.name,
            total = ?receipt.total_amount,
            currency = receipt.currency.code(),
            line_items = receipt.line_items.len(),
            "Receipt extracted"
        );

        Ok(receipt)
    }

    /// Run the same pipeline and return the mapping projection instead of
    /// the typed record. The projection is taken from the fully validated
    /// receipt — there is no looser validation path behind this form.
    pub async fn scan_as_map(&self, text: &str, model: Option<ModelName>) -> Result<Map<String, Value>> {
        Ok(self.scan(text, model).await?.to_map())
    }
}
