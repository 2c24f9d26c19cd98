//! One-shot extraction entry points.
//!
//! These wrap the whole flow for callers that just have a list of paths or
//! URLs: resolve every input, deduplicate into a [`SubmissionSet`], pick an
//! LLM provider, run a fresh [`Pipeline`] and return the merged transactions.
//! Long-lived shells that need observable state or `reset` should build a
//! [`Pipeline`] themselves.

use crate::config::{ExtractionConfig, DEFAULT_MODEL};
use crate::error::RunError;
use crate::pipeline::input;
use crate::pipeline::llm::LlmExtractor;
use crate::run::Pipeline;
use crate::submission::SubmissionSet;
use crate::table;
use crate::transaction::Transaction;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Extract transactions from local files, URLs or data URLs.
///
/// # Returns
/// Every transaction of every supported document, sorted by date. Inputs of
/// an unsupported type are skipped; if nothing is left the result is empty
/// and no provider is contacted.
///
/// # Errors
/// The first unreadable input or failed extraction fails the whole call.
pub async fn extract_transactions<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<Vec<Transaction>, RunError> {
    let submissions = collect_submissions(inputs, config).await?;
    if submissions.is_empty() {
        info!("No supported documents among {} inputs", inputs.len());
        return Ok(Vec::new());
    }

    let provider = resolve_provider(config)?;
    let extractor = Arc::new(LlmExtractor::new(provider, config));
    let pipeline = Pipeline::new(extractor, config);
    pipeline.run(&submissions.snapshot()).await
}

/// Extract and write the TSV table to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
/// Returns the number of transactions written.
pub async fn extract_to_file<S: AsRef<str>>(
    inputs: &[S],
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<usize, RunError> {
    let transactions = extract_transactions(inputs, config).await?;
    let path = output_path.as_ref();
    write_atomic(path, &table::serialize(&transactions)).await?;
    info!("Wrote {} transactions to {}", transactions.len(), path.display());
    Ok(transactions.len())
}

/// Synchronous wrapper around [`extract_transactions`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<Vec<Transaction>, RunError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RunError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_transactions(inputs, config))
}

/// Resolve every input concurrently into a deduplicated submission set.
///
/// Input order is kept; unsupported documents are dropped.
pub async fn collect_submissions<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<SubmissionSet, RunError> {
    let resolved = try_join_all(
        inputs
            .iter()
            .map(|i| input::resolve_input(i.as_ref(), config.download_timeout_secs)),
    )
    .await?;

    let mut set = SubmissionSet::new();
    let added = set.extend(resolved.into_iter().flatten());
    debug!("{} of {} inputs accepted into the submission set", added, inputs.len());
    Ok(set)
}

/// Write `contents` to `path` through a sibling temp file.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), RunError> {
    let fail = |e| RunError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let tmp_path = path.with_extension("tsv.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}

fn create_vision_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, RunError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        RunError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Pick the vision provider for a run.
///
/// A pre-built `config.provider` wins. Otherwise a provider is named by
/// `config.provider_name`, then `EDGEQUAKE_LLM_PROVIDER`, then OpenAI when
/// `OPENAI_API_KEY` is set; its model is `config.model`, then
/// `EDGEQUAKE_MODEL`, then [`DEFAULT_MODEL`]. With no name at all the
/// provider is auto-detected by [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, RunError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let name = config
        .provider_name
        .clone()
        .or_else(|| env_value("EDGEQUAKE_LLM_PROVIDER"))
        .or_else(|| env_value("OPENAI_API_KEY").map(|_| "openai".to_string()));

    match name {
        Some(name) => {
            let model = config
                .model
                .clone()
                .or_else(|| env_value("EDGEQUAKE_MODEL"))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string());
            debug!("Using provider '{}' with model '{}'", name, model);
            create_vision_provider(&name, &model)
        }
        None => ProviderFactory::from_env()
            .map(|(llm, _embedding)| llm)
            .map_err(|e| RunError::ProviderNotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "Set OPENAI_API_KEY, ANTHROPIC_API_KEY or GEMINI_API_KEY, or pass --provider.\n\
                     Error: {e}"
                ),
            }),
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_drops_unsupported_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("march.pdf");
        let txt = dir.path().join("notes.txt");
        std::fs::write(&pdf, b"%PDF-1.7").unwrap();
        std::fs::write(&txt, b"hello").unwrap();

        let inputs = [
            pdf.to_str().unwrap(),
            txt.to_str().unwrap(),
            pdf.to_str().unwrap(),
        ];
        let set = collect_submissions(&inputs, &ExtractionConfig::default())
            .await
            .unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains("march.pdf", 8));
    }

    #[tokio::test]
    async fn collect_fails_on_missing_input() {
        let inputs = ["/no/such/statement.pdf"];
        let err = collect_submissions(&inputs, &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Read(_)));
    }

    #[tokio::test]
    async fn nothing_supported_returns_empty_without_provider() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hello").unwrap();
        let txs = extract_transactions(&[txt.to_str().unwrap()], &ExtractionConfig::default())
            .await
            .unwrap();
        assert!(txs.is_empty());
    }

    #[test]
    fn sync_wrapper_runs_without_ambient_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hello").unwrap();
        let txs = extract_sync(&[txt.to_str().unwrap()], &ExtractionConfig::default()).unwrap();
        assert!(txs.is_empty());
    }

    #[tokio::test]
    async fn extract_to_file_writes_empty_table_for_no_documents() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.tsv");
        let n = extract_to_file::<&str>(&[], &out, &ExtractionConfig::default())
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "");
    }

    #[test]
    fn prebuilt_provider_is_used_as_is() {
        let provider: Arc<dyn LLMProvider> = Arc::new(edgequake_llm::MockProvider::new());
        let config = ExtractionConfig::builder()
            .provider(Arc::clone(&provider))
            .provider_name("openai")
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(&resolve_provider(&config).unwrap(), &provider));
    }

    #[test]
    fn named_provider_is_created_with_model() {
        let config = ExtractionConfig::builder()
            .provider_name("mock")
            .model("vision-test")
            .build()
            .unwrap();
        assert_eq!(resolve_provider(&config).unwrap().name(), "mock");
    }

    #[test]
    fn unknown_provider_is_not_configured() {
        let config = ExtractionConfig::builder()
            .provider_name("carrier-pigeon")
            .build()
            .unwrap();
        match resolve_provider(&config) {
            Err(RunError::ProviderNotConfigured { provider, .. }) => {
                assert_eq!(provider, "carrier-pigeon")
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(p) => panic!("unexpected provider: {}", p.name()),
        }
    }

    #[tokio::test]
    async fn atomic_write_creates_parent_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("march.tsv");
        write_atomic(&path, "Date\tDescription\tCategory\tAmount").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Date\tDescription\tCategory\tAmount"
        );
        assert!(!path.with_extension("tsv.tmp").exists());
    }
}
