#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::config::Config;
use crate::fetch::PageFetcher;
use crate::jobinfo::{self, JobInfo};
use crate::ollama::OllamaClient;
use crate::store::{self, RetrievedChunk};
use crate::{ColdreachError, Result};

/// Number of portfolio chunks retrieved as context for synthesis
pub const RETRIEVAL_TOP_K: usize = 4;

/// End-to-end email generation for one session's portfolio store.
///
/// A generation run is atomic from the caller's perspective: either both the
/// job info and the email are produced, or the whole call fails with a
/// single generation error. No state persists across calls.
pub struct EmailGenerator {
    client: OllamaClient,
    fetcher: PageFetcher,
    store_path: PathBuf,
}

impl EmailGenerator {
    #[inline]
    pub fn new(config: &Config, store_path: PathBuf) -> Result<Self> {
        let client = OllamaClient::new(config)
            .map_err(|e| ColdreachError::Config(format!("{:#}", e)))?;

        Ok(Self {
            client,
            fetcher: PageFetcher::new(&config.fetch),
            store_path,
        })
    }

    /// Generate a cold email for a job posting given as a URL or raw text
    #[inline]
    pub async fn generate(&self, job_input: &str) -> Result<(JobInfo, String)> {
        let job_text = if is_url(job_input) {
            debug!("Job input classified as URL");
            self.fetcher.fetch(job_input).map_err(|e| {
                ColdreachError::Generation(format!("Failed to fetch job posting: {:#}", e))
            })?
        } else {
            debug!("Job input classified as raw description text");
            job_input.to_string()
        };

        let job_info = jobinfo::extract(&self.client, &job_text)?;

        let context = store::search_text(
            &self.store_path,
            &self.client,
            &job_info.render(),
            RETRIEVAL_TOP_K,
        )
        .await
        .map_err(|e| ColdreachError::Generation(format!("Portfolio retrieval failed: {}", e)))?;
        debug!("Retrieved {} portfolio chunks as context", context.len());

        let email = synthesize_email(&self.client, &job_info, &context)?;

        info!("Generated email ({} bytes)", email.len());
        Ok((job_info, email))
    }
}

/// True if the job input should be treated as a URL to fetch
#[inline]
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Produce the final email text from job info and retrieved portfolio
/// context. The model is instructed to stay under 200 words; its output is
/// returned verbatim with no post-processing or enforced truncation.
#[inline]
pub fn synthesize_email(
    client: &OllamaClient,
    job_info: &JobInfo,
    context: &[RetrievedChunk],
) -> Result<String> {
    client.complete(&email_prompt(job_info, context)).map_err(|e| {
        ColdreachError::Generation(format!("Email synthesis model call failed: {:#}", e))
    })
}

pub(crate) fn email_prompt(job_info: &JobInfo, context: &[RetrievedChunk]) -> String {
    let portfolio_context = context
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "### JOB REQUIREMENTS:\n\
         {}\n\
         \n\
         ### MY QUALIFICATIONS (FROM PORTFOLIO):\n\
         {}\n\
         \n\
         ### INSTRUCTION:\n\
         Write a professional cold email that matches my qualifications with this job.\n\
         Highlight specific relevant skills and experiences.\n\
         Keep it concise (under 200 words), professional, and include a call to action.\n\
         Strictly follow the limit of the 200 words and keep the email relevant and to the point.\n\
         ### EMAIL (NO PREAMBLE):\n",
        job_info.render(),
        portfolio_context
    )
}

/// Explicit cache of generators keyed by store path.
///
/// Replaces the process-wide singleton the naive design would use: the cache
/// is passed through the service boundary and invalidated when a session's
/// store is cleared.
#[derive(Default)]
pub struct GeneratorCache {
    generators: Mutex<HashMap<PathBuf, Arc<EmailGenerator>>>,
}

impl GeneratorCache {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached generator for `store_path`, creating it on first use
    #[inline]
    pub fn get_or_create(&self, config: &Config, store_path: &Path) -> Result<Arc<EmailGenerator>> {
        let mut generators = self
            .generators
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(generator) = generators.get(store_path) {
            return Ok(Arc::clone(generator));
        }

        debug!("Creating generator for store {:?}", store_path);
        let generator = Arc::new(EmailGenerator::new(config, store_path.to_path_buf())?);
        generators.insert(store_path.to_path_buf(), Arc::clone(&generator));
        Ok(generator)
    }

    /// Drop the cached generator for a store, if any. Called when the store
    /// is cleared so a later setup starts from a fresh generator.
    #[inline]
    pub fn invalidate(&self, store_path: &Path) {
        let mut generators = self
            .generators
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if generators.remove(store_path).is_some() {
            debug!("Invalidated cached generator for {:?}", store_path);
        }
    }
}
