
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ollama::OllamaClient;
use crate::{ColdreachError, Result};

/// Structured fields extracted from a job posting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParsedJobInfo {
    pub role: String,
    pub experience: String,
    pub skills: Vec<String>,
    pub description: String,
}

/// Outcome of a single extraction attempt.
///
/// `Parsed` carries the full structured fields; `Fallback` carries only the
/// original posting text and is produced when the model's output is not
/// valid structured data. There is no partial-field recovery between the
/// two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobInfo {
    Parsed(ParsedJobInfo),
    Fallback { description: String },
}

impl JobInfo {
    /// Textual rendering used both as the retrieval query and in the email
    /// synthesis prompt
    #[inline]
    pub fn render(&self) -> String {
        match self {
            Self::Parsed(info) => format!(
                "Role: {}\nExperience: {}\nSkills: {}\nDescription: {}",
                info.role,
                info.experience,
                info.skills.join(", "),
                info.description
            ),
            Self::Fallback { description } => format!("Description: {}", description),
        }
    }

    #[inline]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Extract structured job info from posting text.
///
/// Makes exactly one model call. A failed call (transport error, server
/// error after client retries) is a hard generation error; a completed call
/// whose output cannot be parsed degrades to `JobInfo::Fallback` holding the
/// original text, with no retry.
#[inline]
pub fn extract(client: &OllamaClient, job_text: &str) -> Result<JobInfo> {
    let response = client.complete(&extraction_prompt(job_text)).map_err(|e| {
        ColdreachError::Generation(format!("Job extraction model call failed: {:#}", e))
    })?;

    match parse_job_info(&response) {
        Some(parsed) => {
            debug!("Extracted job info for role '{}'", parsed.role);
            Ok(JobInfo::Parsed(parsed))
        }
        None => {
            warn!("Model output was not valid job info JSON, falling back to raw description");
            Ok(JobInfo::Fallback {
                description: job_text.to_string(),
            })
        }
    }
}

pub(crate) fn extraction_prompt(job_text: &str) -> String {
    format!(
        "### JOB POSTING TEXT:\n\
         {job_text}\n\
         \n\
         ### INSTRUCTION:\n\
         Extract the job information into JSON format with these keys:\n\
         - `role`: job title/position\n\
         - `experience`: required experience level\n\
         - `skills`: list of required technical skills\n\
         - `description`: main responsibilities/requirements\n\
         Return only valid JSON, no other text.\n\
         ### VALID JSON (NO PREAMBLE):\n"
    )
}

/// Parse a model response strictly into the four recognized fields.
///
/// Tolerates code fences and surrounding prose by parsing the outermost
/// `{...}` span, but the JSON itself must match the schema exactly. A
/// response that parses to entirely empty fields is treated as a failure.
fn parse_job_info(response: &str) -> Option<ParsedJobInfo> {
    let body = extract_json_object(response)?;
    let parsed: ParsedJobInfo = serde_json::from_str(body).ok()?;

    if parsed.role.is_empty() && parsed.description.is_empty() {
        return None;
    }
    Some(parsed)
}

fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}
