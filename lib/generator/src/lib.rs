use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Default limit on one generation round trip, independent of whatever
/// deadline the caller is under.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Generator request timed out")]
    Timeout,
    #[error("Generator returned an unusable payload: {0}")]
    Malformed(String),
    #[error("Generator upstream failure: {0}")]
    Upstream(String),
}

/// Everything the prompt is assembled from.
#[derive(Debug, Clone)]
pub struct GenerationSpec {
    pub template_html: String,
    pub template_title: String,
    pub department: Option<String>,
    pub category: Option<String>,
    pub organization_name: String,
}

#[async_trait::async_trait]
pub trait GeneratorConnector {
    /// Requests an initial HTML body for a policy. Implementations normalize
    /// the raw reply; callers get either usable HTML or an error.
    async fn generate(&self, spec: &GenerationSpec) -> Result<String, GeneratorError>;
}

#[derive(Serialize)]
struct GeneratorRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct GeneratorReply {
    response: Option<String>,
}

/// Talks to the text-generation service over plain HTTP POST. No retries; if
/// the caller wants them, they are the caller's job.
pub struct HttpGenerator {
    url:    String,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GeneratorError> {
        let url: String = url.into();
        info!("Creating new HttpGenerator to '{url}'");
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|err| GeneratorError::Upstream(err.to_string()))?;
        Ok(Self { url, client })
    }
}

#[async_trait::async_trait]
impl GeneratorConnector for HttpGenerator {
    async fn generate(&self, spec: &GenerationSpec) -> Result<String, GeneratorError> {
        let prompt = build_prompt(spec);
        debug!("Sending generation request to '{}' ({} prompt chars)", self.url, prompt.len());

        let res = self
            .client
            .post(&self.url)
            .json(&GeneratorRequest { message: &prompt })
            .send()
            .await
            .map_err(|err| if err.is_timeout() { GeneratorError::Timeout } else { GeneratorError::Upstream(err.to_string()) })?;
        if !res.status().is_success() {
            return Err(GeneratorError::Upstream(format!("service returned status {}", res.status())));
        }

        let reply: GeneratorReply = res.json().await.map_err(|err| GeneratorError::Malformed(err.to_string()))?;
        let raw = reply.response.ok_or_else(|| GeneratorError::Malformed("missing 'response' field".into()))?;
        let html = normalize_reply(&raw);
        if html.is_empty() {
            return Err(GeneratorError::Malformed("empty response body".into()));
        }
        debug!("Generator returned {} chars of HTML", html.len());
        Ok(html)
    }
}

/// Assembles the natural-language prompt for one policy.
pub fn build_prompt(spec: &GenerationSpec) -> String {
    let mut prompt = format!(
        "You are a compliance writer. Produce a complete HTML policy document titled \"{}\" for the organization \"{}\".\n",
        spec.template_title, spec.organization_name,
    );
    if let Some(department) = &spec.department {
        prompt.push_str(&format!("The policy applies to the {department} department.\n"));
    }
    if let Some(category) = &spec.category {
        prompt.push_str(&format!("File it under the category \"{category}\".\n"));
    }
    prompt.push_str(
        "Keep the structure and section order of the base template below, substituting organization-specific details where placeholders \
         appear. Reply with the HTML document only, no commentary.\n\nBase template:\n",
    );
    prompt.push_str(&spec.template_html);
    prompt
}

/// Scrubs the service's reply into plain HTML: surrounding markdown code
/// fences and quote pairs go, and when a full document is embedded in
/// chatter we cut to the first doctype declaration.
pub fn normalize_reply(raw: &str) -> String {
    let mut text = raw.trim();

    // ```html ... ``` fences, with or without the language tag
    if let Some(rest) = text.strip_prefix("```") {
        let rest = match rest.split_once('\n') {
            Some((first_line, body)) if first_line.trim().chars().all(|c| c.is_ascii_alphanumeric()) => body,
            _ => rest,
        };
        text = rest.strip_suffix("```").unwrap_or(rest).trim();
    }

    // Symmetric quote pairs around the whole payload
    while text.len() >= 2 {
        let stripped = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')).or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')));
        match stripped {
            Some(inner) => text = inner.trim(),
            None => break,
        }
    }

    // Chatter before the document proper
    let lower = text.to_lowercase();
    if let Some(idx) = lower.find("<!doctype html>") {
        if idx > 0 {
            return text[idx..].trim().to_string();
        }
    }

    text.to_string()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_passes_clean_html_through() {
        assert_eq!(normalize_reply("<h1>P</h1>"), "<h1>P</h1>");
        assert_eq!(normalize_reply("  <h1>P</h1>\n"), "<h1>P</h1>");
    }

    #[test]
    fn normalize_strips_code_fences() {
        assert_eq!(normalize_reply("```html\n<h1>P</h1>\n```"), "<h1>P</h1>");
        assert_eq!(normalize_reply("```\n<h1>P</h1>\n```"), "<h1>P</h1>");
    }

    #[test]
    fn normalize_strips_surrounding_quotes() {
        assert_eq!(normalize_reply("\"<h1>P</h1>\""), "<h1>P</h1>");
        assert_eq!(normalize_reply("'<h1>P</h1>'"), "<h1>P</h1>");
        assert_eq!(normalize_reply("\"'<h1>P</h1>'\""), "<h1>P</h1>");
    }

    #[test]
    fn normalize_cuts_to_the_doctype() {
        let raw = "Sure! Here is your document:\n<!DOCTYPE html>\n<html><body>P</body></html>";
        assert_eq!(normalize_reply(raw), "<!DOCTYPE html>\n<html><body>P</body></html>");
        let raw = "intro <!doctype html><html></html>";
        assert_eq!(normalize_reply(raw), "<!doctype html><html></html>");
    }

    #[test]
    fn normalize_keeps_interior_quotes() {
        assert_eq!(normalize_reply("<p class=\"x\">a</p>"), "<p class=\"x\">a</p>");
    }

    #[test]
    fn prompt_mentions_the_essentials() {
        let spec = GenerationSpec {
            template_html: "<h1>{{TITLE}}</h1>".into(),
            template_title: "Access Control Policy".into(),
            department: Some("Engineering".into()),
            category: Some("Security".into()),
            organization_name: "Acme".into(),
        };
        let prompt = build_prompt(&spec);
        assert!(prompt.contains("Access Control Policy"));
        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("Engineering"));
        assert!(prompt.contains("Security"));
        assert!(prompt.contains("<h1>{{TITLE}}</h1>"));
    }
}
