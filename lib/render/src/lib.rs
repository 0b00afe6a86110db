use log::{debug, info};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Render request timed out")]
    Timeout,
    #[error("Render upstream failure: {0}")]
    Upstream(String),
}

#[async_trait::async_trait]
pub trait PdfRenderer {
    /// Renders a complete HTML document to a single PDF byte string.
    async fn render(&self, html: &str) -> Result<Vec<u8>, RenderError>;
}

/// Wraps a reconstructed policy fragment in the branded outer document: page
/// CSS, the organization's logo front and center and the parent product logo
/// in the "powered by" corner.
pub fn wrap_branded(body: &str, organization_logo: &str, parent_logo: &str) -> String {
    format!(
        r#"<html>
<head>
    <style>
        body {{
            font-family: Arial, sans-serif;
            margin: 0;
            padding: 20px;
        }}
        .header {{
            margin-bottom: 30px;
            padding-bottom: 15px;
        }}
        .header-top {{
            display: flex;
            justify-content: space-between;
            align-items: flex-start;
            margin-bottom: 15px;
        }}
        .powered-by-section {{
            display: flex;
            align-items: center;
            gap: 8px;
            font-size: 10px;
            color: #666;
        }}
        .parent-logo {{
            height: 22px;
            width: auto;
        }}
        .main-logo-section {{
            text-align: center;
            flex-grow: 1;
        }}
        .main-logo {{
            height: 75px;
            width: auto;
        }}
    </style>
</head>
<body>
    <div class="header">
        <div class="header-top">
            <div class="powered-by-section">
                <span>Powered by </span>
                <img src="{parent_logo}" alt="parent" class="parent-logo">
            </div>
            <div class="main-logo-section">
                <img src="{organization_logo}" alt="organization" class="main-logo">
            </div>
        </div>
    </div>
    {body}
</body>
</html>
"#
    )
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    html: &'a str,
}

/// Hands documents to an external HTML-to-PDF converter over HTTP.
pub struct HttpPdfRenderer {
    url:    String,
    client: reqwest::Client,
}

impl HttpPdfRenderer {
    pub fn new(url: impl Into<String>) -> Self {
        let url: String = url.into();
        info!("Creating new HttpPdfRenderer to '{url}'");
        Self { url, client: reqwest::Client::new() }
    }
}

#[async_trait::async_trait]
impl PdfRenderer for HttpPdfRenderer {
    async fn render(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        debug!("Sending render request to '{}' ({} chars of HTML)", self.url, html.len());
        let res = self
            .client
            .post(&self.url)
            .json(&RenderRequest { html })
            .send()
            .await
            .map_err(|err| if err.is_timeout() { RenderError::Timeout } else { RenderError::Upstream(err.to_string()) })?;
        if !res.status().is_success() {
            return Err(RenderError::Upstream(format!("converter returned status {}", res.status())));
        }
        let bytes = res.bytes().await.map_err(|err| RenderError::Upstream(err.to_string()))?;
        if bytes.is_empty() {
            return Err(RenderError::Upstream("converter returned an empty document".into()));
        }
        Ok(bytes.to_vec())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_embeds_body_and_logos() {
        let wrapped = wrap_branded("<h1>P</h1>", "https://cdn/acme.png", "https://cdn/parent.png");
        assert!(wrapped.contains("<h1>P</h1>"));
        assert!(wrapped.contains("https://cdn/acme.png"));
        assert!(wrapped.contains("https://cdn/parent.png"));
        assert!(wrapped.starts_with("<html>"));
        assert!(wrapped.trim_end().ends_with("</html>"));
    }
}
