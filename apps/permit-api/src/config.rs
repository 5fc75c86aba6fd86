//! Server configuration from the command line and environment

use std::time::Duration;

use clap::Parser;
use permit_core::clients::DEFAULT_ANTHROPIC_MODEL;
use permit_core::pipeline::{PipelineConfig, DEFAULT_JURISDICTION};
use permit_core::MAX_UPLOAD_BYTES;

/// Command-line arguments for the permit API server
#[derive(Parser, Debug, Clone)]
#[command(name = "permit-api")]
#[command(about = "Permit questionnaire API: PDF intake, guided answers and filled export")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: String,

    /// Supabase service-role key
    #[arg(long, env = "SUPABASE_SERVICE_KEY", hide_env_values = true)]
    pub supabase_service_key: String,

    /// Storage bucket for uploaded permits
    #[arg(long, env = "STORAGE_BUCKET", default_value = "permits")]
    pub storage_bucket: String,

    /// PDF.co API key
    #[arg(long, env = "PDFCO_API_KEY", hide_env_values = true)]
    pub pdfco_api_key: String,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: String,

    /// Model used for field inference, questions and metadata
    #[arg(long, env = "ANTHROPIC_MODEL", default_value = DEFAULT_ANTHROPIC_MODEL)]
    pub anthropic_model: String,

    /// Region the permits are issued in
    #[arg(long, env = "PERMIT_JURISDICTION", default_value = DEFAULT_JURISDICTION)]
    pub jurisdiction: String,

    /// Timeout for each outbound request, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "60")]
    pub http_timeout_secs: u64,

    /// Allowed CORS origins (comma separated); any origin when unset
    #[arg(long = "allowed-origin", env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            jurisdiction: self.jurisdiction.trim().to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    /// Configured origins with blanks removed
    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 9] = [
        "permit-api",
        "--supabase-url",
        "https://db.example.co",
        "--supabase-service-key",
        "service",
        "--pdfco-api-key",
        "pdfco",
        "--anthropic-api-key",
        "anthropic",
    ];

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(REQUIRED).unwrap();
        assert_eq!(args.storage_bucket, "permits");
        assert_eq!(args.jurisdiction, DEFAULT_JURISDICTION);
        assert_eq!(args.http_timeout(), Duration::from_secs(60));
        assert_eq!(args.pipeline_config().max_upload_bytes, MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_origins_are_split_and_trimmed() {
        let mut argv = REQUIRED.to_vec();
        argv.extend(["--allowed-origin", "https://a.example, https://b.example,"]);
        let args = Args::try_parse_from(argv).unwrap();
        assert_eq!(args.origins(), vec!["https://a.example", "https://b.example"]);
    }
}
