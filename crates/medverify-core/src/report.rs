//! Response shaping and output formatting for analysis results.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::VerifyError;
use crate::intake::IntakeError;
use crate::pipeline::Verdict;

pub const SUCCESS_MESSAGE: &str = "Analysis complete";

/// JSON body returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    #[serde(rename_all = "camelCase")]
    Analysis {
        is_authentic: bool,
        confidence: f32,
        message: String,
    },
    Error {
        error: String,
    },
}

/// HTTP-style status plus body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl AnalysisResponse {
    pub fn from_verdict(verdict: Verdict) -> Self {
        Self {
            status: 200,
            body: ResponseBody::Analysis {
                is_authentic: verdict.is_authentic,
                confidence: verdict.confidence,
                message: SUCCESS_MESSAGE.to_string(),
            },
        }
    }

    /// Rejected upload.
    pub fn from_intake_error(err: &IntakeError) -> Self {
        Self {
            status: 400,
            body: ResponseBody::Error {
                error: err.to_string(),
            },
        }
    }

    /// Only the error's own message reaches the client, not its source chain.
    pub fn from_verify_error(err: &VerifyError) -> Self {
        Self {
            status: 500,
            body: ResponseBody::Error {
                error: err.to_string(),
            },
        }
    }

    pub fn from_result(result: &Result<Verdict, VerifyError>) -> Self {
        match result {
            Ok(verdict) => Self::from_verdict(*verdict),
            Err(e) => Self::from_verify_error(e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// One analysed file, as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRecord {
    pub path: PathBuf,
    #[serde(flatten)]
    pub response: AnalysisResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}. Use 'text' or 'json'.")),
        }
    }
}

pub fn print_results(records: &[AnalysisRecord], format: OutputFormat) {
    match format {
        OutputFormat::Text => print!("{}", render_text(records)),
        OutputFormat::Json => println!("{}", render_json(records)),
    }
}

pub fn render_text(records: &[AnalysisRecord]) -> String {
    let mut out = String::new();
    let authentic = count(records, |b| matches!(b, ResponseBody::Analysis { is_authentic: true, .. }));
    let counterfeit = count(records, |b| matches!(b, ResponseBody::Analysis { is_authentic: false, .. }));
    let failed = records.len() - authentic - counterfeit;

    out.push_str(&format!("\n{}\n", "=".repeat(70)));
    out.push_str("VERIFICATION RESULTS\n");
    out.push_str(&format!("{}\n", "=".repeat(70)));

    for r in records {
        let line = match &r.response.body {
            ResponseBody::Analysis {
                is_authentic,
                confidence,
                ..
            } => {
                let tag = if *is_authentic { "AUTHENTIC" } else { "SUSPECT  " };
                format!("  [{tag}] [{confidence:.4}] {}", r.path.display())
            }
            ResponseBody::Error { error } => format!(
                "  [ERR {}] {} -- {}",
                r.response.status,
                r.path.display(),
                error
            ),
        };
        out.push_str(&line);
        out.push('\n');
    }

    out.push_str("\nSUMMARY:\n");
    out.push_str(&format!("  Total images:  {}\n", records.len()));
    out.push_str(&format!("  Authentic:     {authentic}\n"));
    out.push_str(&format!("  Suspect:       {counterfeit}\n"));
    out.push_str(&format!("  Errors:        {failed}\n"));
    out.push_str(&format!("{}\n", "=".repeat(70)));
    out
}

pub fn render_json(records: &[AnalysisRecord]) -> String {
    let output = serde_json::json!({
        "results": records,
        "summary": {
            "total": records.len(),
            "authentic": count(records, |b| matches!(b, ResponseBody::Analysis { is_authentic: true, .. })),
            "suspect": count(records, |b| matches!(b, ResponseBody::Analysis { is_authentic: false, .. })),
            "errors": records.iter().filter(|r| !r.response.is_success()).count(),
        }
    });
    serde_json::to_string_pretty(&output).unwrap_or_default()
}

fn count(records: &[AnalysisRecord], pred: impl Fn(&ResponseBody) -> bool) -> usize {
    records.iter().filter(|r| pred(&r.response.body)).count()
}
