use loadcollect_common::{CollectError, Result, VersionResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::Span;

/// Everything needed to drive one load-generator run against one version.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub version: String,
    /// Run duration in the generator's own syntax, e.g. `"5s"`.
    pub time: String,
    pub qps: f64,
    pub headers: BTreeMap<String, String>,
    pub url: String,
    /// Shared request body, staged once per collection.
    pub payload_file: Option<PathBuf>,
}

impl Query {
    /// Arguments for `<loadgen> load ...`, writing the JSON report to `output`.
    pub fn args(&self, output: &Path) -> Vec<String> {
        let mut args = vec![
            "load".to_string(),
            "-t".to_string(),
            self.time.clone(),
            "-qps".to_string(),
            format!("{:.6}", self.qps),
        ];
        for (name, value) in &self.headers {
            args.push("-H".to_string());
            args.push(format!("{name}: {value}"));
        }
        if let Some(payload) = &self.payload_file {
            args.push("-payload-file".to_string());
            args.push(payload.display().to_string());
        }
        args.push("-json".to_string());
        args.push(output.display().to_string());
        args.push(self.url.clone());
        args
    }
}

/// Runs one query to completion. Implementations block the calling thread.
pub trait QueryRunner: Send + Sync {
    fn run(&self, query: &Query) -> Result<VersionResult>;
}

/// Runs queries by spawning the external load generator.
pub struct LoadGenRunner {
    program: PathBuf,
    span: Span,
}

impl LoadGenRunner {
    pub fn new(program: impl Into<PathBuf>, span: Span) -> Self {
        Self { program: program.into(), span }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl QueryRunner for LoadGenRunner {
    fn run(&self, query: &Query) -> Result<VersionResult> {
        // Removed on drop, whichever way this function returns.
        let report = tempfile::Builder::new()
            .prefix("output.")
            .suffix(".json")
            .tempfile()
            .map_err(|e| CollectError::invocation(&query.version, format!("cannot create output file: {e}")))?;

        let args = query.args(report.path());
        tracing::debug!(
            parent: &self.span,
            version = %query.version,
            program = %self.program.display(),
            ?args,
            "Invoking load generator"
        );

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                CollectError::invocation(
                    &query.version,
                    format!("cannot spawn {}: {e}", self.program.display()),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match last_line(&stderr) {
                Some(line) => format!("{}: {line}", output.status),
                None => output.status.to_string(),
            };
            return Err(CollectError::invocation(&query.version, message));
        }

        let result = read_report(&query.version, report.path())?;
        tracing::debug!(
            parent: &self.span,
            version = %query.version,
            count = result.duration_histogram.count,
            "Load generator finished"
        );
        Ok(result)
    }
}

/// Decode a load-generator JSON report.
pub fn read_report(version: &str, path: &Path) -> Result<VersionResult> {
    let bytes = std::fs::read(path)
        .map_err(|e| CollectError::parse(version, format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_slice(&bytes).map_err(|e| CollectError::parse(version, e.to_string()))
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rev().find(|line| !line.is_empty())
}
