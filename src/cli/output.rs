//! Rendering of job results for the terminal.

use anyhow::{Context, Result};

use crate::job::GenerationResult;
use crate::profiles::EndpointSpec;

/// Renders a result as plain text.
///
/// Successes print one URL per line so the output can be piped straight
/// into a downloader.
pub fn render_result(result: &GenerationResult) -> String {
    match result {
        GenerationResult::Success { outputs, .. } => outputs.join("\n"),
        GenerationResult::Failure {
            message,
            remote_code,
        } => match remote_code {
            Some(code) => format!("error: {message} (code {code})"),
            None => format!("error: {message}"),
        },
        GenerationResult::Pending { handle } => match handle.eta {
            Some(eta) => format!("pending: job {} (eta {eta}s)", handle.id),
            None => format!("pending: job {}", handle.id),
        },
    }
}

/// Renders a result as pretty JSON.
pub fn render_json(result: &GenerationResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("Failed to serialize result")
}

/// Prints a result in the requested format.
pub fn print_result(result: &GenerationResult, json: bool) -> Result<()> {
    if json {
        println!("{}", render_json(result)?);
    } else {
        println!("{}", render_result(result));
    }
    Ok(())
}

/// Renders the endpoint catalog as an aligned table.
pub fn render_endpoint_table(endpoints: &[EndpointSpec]) -> String {
    let name_width = endpoints
        .iter()
        .map(|e| e.name.len())
        .chain(std::iter::once("NAME".len()))
        .max()
        .unwrap_or(0);
    let media_width = endpoints
        .iter()
        .map(|e| e.media.as_str().len())
        .chain(std::iter::once("MEDIA".len()))
        .max()
        .unwrap_or(0);
    let path_width = endpoints
        .iter()
        .map(|e| e.path.len())
        .chain(std::iter::once("PATH".len()))
        .max()
        .unwrap_or(0);

    let mut lines = vec![format!(
        "{:<name_width$}  {:<media_width$}  {:<path_width$}  REQUIRED",
        "NAME", "MEDIA", "PATH"
    )];
    for endpoint in endpoints {
        lines.push(format!(
            "{:<name_width$}  {:<media_width$}  {:<path_width$}  {}",
            endpoint.name,
            endpoint.media.as_str(),
            endpoint.path,
            endpoint.required.join(",")
        ));
    }
    lines
        .into_iter()
        .map(|line| line.trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
