use std::io::{self, Write};

use serde::Serialize;

use crate::app::RunSummary;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn print_text_summary(summary: &RunSummary) {
    for report in &summary.reports {
        println!(
            "{} data for {} has {}.",
            report.data_type, report.project, report.status
        );
        if !report.failed_samples.is_empty() {
            println!("  samples failed: {}", report.failed_samples.join(", "));
        }
        if let Some(error) = &report.error {
            println!("  error: {error}");
        }
    }
}
