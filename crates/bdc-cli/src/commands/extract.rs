//! Extract command - read one document and emit its investment records.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use bdc_core::{Document, ExtractionResult, InvestmentExtractor};

use super::config::load_config;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input document (JSON)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Print totals and breakdowns after the records
    #[arg(long)]
    summary: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per record
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;
    let extractor = InvestmentExtractor::new(config)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    info!("Extracting from {}", args.input.display());

    let document = load_document(&args.input)?;
    let result = extractor.extract_isolated(&document);

    for warning in &result.warnings {
        eprintln!("{} {}", style("!").yellow(), warning);
    }

    let output = format_result(&result, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.summary {
        println!();
        print!("{}", format_summary(&result));
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Read a JSON document. An unnamed document takes the file stem as name.
pub fn load_document(path: &Path) -> anyhow::Result<Document> {
    let content = fs::read_to_string(path)?;
    let mut document: Document = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid document {}: {}", path.display(), e))?;

    if document.name.trim().is_empty() {
        document.name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string();
    }
    Ok(document)
}

pub fn format_result(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_csv(result: &ExtractionResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in &result.records {
        wtr.serialize(record)?;
    }
    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &ExtractionResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Document: {}\n", result.document));
    output.push_str(&format!("Records: {}\n", result.records.len()));
    output.push('\n');

    for record in &result.records {
        output.push_str(&format!(
            "  {} | {} | {}\n",
            record.company_name, record.instrument_type, record.industry
        ));
        if let Some(maturity) = &record.maturity_date {
            output.push_str(&format!("      Maturity:   {}\n", maturity));
        }
        let rate = [&record.reference_rate, &record.spread, &record.interest_rate]
            .into_iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>();
        if !rate.is_empty() {
            output.push_str(&format!("      Rate:       {}\n", rate.join(" / ")));
        }
        let amounts = [
            ("Principal", record.principal_amount),
            ("Cost", record.cost),
            ("Fair value", record.fair_value),
        ];
        for (label, amount) in amounts {
            if let Some(amount) = amount {
                output.push_str(&format!("      {:<11} {}\n", format!("{}:", label), amount));
            }
        }
    }

    output
}

/// Totals and the two breakdowns.
pub fn format_summary(result: &ExtractionResult) -> String {
    let mut output = String::new();

    output.push_str("Totals:\n");
    output.push_str(&format!("  Records:    {}\n", result.totals.count));
    output.push_str(&format!("  Principal:  {}\n", result.totals.principal_amount));
    output.push_str(&format!("  Cost:       {}\n", result.totals.cost));
    output.push_str(&format!("  Fair value: {}\n", result.totals.fair_value));

    output.push_str("\nBy industry:\n");
    for (industry, count) in &result.by_industry {
        output.push_str(&format!("  {:>4}  {}\n", count, industry));
    }

    output.push_str("\nBy instrument type:\n");
    for (instrument_type, count) in &result.by_instrument_type {
        output.push_str(&format!("  {:>4}  {}\n", count, instrument_type));
    }

    output
}
