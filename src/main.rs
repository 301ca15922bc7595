use std::env;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use claimwatch::{
    validate_acknowledgments, AckParser, PaymentRecord, ReconciliationEngine, StatusClassifier,
};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("parse") => {
            let file = args.get(2).context("usage: claimwatch parse <277ca-file>")?;
            run_parse(Path::new(file))
        }
        Some("reconcile") => {
            let ack_file = args
                .get(2)
                .context("usage: claimwatch reconcile <277ca-file> <payments.json> [threshold-days]")?;
            let payments_file = args
                .get(3)
                .context("usage: claimwatch reconcile <277ca-file> <payments.json> [threshold-days]")?;
            let threshold: i64 = match args.get(4) {
                Some(raw) => raw.parse().context("threshold-days must be an integer")?,
                None => 30,
            };
            run_reconcile(Path::new(ack_file), Path::new(payments_file), threshold)
        }
        _ => {
            eprintln!("claimwatch v{}", claimwatch::VERSION);
            eprintln!();
            eprintln!("Usage:");
            eprintln!("  claimwatch parse <277ca-file>");
            eprintln!("  claimwatch reconcile <277ca-file> <payments.json> [threshold-days]");
            std::process::exit(2);
        }
    }
}

fn run_parse(path: &Path) -> Result<()> {
    println!("📂 Parsing claim acknowledgment: {}", path.display());

    let classified = parse_and_classify(path)?;

    println!(
        "✓ {} claims, {} rejected, {} accepted ({:.1}% rejection rate)",
        classified.summary.total_claims,
        classified.summary.rejected_count,
        classified.summary.accepted_count,
        classified.summary.rejection_rate
    );

    let warnings = validate_acknowledgments(&classified);
    for warning in &warnings {
        println!("⚠️  {}", warning);
    }

    println!("{}", serde_json::to_string_pretty(&classified)?);

    Ok(())
}

fn run_reconcile(ack_path: &Path, payments_path: &Path, threshold_days: i64) -> Result<()> {
    println!("📂 Parsing claim acknowledgment: {}", ack_path.display());
    let classified = parse_and_classify(ack_path)?;
    println!(
        "✓ {} rejections out of {} claims",
        classified.summary.rejected_count, classified.summary.total_claims
    );

    println!("💰 Loading 835 payments: {}", payments_path.display());
    let payments = load_payments(payments_path)?;
    println!("✓ {} payment records", payments.len());

    let mut engine = ReconciliationEngine::new();
    engine.add_rejections(&classified.rejections);
    engine.add_payments(&payments);

    let report = engine.report(threshold_days);

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!(
        "🔍 {} unsubmitted claims ({} high severity), ${:.2} at risk",
        report.alert_count, report.high_severity_count, report.summary.potential_revenue_at_risk
    );

    Ok(())
}

fn parse_and_classify(path: &Path) -> Result<claimwatch::ClassifiedResult> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read acknowledgment file: {}", path.display()))?;

    let parsed = AckParser::new()
        .parse(&content)
        .with_context(|| format!("failed to parse acknowledgment file: {}", path.display()))?;

    for diagnostic in &parsed.diagnostics {
        println!(
            "⚠️  {}.{}: {} ({:?})",
            diagnostic.segment_id, diagnostic.field, diagnostic.reason, diagnostic.value
        );
    }

    Ok(StatusClassifier::classify(parsed.records))
}

/// Payments arrive as a JSON array of mapping-shaped records, the output
/// shape of the external 835 structural decoder.
fn load_payments(path: &Path) -> Result<Vec<PaymentRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read payments file: {}", path.display()))?;

    if content.trim().is_empty() {
        bail!("payments file is empty: {}", path.display());
    }

    serde_json::from_str(&content)
        .with_context(|| format!("payments file is not a JSON array of payment records: {}", path.display()))
}
