//! Classify command - scope a follow-up instruction

use super::Context;
use anyhow::Result;
use colored::Colorize;
use forge_core::{Classifier, SearchConfidence};

pub async fn run(ctx: &Context, instruction: &str, search: &[String], json: bool) -> Result<()> {
    let config = ctx.load_config()?;
    let manifest = ctx.load_manifest(&config).await?;

    let intent = Classifier::new(&config).classify(instruction, &manifest);
    let hits = manifest.search(search);

    if json {
        let output = serde_json::json!({
            "intent": intent,
            "search": hits,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} {}", "🎯".cyan(), intent.edit_type.as_str().cyan().bold());
    println!("  {}", intent.description);
    println!("  Confidence: {:.2}", intent.confidence);
    println!("  Targets:");
    if intent.target_files.is_empty() {
        println!("    {}", "(none)".dimmed());
    }
    for file in &intent.target_files {
        println!("    {}", file.green());
    }
    println!("  Context: {} file(s)", intent.suggested_context.len());

    if !search.is_empty() {
        println!();
        println!("{}", format!("🔎 Search ({} hit(s)):", hits.len()).yellow());
        for hit in &hits {
            let marker = match hit.confidence {
                SearchConfidence::High => "●".green(),
                SearchConfidence::Medium => "○".yellow(),
            };
            println!(
                "  {} {}:{}  {}",
                marker,
                hit.file.cyan(),
                hit.line_number,
                hit.line.trim()
            );
        }
    }

    Ok(())
}
