//! Extract command - show what the pipeline finds in a model response

use super::{read_input, Context};
use anyhow::Result;
use colored::Colorize;
use forge_core::{Extractor, Reconciler};
use std::collections::BTreeSet;
use std::path::Path;

pub async fn run(ctx: &Context, input: &Path, json: bool) -> Result<()> {
    let config = ctx.load_config()?;
    let buffer = read_input(input).await?;

    let extraction = Extractor::new(&config).extract(&buffer);
    let reconciliation = Reconciler::new(&config).reconcile(&extraction, &BTreeSet::new());

    if json {
        let output = serde_json::json!({
            "files": reconciliation.files,
            "packages": reconciliation.packages,
            "commands": extraction.commands,
            "explanation": extraction.explanation,
            "structure": extraction.structure,
            "template": extraction.template,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "📄 Candidates:".yellow());
    if extraction.files.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for candidate in &extraction.files {
        let state = if candidate.complete {
            "complete".green()
        } else {
            "incomplete".yellow()
        };
        let suspect = if candidate.suspect { " ⚠️ possibly truncated" } else { "" };
        println!(
            "  {} [{}] {} chars, {}{}",
            candidate.path.cyan(),
            candidate.provenance.as_str().dimmed(),
            candidate.content.len(),
            state,
            suspect.yellow()
        );
    }

    println!();
    println!("{}", "✅ Reconciled:".yellow());
    for file in &reconciliation.files {
        println!("  {} ({} chars)", file.path.cyan(), file.content.len());
    }

    if !reconciliation.packages.is_empty() {
        println!();
        println!("{} {}", "📦 Packages:".yellow(), reconciliation.packages.join(", "));
    }
    if !extraction.commands.is_empty() {
        println!();
        println!("{}", "⚙️  Commands:".yellow());
        for command in &extraction.commands {
            println!("  $ {}", command);
        }
    }
    if let Some(ref explanation) = extraction.explanation {
        println!();
        println!("{}", explanation.dimmed());
    }

    Ok(())
}
