//! Manifest command - print the project's static analysis

use super::Context;
use anyhow::Result;
use colored::Colorize;

pub async fn run(ctx: &Context, json: bool) -> Result<()> {
    let config = ctx.load_config()?;
    let manifest = ctx.load_manifest(&config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    println!("{}", format!("🔍 {}", ctx.project.display()).cyan().bold());
    let entry = if manifest.entry_point.is_empty() {
        "(none)".dimmed().to_string()
    } else {
        manifest.entry_point.green().to_string()
    };
    println!("  Entry point: {}", entry);
    println!();

    println!("{}", format!("📄 Files ({}):", manifest.files.len()).yellow());
    for (path, info) in &manifest.files {
        let component = info
            .component_info
            .as_ref()
            .map(|c| format!(" <{}>", c.name))
            .unwrap_or_default();
        println!(
            "  {:<48} {:<10}{}",
            path,
            info.file_type.as_str().dimmed(),
            component.cyan()
        );
    }

    if !manifest.routes.is_empty() {
        println!();
        println!("{}", "🧭 Routes:".yellow());
        for route in &manifest.routes {
            println!("  {:<24} → {}", route.path.cyan(), route.file);
        }
    }

    let edges: Vec<_> = manifest
        .component_tree
        .iter()
        .filter(|(_, node)| !node.imports.is_empty())
        .collect();
    if !edges.is_empty() {
        println!();
        println!("{}", "🌳 Components:".yellow());
        for (name, node) in edges {
            println!("  {} → {}", name.cyan(), node.imports.join(", "));
        }
    }

    Ok(())
}
