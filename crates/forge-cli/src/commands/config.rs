//! Config command - show, create and validate forge.config files

use super::Context;
use anyhow::{Context as _, Result};
use colored::Colorize;
use forge_core::{ConfigManager, ForgeConfig};
use std::path::Path;

/// Show the effective configuration
pub async fn show(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;

    match ctx.config_path() {
        Some(path) => println!("  📁 Using config: {}", path.display().to_string().dimmed()),
        None => println!("  📁 {}", "No config file found, using defaults".dimmed()),
    }
    println!();
    print!("{}", serde_yaml::to_string(&config)?);

    Ok(())
}

/// Write a default configuration into the project
pub async fn init(ctx: &Context, force: bool) -> Result<()> {
    let path = ctx.project.join("forge.config.yaml");
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    ConfigManager::new()
        .save(&ConfigManager::create_default(), &path)
        .context("Failed to write configuration")?;

    println!("{} Created {}", "✓".green(), path.display().to_string().cyan());
    Ok(())
}

/// Validate the configuration file and report every problem
pub async fn validate(ctx: &Context) -> Result<()> {
    println!("{}", "🔍 Validating Forge configuration...".cyan().bold());

    let config = match ctx.config_path() {
        Some(path) => {
            println!("  📁 Config file: {}", path.display().to_string().dimmed());
            parse(&path)?
        }
        None => {
            println!("  📁 {}", "No config file found, validating defaults".dimmed());
            ForgeConfig::default()
        }
    };
    println!();

    let result = ConfigManager::new().validate(&config);
    if result.valid {
        println!("  {} Configuration is valid", "✅".green());
    } else {
        println!("  {} Configuration is invalid", "❌".red());
        for error in &result.errors {
            println!("      {} {}: {}", "•".red(), error.field.red(), error.message);
        }
    }

    for warning in &result.warnings {
        println!("  {} {}: {}", "⚠️".yellow(), warning.field.yellow(), warning.message);
        if let Some(ref suggestion) = warning.suggestion {
            println!("      💡 {}", suggestion.dimmed());
        }
    }

    println!();
    if !result.valid {
        println!("{}", "❌ Validation failed - please fix the errors above".red().bold());
        return Err(anyhow::anyhow!("Validation failed"));
    }

    println!("{}", "✅ Validation passed!".green().bold());
    Ok(())
}

/// Parse without validating so every error can be reported
fn parse(path: &Path) -> Result<ForgeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = if path.extension().map(|e| e == "json").unwrap_or(false) {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_then_validate() {
        let dir = TempDir::new().unwrap();
        let ctx = Context {
            project: dir.path().to_path_buf(),
            config: None,
        };

        init(&ctx, false).await.unwrap();
        assert!(init(&ctx, false).await.is_err());
        init(&ctx, true).await.unwrap();

        validate(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_reports_invalid_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("forge.config.json"),
            r#"{"commands": {"timeout_secs": 0}}"#,
        )
        .unwrap();
        let ctx = Context {
            project: dir.path().to_path_buf(),
            config: None,
        };

        assert!(validate(&ctx).await.is_err());
    }
}
