//! Apply command - apply a model response to the project

use super::{read_input, spinner, Context};
use anyhow::{Context as _, Result};
use colored::Colorize;
use forge_adapters::{create_environment, EnvironmentKind};
use forge_core::{EditIntent, Pipeline, SessionManager};
use forge_types::{
    ApplicationResult, FileAction, Outcome, OutputStream, PackageStatus, ProgressEvent, StreamEvent,
};
use futures::StreamExt;
use indicatif::ProgressBar;
use std::path::PathBuf;

pub struct ApplyOptions {
    pub input: PathBuf,
    pub instruction: Option<String>,
    pub events: bool,
    pub env: EnvironmentKind,
    pub json: bool,
}

pub async fn run(ctx: &Context, options: ApplyOptions) -> Result<()> {
    let config = ctx.load_config()?;
    let input = read_input(&options.input).await?;
    let events = if options.events {
        parse_events(&input)?
    } else {
        vec![StreamEvent::Complete {
            generated_code: input,
            explanation: None,
            packages_to_install: Vec::new(),
        }]
    };

    let env = create_environment(options.env, &ctx.project, &config)?;
    let sessions = SessionManager::new();
    let session = sessions.create(Some(env));
    let pipeline = Pipeline::new(config);

    let instruction = options.instruction.unwrap_or_default();
    let intent = pipeline
        .prepare(&session, &instruction)
        .await
        .context("Failed to read project")?
        .filter(|_| !instruction.is_empty());
    if !options.json {
        println!("{}", format!("🔨 Applying to {} ({})", ctx.project.display(), options.env).cyan().bold());
        if let Some(ref intent) = intent {
            print_intent(intent);
        }
    }

    let turn = pipeline
        .run_turn(session.clone(), &instruction, intent, futures::stream::iter(events))
        .await
        .context("Model output could not be processed")?;

    let pb = (!options.json).then(|| spinner("Applying..."));
    let mut progress = turn.progress;
    while let Some(event) = progress.next().await {
        match pb {
            Some(ref pb) => render(pb, &event),
            None => println!("{}", serde_json::to_string(&event)?),
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let result = turn.task.await.context("Apply task panicked")??;
    if !options.json {
        print_summary(&result);
    }

    sessions.destroy(session.id()).await?;

    match result.outcome() {
        Outcome::Failed => Err(anyhow::anyhow!("Nothing was applied")),
        _ => Ok(()),
    }
}

/// Parse JSON lines of stream events, skipping blank lines
fn parse_events(input: &str) -> Result<Vec<StreamEvent>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let line = line.trim().strip_prefix("data:").unwrap_or(line).trim();
            serde_json::from_str(line).with_context(|| format!("Invalid stream event on line {}", i + 1))
        })
        .collect()
}

fn print_intent(intent: &EditIntent) {
    println!(
        "  🎯 {} ({:.0}% confidence)",
        intent.description,
        intent.confidence * 100.0
    );
}

fn render(pb: &ProgressBar, event: &ProgressEvent) {
    match event {
        ProgressEvent::Step { message, .. } => {
            pb.println(format!("{}", format!("▶ {}", message).yellow()));
            pb.set_message(message.clone());
        }
        ProgressEvent::PackageProgress {
            package,
            status,
            error,
        } => match status {
            PackageStatus::Installing => pb.set_message(format!("Installing {}", package)),
            PackageStatus::Installed => pb.println(format!("  {} {}", "✓".green(), package)),
            PackageStatus::AlreadyInstalled => {
                pb.println(format!("  {} {} {}", "•".dimmed(), package, "(already installed)".dimmed()))
            }
            PackageStatus::Failed => pb.println(format!(
                "  {} {} {}",
                "✗".red(),
                package.red(),
                error.as_deref().unwrap_or_default().dimmed()
            )),
        },
        ProgressEvent::FileProgress {
            current,
            total,
            file_name,
            ..
        } => pb.set_message(format!("[{}/{}] {}", current, total, file_name)),
        ProgressEvent::FileComplete { file_name, action } => {
            let verb = match action {
                FileAction::Updated | FileAction::Updating => "updated",
                FileAction::Created | FileAction::Creating => "created",
            };
            pb.println(format!("  {} {} {}", "✓".green(), verb.dimmed(), file_name));
        }
        ProgressEvent::FileError { file_name, error } => {
            pb.println(format!("  {} {}: {}", "✗".red(), file_name.red(), error));
        }
        ProgressEvent::CommandProgress { command, .. } => pb.set_message(format!("$ {}", command)),
        ProgressEvent::CommandOutput { output, stream, .. } => {
            for line in output.lines() {
                match stream {
                    OutputStream::Stdout => pb.println(format!("    {}", line.dimmed())),
                    OutputStream::Stderr => pb.println(format!("    {}", line.yellow())),
                }
            }
        }
        ProgressEvent::CommandComplete {
            command, success, ..
        } => {
            let icon = if *success { "✓".green() } else { "✗".red() };
            pb.println(format!("  {} $ {}", icon, command));
        }
        ProgressEvent::Complete {
            explanation, message, ..
        } => {
            pb.println(message.clone());
            if let Some(explanation) = explanation {
                pb.println(format!("{}", explanation.dimmed()));
            }
        }
        ProgressEvent::Error { error } => pb.println(format!("{} {}", "✗".red(), error.red())),
        ProgressEvent::Start { .. } | ProgressEvent::Unknown => {}
    }
}

fn print_summary(result: &ApplicationResult) {
    println!();
    match result.outcome() {
        Outcome::Success => println!("{}", "✅ Applied successfully!".green().bold()),
        Outcome::Partial => println!("{}", "⚠️  Applied with errors".yellow().bold()),
        Outcome::Failed => println!("{}", "❌ Apply failed!".red().bold()),
    }
    println!(
        "  📄 {} created, {} updated",
        result.files_created.len(),
        result.files_updated.len()
    );
    println!(
        "  📦 {} installed, {} already installed, {} failed",
        result.packages_installed.len(),
        result.packages_already_installed.len(),
        result.packages_failed.len()
    );
    if !result.commands_executed.is_empty() {
        println!("  ⚙️  {} command(s) run", result.commands_executed.len());
    }
    for error in &result.errors {
        println!("      {} {}", "•".red(), error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_events() {
        let input = "{\"type\":\"stream\",\"text\":\"<file path=\\\"a.jsx\\\">\"}\n\ndata: {\"type\":\"complete\"}\n";
        let events = parse_events(input).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), "stream");
        assert!(events[1].is_terminal());
    }

    #[test]
    fn test_parse_events_reports_line() {
        let err = parse_events("{\"type\":\"stream\",\"text\":\"a\"}\nnot json").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
