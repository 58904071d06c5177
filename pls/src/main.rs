use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use pls::aggregate::unlock_compile;
use pls::cli::{Args, Command};
use pls::fixes::Fixer;
use pls::output::FixReporter;
use pls::venvs::VenvMap;

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let project_path = args.project_path();
    if !project_path.exists() {
        anyhow::bail!("Project path does not exist: {:?}", project_path);
    }
    if !project_path.is_dir() {
        anyhow::bail!("Project path is not a directory: {:?}", project_path);
    }
    let project_path = project_path
        .canonicalize()
        .context("Failed to resolve project path")?;

    let map = VenvMap::from_pyproject(&project_path)
        .with_context(|| format!("Failed to load [[tool.venvs]] from {project_path:?}"))?;
    if map.is_empty() {
        println!("No venvs declared under [[tool.venvs]] in {project_path:?}");
        return Ok(());
    }

    match &args.command {
        Command::Unlock { venv } => {
            let written = unlock_compile(&map, venv.as_deref())?;
            if written.is_empty() {
                println!("Nothing to write.");
            } else {
                println!("Wrote {} file(s):", written.len());
                for path in &written {
                    println!("  - {}", path.display());
                }
            }
        }
        Command::Fix { venv, dry_run } => {
            let venvs: Vec<String> = match venv {
                Some(venv) => vec![venv.clone()],
                None => map.venv_relpaths().map(str::to_string).collect(),
            };
            let reporter = FixReporter::new();
            for venv in &venvs {
                let fixer = Fixer::new(&map, venv)
                    .with_context(|| format!("Failed to load requirements for venv {venv}"))?;
                let outcome = fixer.apply(*dry_run)?;
                println!("{}", format!("venv {venv}").bold());
                reporter.render(&outcome, *dry_run);
            }
        }
    }

    Ok(())
}
