mod cli;

use cfngen::cloudformation::{Encoder, Template};
use cfngen::diagnostic::{Diagnostic, Diagnostics};
use cfngen::documents::Documents;
use cfngen::graph::Graph;
use std::collections::HashMap;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CFNGEN_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Generate(generate_cli) => generate(generate_cli),
        cli::Command::Validate(validate_cli) => validate(validate_cli),
        cli::Command::Types => types(),
    };

    match command_result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            for error in e.chain() {
                eprintln!("{error}")
            }
            std::process::exit(1);
        }
    }
}

/// Returns `false` when the configuration has errors
pub fn generate(cli: cli::GenerateCommand) -> anyhow::Result<bool> {
    let documents = load(&cli.input)?;
    let Some(graph) = decode(&documents) else {
        return Ok(false);
    };

    let mut encoder = Encoder::new();
    if let Some(description) = cli.description {
        encoder = encoder.with_description(description);
    }

    let artifacts: HashMap<_, _> = cli.artifacts.into_iter().collect();
    let (template, diagnostics) = encoder.encode(&graph, &artifacts);
    report(&documents, &diagnostics);
    if diagnostics.has_errors() {
        return Ok(false);
    }

    output(&cli.output, &template)?;
    Ok(true)
}

pub fn validate(cli: cli::ValidateCommand) -> anyhow::Result<bool> {
    let documents = load(&cli.input)?;
    let Some(graph) = decode(&documents) else {
        return Ok(false);
    };

    eprintln!("Configuration is valid, {} resources", graph.len());
    Ok(true)
}

pub fn types() -> anyhow::Result<bool> {
    let registry = cfngen::provider::aws::registry();
    for descriptor in registry.descriptors() {
        match descriptor.target_type() {
            Some(target_type) => println!("{}\t{target_type}", descriptor.name()),
            None => println!("{}", descriptor.name()),
        }
    }
    Ok(true)
}

fn decode(documents: &Documents) -> Option<Graph> {
    let registry = cfngen::provider::aws::registry();
    let (graph, diagnostics) = Graph::decode(documents, &registry);
    report(documents, &diagnostics);
    graph
}

fn load(input: &cli::InputArgs) -> anyhow::Result<Documents> {
    let mut documents = Documents::default();

    if !input.workdir && input.files.is_empty() && input.directories.is_empty() {
        let stdin = std::io::read_to_string(std::io::stdin())?;
        documents.insert(stdin, None)?;
        return Ok(documents);
    }

    if input.workdir {
        documents.load_directory(&std::env::current_dir()?)?;
    }

    for file_path in &input.files {
        documents.load_file(file_path)?;
    }

    for dir_path in &input.directories {
        documents.load_directory(dir_path)?;
    }

    anyhow::ensure!(documents.source_count() > 0, "No files loaded");

    Ok(documents)
}

fn output(output: &cli::OutputArgs, template: &Template) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), template)?,
        cli::OutputFormat::Json => {
            serde_json::to_writer_pretty(std::io::stdout(), template)?;
            println!();
        }
    };

    Ok(())
}

fn report(documents: &Documents, diagnostics: &Diagnostics) {
    for diagnostic in diagnostics {
        eprintln!("{}\n", render(documents, diagnostic));
    }
}

/// Diagnostic with the offending source line underlined
fn render(documents: &Documents, diagnostic: &Diagnostic) -> String {
    let mut rendered = format!("{}: {}", diagnostic.severity, diagnostic.summary);

    if let Some(subject) = &diagnostic.subject {
        rendered.push_str(&format!("\n\n  on {subject}:"));

        let line = documents
            .source_of(subject)
            .and_then(|source| source.line(subject.start.line));
        if let Some(line) = line {
            let prefix = format!("  {:>4}: ", subject.start.line);
            let width = if subject.end.line == subject.start.line {
                subject.end.column.saturating_sub(subject.start.column).max(1)
            } else {
                line.chars().count().saturating_sub(subject.start.column.saturating_sub(1)).max(1)
            };

            rendered.push_str(&format!("\n{prefix}{line}"));
            rendered.push_str(&format!(
                "\n{}{}",
                " ".repeat(prefix.len() + subject.start.column.saturating_sub(1)),
                "^".repeat(width)
            ));
        }
    }

    if !diagnostic.detail.is_empty() {
        rendered.push_str(&format!("\n\n{}", diagnostic.detail));
    }

    rendered
}
