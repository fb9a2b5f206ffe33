//! cfngen cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; cfngen ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a CloudFormation template
    ///
    /// Reads HCL from stdin unless any other source is provided (via --input-*)
    #[command(alias = "gen")]
    Generate(GenerateCommand),

    /// Check the configuration without generating a template
    Validate(ValidateCommand),

    /// List the supported resource types
    Types,
}

#[derive(Parser, Debug)]
pub struct GenerateCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Template description
    #[clap(long = "description")]
    pub description: Option<String>,

    /// Location of the uploaded source code of a resource
    ///
    /// Format: NAME=BUCKET/KEY, can be specified multiple times.
    #[clap(short = 'a', long = "artifact", value_parser = parse_artifact)]
    pub artifacts: Vec<(String, cfngen::cloudformation::ArtifactLocation)>,
}

#[derive(Parser, Debug)]
pub struct ValidateCommand {
    #[clap(flatten)]
    pub input: InputArgs,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Load files from work directory
    #[clap(short = 'w', long = "input-workdir")]
    pub workdir: bool,

    /// Load a file
    #[clap(short = 'f', long = "input-file")]
    pub files: Vec<PathBuf>,

    /// Load files from given directory
    #[clap(short = 'd', long = "input-dir")]
    pub directories: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

fn parse_artifact(
    input: &str,
) -> Result<(String, cfngen::cloudformation::ArtifactLocation), String> {
    let (name, location) = input
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=BUCKET/KEY, got {input:?}"))?;
    let (bucket, key) = location
        .split_once('/')
        .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
        .ok_or_else(|| format!("expected BUCKET/KEY, got {location:?}"))?;

    Ok((
        name.to_string(),
        cfngen::cloudformation::ArtifactLocation::new(bucket.to_string(), key.to_string()),
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn artifacts() {
        let (name, location) = parse_artifact("api=my-bucket/builds/api.zip").unwrap();
        assert_eq!(name, "api");
        assert_eq!(location.bucket, "my-bucket");
        assert_eq!(location.key, "builds/api.zip");

        assert!(parse_artifact("api").is_err());
        assert!(parse_artifact("api=bucket").is_err());
        assert!(parse_artifact("api=/key").is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
