mod cli;

use std::path::Path;
use tfsam::convert::Template;
use tfsam::Resources;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("TFSAM_LOG"))
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
        cli::Command::Transform(transform_cli) => transform(transform_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn transform(cli: cli::TransformCommand) -> anyhow::Result<()> {
    let resources = load(&cli.file)?;
    let config = tfsam::rules::Config::load_directory(&cli.config.config)?;

    let filter = cli
        .filter
        .as_deref()
        .map(regex::Regex::new)
        .transpose()?;

    let template = tfsam::convert::convert(&config, resources, filter.as_ref())?;

    if cli.print {
        return output(&cli.output, &template, std::io::stdout());
    }

    let target_file = cli.file.with_extension(cli.output.format.extension());
    let file = std::fs::File::create(&target_file)?;
    output(&cli.output, &template, file)?;

    tracing::info!(path=%target_file.display(), "written");
    println!("written {}", target_file.display());
    Ok(())
}

fn load(file_path: &Path) -> anyhow::Result<Resources> {
    anyhow::ensure!(
        file_path.extension().is_some_and(|ext| ext == "tf"),
        "file must end in .tf"
    );
    anyhow::ensure!(file_path.is_file(), "file {} not found", file_path.display());

    let mut documents = tfsam::terraform::TerraformDocuments::default();
    documents.load_file(file_path)?;

    anyhow::ensure!(
        !documents.resources().is_empty(),
        "no resources defined in file {}",
        file_path.display()
    );

    Ok(documents.into_resources())
}

fn output(
    output: &cli::OutputArgs,
    template: &Template,
    writer: impl std::io::Write,
) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(writer, template)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(writer, template)?,
    };

    Ok(())
}

/// (tfsam-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    match cli.command {
        cli::DevSubCommand::Resources { file } => {
            let resources = load(&file)?;
            serde_json::to_writer_pretty(std::io::stdout(), &resources)?;
        }
        cli::DevSubCommand::Relationships { file } => {
            let resources = load(&file)?;
            let graph = tfsam::relationships::RelationshipGraph::build(&resources);
            serde_json::to_writer_pretty(std::io::stdout(), &graph)?;
        }
    }
    println!();

    Ok(())
}
