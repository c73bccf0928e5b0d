mod cli;

use plconf::{Converter, Settings};

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("PLCONF_LOG"))
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
        cli::Command::Convert(convert_cli) => convert(convert_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        tracing::error!("conversion aborted");
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

fn settings(input: &cli::InputArgs) -> Settings {
    let mut settings = Settings {
        namespace_mode: input.namespace,
        follow_requires: !input.no_require,
        extension: input.extension.clone(),
        ..Settings::default()
    };

    if !input.aggregators.is_empty() {
        settings.aggregator_names = input.aggregators.clone();
    }

    settings
}

pub fn convert(cli: cli::ConvertCommand) -> anyhow::Result<()> {
    anyhow::ensure!(
        cli.input.input.is_dir(),
        "{} is not a directory",
        cli.input.input.display()
    );

    let mut settings = settings(&cli.input);
    settings.output_format = cli.format;

    let converter = Converter::new(settings);
    let report = converter.convert(&cli.input.input, &cli.output)?;

    println!("{report}");
    if report.warnings > 0 {
        println!("see {} for details", report.diagnostics_path.display());
    }

    Ok(())
}

/// (plconf-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    let converter = Converter::new(settings(&cli.input));
    let sources = converter.file_order(&cli.input.input)?;

    match cli.command {
        Order => {
            for source in &sources {
                println!("{}\t{}", source.namespace, source.path.display());
            }
        }
        Declarations => {
            for source in &sources {
                println!("# {}", source.path.display());
                match converter.parse_file(source) {
                    Ok(events) => println!("{events:#?}"),
                    Err(err) => println!("{err}"),
                }
            }
        }
    }

    Ok(())
}
