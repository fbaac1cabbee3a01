use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, Command};

use drivecrawl::commands;
use drivecrawl::core::browser::launcher::DEFAULT_CDP_PORT;

/// Arguments shared by `crawl` and `watch`
fn with_crawl_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("url")
            .help("URL of the root folder to mirror")
            .required(true)
            .index(1),
    )
    .arg(
        Arg::new("output")
            .short('o')
            .long("output")
            .value_name("DIR")
            .help("Output directory (defaults to the configured one, then ./downloads)"),
    )
    .arg(
        Arg::new("attempts")
            .short('a')
            .long("attempts")
            .value_name("N")
            .help("Download attempts per file")
            .value_parser(value_parser!(u32).range(1..)),
    )
    .arg(
        Arg::new("headless")
            .long("headless")
            .help("Run the browser without a window")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("browser")
            .long("browser")
            .value_name("PATH")
            .help("Chrome, Chromium or Edge executable to use"),
    )
    .arg(
        Arg::new("port")
            .long("port")
            .value_name("PORT")
            .help(format!("Remote debugging port (default {})", DEFAULT_CDP_PORT))
            .value_parser(value_parser!(u16)),
    )
    .arg(
        Arg::new("no-skip-existing")
            .long("no-skip-existing")
            .help("Download files again even when they already exist locally")
            .action(ArgAction::SetTrue),
    )
}

fn build_cli() -> Command {
    Command::new("drivecrawl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Mirror a file-hosting folder tree to disk through a real browser")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(with_crawl_args(
            Command::new("crawl").about("Crawl a folder tree and download every file"),
        ))
        .subcommand(with_crawl_args(
            Command::new("watch")
                .about("Crawl with a live terminal dashboard (status table and log)"),
        ))
        .subcommand(
            Command::new("config")
                .about("Show or change saved settings (use 'drivecrawl config --help' for subcommands)")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Show the saved configuration"))
                .subcommand(
                    Command::new("set")
                        .about("Set one value; 'output' sets the default output directory")
                        .arg(Arg::new("key").help("Setting name, e.g. max-attempts").required(true).index(1))
                        .arg(Arg::new("value").help("New value").required(true).index(2)),
                )
                .subcommand(
                    Command::new("reset")
                        .about("Restore default settings")
                        .arg(
                            Arg::new("yes")
                                .short('y')
                                .long("yes")
                                .help("Do not ask for confirmation")
                                .action(ArgAction::SetTrue),
                        ),
                ),
        )
        .subcommand(Command::new("version").about("Shows version information"))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .help("Shell to generate completions for (bash, zsh, fish, powershell, elvish)")
                        .required(true)
                        .index(1),
                ),
        )
}

fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    // `watch` routes logging to a file once it knows the output directory
    if !matches!(matches.subcommand_name(), Some("watch")) {
        drivecrawl::init_logging();
    }

    match matches.subcommand() {
        Some(("crawl", sub_matches)) => commands::crawl(sub_matches)?,
        Some(("watch", sub_matches)) => commands::watch(sub_matches)?,
        Some(("config", sub_matches)) => commands::config::execute(sub_matches)?,
        Some(("version", _)) => commands::version()?,
        Some(("completions", sub_matches)) => {
            commands::completions::execute(sub_matches, &mut build_cli())?
        }
        _ => {
            println!("Use 'drivecrawl --help' for more information.");
        }
    }

    Ok(())
}
