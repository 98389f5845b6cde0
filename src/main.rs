use anyhow::{Context, Result};
use astound::config::{load_config, load_config_file};
use astound::repl::{self, Command, Outcome};
use astound::{Cursor, Session, SourceText};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "astound")]
#[command(version)]
#[command(about = "Navigate a simplified Python syntax tree and summarize the parts you pick")]
struct Cli {
    /// Python source file to open
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Config file (default: ./.astound.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Name shown in the cursor report
    #[arg(long)]
    name: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner.set_message("summarizing...");
    spinner
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = match cli.config.as_ref() {
        Some(path) => load_config_file(path),
        None => load_config(&std::env::current_dir().context("Failed to get current dir")?),
    };
    let session = Session::from_config(&cfg);

    let source = SourceText::open(&cli.source).with_context(|| format!("Failed to open {}", cli.source.display()))?;
    let name = cli
        .name
        .clone()
        .unwrap_or_else(|| cli.source.display().to_string());
    let mut cursor = Cursor::new(name, source);

    println!("{}", repl::MENU);
    match cursor.report(&session) {
        Ok(report) => println!("{report}"),
        Err(e) => println!("{e}"),
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{}", repl::PROMPT);
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next() else { break };
        let line = line.context("Failed to read stdin")?;

        let command = match repl::parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        let progress = matches!(command, Command::Summarize).then(spinner);
        let outcome = repl::execute(&mut cursor, &session, command);
        if let Some(progress) = progress {
            progress.finish_and_clear();
        }

        match outcome {
            Ok(Outcome::Quit) => break,
            Ok(Outcome::Continue(text)) => println!("{text}"),
            Err(e) => println!("{e}"),
        }
    }
    Ok(())
}
