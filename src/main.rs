use clap::Parser;
use colored::Colorize;

use campaign_insights::{Cli, EXIT_REJECTED, init_tracing, run};

fn main() -> anyhow::Result<()> {
    // Load .env early; ignore if missing.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json = cli.json;

    if let Err(err) = run(cli) {
        if err.code != EXIT_REJECTED {
            if json {
                eprintln!("{}", err.to_json());
            } else {
                eprintln!("{} {}", "error:".red().bold(), err.message);
                if let Some(hint) = &err.hint {
                    eprintln!("{} {hint}", "hint:".cyan());
                }
            }
        }
        std::process::exit(err.code);
    }
    Ok(())
}
