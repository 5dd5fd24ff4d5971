use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "wtf-runner")]
#[command(about = "Run wait/interaction scenarios described in YAML")]
#[command(version)]
struct Cli {
    /// Scenario file to run
    scenario: PathBuf,

    /// Set a parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate scenario without running
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> wtf_runner::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let params = wtf_runner::Params::from_args(&cli.params)?;
    let config = wtf_runner::Config::load_with_params(&cli.scenario, &params)?;

    if cli.check {
        println!("Scenario valid: {}", config.name);
        println!(
            "  Wait: timeout {}ms, poll every {}ms",
            config.wait.timeout_ms, config.wait.poll_interval_ms
        );
        println!(
            "  Page elements: {}",
            config.page.iter().map(|e| e.count()).sum::<usize>()
        );
        println!("  Steps: {}", config.steps.len());
        if !config.params.is_empty() {
            println!("  Parameters: {}", config.params.len());
            for (name, def) in &config.params {
                let req = if def.required { " (required)" } else { "" };
                let desc = def.description.as_deref().unwrap_or("");
                println!("    - {}{}: {}", name, req, desc);
            }
        }
        return Ok(());
    }

    println!("Running: {}", config.name);

    // Includes resolve relative to the scenario file
    let base_path = cli
        .scenario
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."));

    let runner = wtf_runner::Runner::new(&config)?;
    let result = runner.run_with_base_path(&config, base_path)?;

    println!();
    if result.success {
        println!("✓ Success");
    } else {
        println!("✗ Failed");
        if let Some(ref error) = result.error {
            println!("  Error: {}", error);
        }
    }
    println!("  Steps: {}/{}", result.steps_executed, config.steps.len());
    println!("  Duration: {}ms", result.duration_ms);

    if !result.success {
        std::process::exit(1);
    }

    Ok(())
}
