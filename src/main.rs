use anyhow::Context;
use clap::Parser;
use eoka_locator::{EokaDocument, LocatorConfig, MemoryStore, Outcome, Params, Resolver};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "eoka-locator")]
#[command(about = "Resolve page-object field references in a live page")]
#[command(version)]
struct Cli {
    /// Page-object config file
    config: PathBuf,

    /// Page to open
    #[arg(long, required_unless_present = "check")]
    url: Option<String>,

    /// Element type to resolve (button, input, link, ...)
    #[arg(long = "type", value_name = "TYPE", required_unless_present = "check")]
    element_type: Option<String>,

    /// Field reference, e.g. "{{Login Form}} Submit"
    #[arg(long, required_unless_present = "check")]
    field: Option<String>,

    /// Force a page object instead of matching the URL
    #[arg(long)]
    pattern: Option<String>,

    /// Resolution timeout in milliseconds (overrides config)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Run in headless mode
    #[arg(long)]
    headless: bool,

    /// Set a parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate config without resolving
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
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

    let params = Params::from_args(&cli.params)?;
    let config = LocatorConfig::load_with_params(&cli.config, &params)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if cli.check {
        print_summary(&config);
        return Ok(());
    }

    // clap enforces these unless --check is given
    let (Some(url), Some(element_type), Some(field)) = (&cli.url, &cli.element_type, &cli.field)
    else {
        anyhow::bail!("--url, --type and --field are required");
    };

    let store = MemoryStore::new();
    config.install(&store);
    store.seed(&params);
    debug!("store seeded with {} entries", store.len());

    let stealth = eoka::StealthConfig {
        headless: cli.headless,
        ..Default::default()
    };
    let browser = eoka::Browser::launch_with_config(stealth).await?;
    let page = browser.new_page("about:blank").await?;
    page.goto(url).await?;

    let document = EokaDocument::new(&page, config.resolver.load_timeout_ms);
    let resolver = Resolver::new(&document, &store, &config.resolver);
    let resolution = resolver
        .resolve(
            element_type,
            field,
            cli.pattern.as_deref(),
            cli.timeout_ms.map(Duration::from_millis),
        )
        .await;

    browser.close().await?;
    let resolution = resolution?;

    println!();
    match resolution.outcome {
        Outcome::Found => {
            println!("✓ Found");
            println!("  Locator: {}", resolution.result.locator);
        }
        Outcome::NotFound => println!("✗ Not found"),
        Outcome::NoStrategies => println!(
            "✗ No '{}' strategies in page object '{}'",
            resolution.element_type, resolution.pattern
        ),
        Outcome::SessionClosed => println!("✗ Session closed"),
    }
    println!("  Page object: {}", resolution.pattern);
    if let Some(ref id) = resolution.for_id {
        println!("  Label target: {}", id);
    }
    println!("  Cycles: {}", resolution.cycles);
    println!("  Duration: {}ms", resolution.elapsed.as_millis());
    if !resolution.is_found() {
        for strategy in resolution
            .labels_attempted
            .iter()
            .chain(&resolution.attempted)
        {
            println!("    - {}", strategy);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn print_summary(config: &LocatorConfig) {
    println!("Config valid: {}", config.name);
    if let Some(ref default) = config.resolver.default_pattern {
        println!("  Default pattern: {}", default);
    }
    println!(
        "  Timeout: {}ms (retry every {}ms)",
        config.resolver.timeout_ms, config.resolver.retry_interval_ms
    );
    if !config.url_patterns.is_empty() {
        println!("  URL rules: {}", config.url_patterns.len());
        for rule in &config.url_patterns {
            println!("    - '{}' -> {}", rule.contains, rule.pattern);
        }
    }
    println!("  Patterns: {}", config.patterns.len());
    for (code, page) in &config.patterns {
        let mut types: Vec<&str> = page.fields.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        println!("    - {}: {}", code, types.join(", "));
    }
    if !config.params.is_empty() {
        println!("  Parameters: {}", config.params.len());
        for (name, def) in &config.params {
            let req = if def.required { " (required)" } else { "" };
            let desc = def.description.as_deref().unwrap_or("");
            println!("    - {}{}: {}", name, req, desc);
        }
    }
}
