use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use tower_floorgen::diagnostics::{check_library, FloorReport, Severity};
use tower_floorgen::generation::{FloorGenerator, GeneratorConfig, TowerSeed};
use tower_floorgen::library::{starter_library, TemplateLibrary};
use tower_floorgen::logging::{init_tracing, LogLevel, TracingConfig};

#[derive(Parser)]
#[command(name = "floorgen", about = "Generate a tower floor from a room library")]
struct Cli {
    /// Room library (.ron or .json); the built-in starter set when omitted
    #[arg(long)]
    library: Option<PathBuf>,
    /// Generator config (.ron); defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Floor seed
    #[arg(long, conflicts_with = "tower_seed")]
    seed: Option<u64>,
    /// Tower seed; the floor seed is derived from it and --floor
    #[arg(long, requires = "floor")]
    tower_seed: Option<u64>,
    /// Floor number, used with --tower-seed
    #[arg(long)]
    floor: Option<u32>,
    /// Override the config's room budget
    #[arg(long)]
    credits: Option<u32>,
    /// Print the layout as JSON instead of the report
    #[arg(long)]
    json: bool,
    /// Only check the library for authoring problems
    #[arg(long)]
    check: bool,
    /// -v debug, -vv trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn load_library(path: Option<&PathBuf>) -> Result<TemplateLibrary> {
    match path {
        Some(path) => TemplateLibrary::load_from_path(path)
            .with_context(|| format!("loading room library {}", path.display())),
        None => Ok(starter_library()),
    }
}

fn run(cli: Cli) -> Result<()> {
    let library = load_library(cli.library.as_ref())?;

    if cli.check {
        let issues = check_library(&library);
        for issue in &issues {
            println!("{}", issue);
        }
        let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
        println!("{} templates, {} issues", library.templates.len(), issues.len());
        if errors > 0 {
            bail!("{} template errors", errors);
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::load(path)
            .with_context(|| format!("loading generator config {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    if let Some(credits) = cli.credits {
        config.credits = credits;
    }

    let seed = match (cli.seed, cli.tower_seed, cli.floor) {
        (Some(seed), _, _) => seed,
        (None, Some(tower), Some(floor)) => TowerSeed { seed: tower }.floor_seed(floor),
        _ => bail!("pass --seed, or --tower-seed with --floor"),
    };

    let mut generator = FloorGenerator::new(Arc::new(library), config);
    let layout = generator
        .generate_floor(seed)
        .with_context(|| format!("generating floor for seed {}", seed))?
        .clone();

    if cli.json {
        println!("{}", layout.to_json()?);
    } else {
        println!("{}", FloorReport::new(&layout, generator.stats()));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&TracingConfig::default().with_level(LogLevel::from_verbosity(cli.verbose)));
    run(cli)
}
