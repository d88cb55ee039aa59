use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gedcom_lineage::{
    config::Config,
    geocoding::{build_geocoder, PlaceResolver},
    lineage::{traversal::generation_count, PedigreeGraph, TreeLinker},
    reports::{prune_to_direct_ancestors, RenderOptions, ReportGenerator},
    types::{OutputFormat, RenderScope},
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gedcom-lineage")]
#[command(about = "Render ancestry outlines and pedigree graphs from GEDCOM files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a GEDCOM file as an outline, a Graphviz digraph or JSON
    Render {
        /// GEDCOM file to read
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Render the root's ancestry or every person in the file
        #[arg(short, long, value_enum)]
        scope: Option<RenderScope>,

        /// Xref of the person to start from (defaults to the first person)
        #[arg(short, long)]
        root: Option<String>,

        /// Drop everyone who is not a direct ancestor of the root
        #[arg(short, long)]
        direct: bool,

        /// Look up birth and death places before rendering
        #[arg(short, long)]
        geocode: bool,

        /// Omit the birth-year timeline from Graphviz output
        #[arg(long)]
        no_timeline: bool,
    },

    /// Print pedigree statistics for a GEDCOM file
    Stats {
        /// GEDCOM file to read
        file: PathBuf,

        /// Also report the ancestry of this person
        #[arg(short, long)]
        root: Option<String>,
    },

    /// Initialize configuration file
    Init {
        /// Configuration file path
        #[arg(long, default_value = "gedcom-lineage.yml")]
        config_file: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level)?;

    match cli.command {
        Commands::Render {
            file,
            format,
            scope,
            root,
            direct,
            geocode,
            no_timeline,
        } => {
            let mut config = load_config(cli.config.as_ref()).await?;
            let render = &mut config.render;
            if let Some(format) = format {
                render.format = format;
            }
            if let Some(scope) = scope {
                render.scope = scope;
            }
            if root.is_some() {
                render.root = root;
            }
            render.direct_only |= direct;
            render.timeline &= !no_timeline;
            config.geocoding.enabled |= geocode;
            config.validate()?;

            let output = render_file(file, &config).await?;
            println!("{}", output);
        }

        Commands::Stats { file, root } => {
            print_statistics(file, root.as_deref())?;
        }

        Commands::Init { config_file, force } => {
            init_config(config_file, force).await?;
        }
    }

    Ok(())
}

/// Initialize tracing with the specified log level. Output goes to stderr so
/// rendered reports on stdout stay clean.
fn init_tracing(log_level: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .context("Failed to create env filter")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}

/// Configuration file (or defaults), with environment overrides on top
async fn load_config(config_path: Option<&PathBuf>) -> Result<Config> {
    let mut config = match config_path {
        Some(path) if path.exists() => {
            info!("Loading configuration from: {:?}", path);
            Config::load_from_file(path).await?
        }
        Some(path) => {
            warn!("Configuration file not found: {:?}. Using defaults.", path);
            Config::default()
        }
        None => Config::default(),
    };

    config.merge_with(Config::load_from_env()?);
    Ok(config)
}

async fn render_file(file: PathBuf, config: &Config) -> Result<String> {
    let mut tree = TreeLinker::from_file(&file).with_context(|| format!("Failed to load {:?}", file))?;
    info!(
        "Loaded {} people and {} families from {:?}",
        tree.person_count(),
        tree.family_count(),
        file
    );

    let root = if config.render.direct_only {
        prune_to_direct_ancestors(&mut tree, config.render.root.as_deref())?
    } else {
        config.render.root.clone()
    };

    if config.geocoding.enabled {
        let geocoder = build_geocoder(
            config.resolve_access_token().await,
            Some(config.geocoding.base_url.clone()),
            config.geocoding.timeout_seconds,
        )?;
        PlaceResolver::new(geocoder.as_ref()).resolve_tree(&mut tree).await;
    }

    let generator = ReportGenerator::new(RenderOptions {
        format: config.render.format,
        scope: config.render.scope,
        timeline: config.render.timeline,
    });
    generator.generate(&tree, root.as_deref())
}

fn print_statistics(file: PathBuf, root: Option<&str>) -> Result<()> {
    let tree = TreeLinker::from_file(&file).with_context(|| format!("Failed to load {:?}", file))?;
    let graph = PedigreeGraph::from_tree(&tree);
    let stats = graph.get_statistics();

    println!("File: {}", file.display());
    if let Some(source) = tree.source().and_then(|source| source.name.as_deref().or(source.id.as_deref())) {
        println!("Source: {}", source);
    }
    println!("People: {}", tree.person_count());
    println!("Families: {}", tree.family_count());
    println!("Parent links: {}", stats.parent_links);
    println!("Founders: {}", stats.founders);
    println!("People without children: {}", stats.leaf_people);
    println!("Generations: {}", stats.max_generations);
    println!("Average known parents: {:.2}", stats.average_parents);

    if let Some(root_id) = tree.resolve_root(root)? {
        let xref = &tree.person(root_id).xref;
        println!("Root: {}", xref);
        println!("  Generations: {}", generation_count(&tree, root_id));
        println!("  Distinct ancestors: {}", graph.get_ancestors(xref)?.len());
        println!("  Descendants: {}", graph.get_descendants(xref)?.len());
    }

    Ok(())
}

async fn init_config(config_file: PathBuf, force: bool) -> Result<()> {
    info!("Initializing configuration file: {:?}", config_file);

    if config_file.exists() && !force {
        warn!("Configuration file already exists: {:?}", config_file);
        println!("{:?} already exists; pass --force to overwrite it.", config_file);
        return Ok(());
    }

    Config::default()
        .save_to_file(&config_file)
        .await
        .with_context(|| format!("Failed to write configuration file: {:?}", config_file))?;

    println!("Configuration file created: {:?}", config_file);
    println!("Edit this file to customize rendering and geocoding.");

    Ok(())
}
