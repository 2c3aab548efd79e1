use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use relgraph::datasource::sql::create_table_sql;
use relgraph::{CompilerConfig, DefinitionsFile, EntityCatalog, EntityId, RelationSet, SqlDialect};

/// relgraph - compile declared entity relations into SQL
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML compiler configuration (defaults to RELGRAPH_* environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQL dialect used for rendering (overrides the configuration)
    #[arg(long, global = true)]
    dialect: Option<SqlDialect>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the SQL and parameters for one relation
    Compile {
        #[arg(long)]
        definitions: PathBuf,

        #[arg(long)]
        relation: String,

        /// Target instance id; composite ids use the configured separator
        #[arg(long)]
        target_id: Option<String>,

        /// Compile the id/label selector query instead of the declared projection
        #[arg(long)]
        selector: bool,

        /// Print the query plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build every relation in a definitions file and report problems
    Check {
        #[arg(long)]
        definitions: PathBuf,
    },

    /// Print CREATE TABLE statements for the file's entities
    Schema {
        #[arg(long)]
        definitions: PathBuf,
    },
}

fn main() {
    dotenvy::dotenv().ok();

    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => CompilerConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => CompilerConfig::from_env().context("loading configuration from environment")?,
    };
    if let Some(dialect) = cli.dialect {
        config.dialect = dialect;
    }

    match cli.command {
        Command::Compile {
            definitions,
            relation,
            target_id,
            selector,
            json,
        } => {
            let relations = load(&definitions, &config)?;
            let relation = relations.get(&relation)?;
            let id = target_id.map(|raw| EntityId::parse(&raw, &config.id_separator));

            let plan = if selector {
                relation.compile_selector(id.as_ref())?
            } else {
                relation.compile_query(id.as_ref())?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                let query = plan.to_sql(config.dialect);
                print!("{}", query.to_sql());
                println!("-- params: {}", serde_json::Value::Array(query.params()));
            }
        }
        Command::Check { definitions } => {
            let relations = load(&definitions, &config)?;
            for (name, relation) in relations.iter() {
                relation
                    .compile_query(None)
                    .with_context(|| format!("compiling relation `{}`", name))?;
                println!(
                    "ok  {} ({} -> {}, {} waypoints)",
                    name,
                    relation.source().entity().set_name(),
                    relation.target().entity().set_name(),
                    relation.waypoints().len()
                );
            }
            println!("{} relations checked", relations.len());
        }
        Command::Schema { definitions } => {
            let relations = load(&definitions, &config)?;
            for entity in relations.entities() {
                println!(
                    "{};\n",
                    create_table_sql(
                        config.dialect,
                        entity.set_name(),
                        entity.schema(),
                        entity.id_properties()
                    )
                );
            }
        }
    }
    Ok(())
}

fn load(path: &Path, config: &CompilerConfig) -> anyhow::Result<RelationSet> {
    let file = DefinitionsFile::from_yaml_file(path)?;
    let catalog = EntityCatalog::new();
    file.build(&catalog, config)
        .with_context(|| format!("building relations from {}", path.display()))
}
