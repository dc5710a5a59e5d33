use anyhow::{bail, Context, Result};
use cifras_catalog::catalog::TAG_MARKER;
use cifras_catalog::config::{AppConfig, CliConfig, FileConfig};
use cifras_catalog::ingestion::collect_pdf_paths;
use cifras_catalog::{Catalog, CatalogView, Record, ViewQuery};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_style;
use cli_style::{
    get_styles, print_empty_list, print_error, print_key_value, print_section_header,
    print_success, print_warning, TableBuilder, FAVORITE_MARK,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles = get_styles(), name = "cifras", version)]
struct CliArgs {
    /// Directory holding the blob database and the catalog snapshot.
    #[clap(long, global = true, value_parser = parse_path)]
    pub data_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values take precedence over flags.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Rasterizer program used for first-page previews.
    #[clap(long, global = true)]
    pub preview_command: Option<String>,

    /// Skip preview rendering.
    #[clap(long, global = true)]
    pub no_preview: bool,

    /// Reject documents larger than this many megabytes.
    #[clap(long, global = true)]
    pub max_file_size_mb: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Adds PDF files. Directories are searched recursively for `.pdf` files.
    Add {
        #[clap(required = true, value_parser = parse_path)]
        paths: Vec<PathBuf>,
    },

    /// Lists documents sorted by name, optionally filtered.
    List {
        /// Keep documents whose name or tags contain this text.
        #[clap(short, long)]
        search: Option<String>,

        /// Only favorites.
        #[clap(short, long)]
        favorites: bool,

        #[clap(short, long)]
        artist: Option<String>,

        #[clap(short, long)]
        collection: Option<String>,

        /// Print the view as JSON instead of a table.
        #[clap(long)]
        json: bool,
    },

    /// Shows documents in their saved order, with the positions `move` expects.
    Order,

    /// Shows one document's metadata.
    Show { id: String },

    /// Edits a document. Omitted fields keep their current value.
    Edit {
        id: String,

        /// New name; the artist is derived from it again.
        #[clap(long)]
        name: Option<String>,

        #[clap(long)]
        collection: Option<String>,

        /// Space separated tags, each starting with `#`.
        #[clap(long)]
        tags: Option<String>,
    },

    /// Marks or unmarks a document as favorite.
    Fav { id: String },

    /// Removes a document and its stored file.
    Rm { id: String },

    /// Moves the document at position FROM to position TO.
    Move { from: usize, to: usize },

    /// Moves document DRAGGED to where document TARGET is.
    Drop { dragged: String, target: String },

    /// Writes a document's PDF to a file.
    Open {
        id: String,

        #[clap(short, long, value_parser = parse_path)]
        output: PathBuf,
    },

    /// Lists known artists and collections.
    Facets,

    /// Deletes stored files that no document refers to.
    Sweep,
}

fn print_records(view: &CatalogView) {
    if view.items.is_empty() {
        print_empty_list(&format!("No documents ({} in catalog)", view.total));
        return;
    }
    let mut table = TableBuilder::new(&["", "Name", "Artist", "Collection", "Tags", "Id"]);
    for record in &view.items {
        table.add_row(record_row(record));
    }
    table.print();
    println!("  {} of {} documents", view.items.len(), view.total);
}

fn record_row(record: &Record) -> Vec<String> {
    vec![
        if record.favorite {
            FAVORITE_MARK.to_string()
        } else {
            String::new()
        },
        record.name.clone(),
        record.artist.clone(),
        record.collection.clone(),
        record.tags.join(" "),
        record.id.clone(),
    ]
}

async fn execute(catalog: &Catalog, command: Command) -> Result<()> {
    let engine = catalog.engine();
    match command {
        Command::Add { paths } => {
            let paths = collect_pdf_paths(&paths)?;
            if paths.is_empty() {
                print_warning("No PDF files found");
                return Ok(());
            }
            let results = catalog.ingestor().ingest_paths(&paths).await;
            let mut failures = 0;
            for (path, result) in paths.iter().zip(results) {
                match result {
                    Ok(record) => print_success(&format!(
                        "Added {} ({})",
                        record.name,
                        if record.preview.is_some() {
                            "with preview"
                        } else {
                            "no preview"
                        }
                    )),
                    Err(e) => {
                        failures += 1;
                        print_error(&format!("{}: {}", path.display(), e));
                    }
                }
            }
            if failures > 0 {
                bail!("{} of {} files could not be added", failures, paths.len());
            }
        }
        Command::List {
            search,
            favorites,
            artist,
            collection,
            json,
        } => {
            let mut query = ViewQuery::search(search.unwrap_or_default()).favorites_only(favorites);
            if let Some(artist) = artist {
                query = query.with_artist(artist);
            }
            if let Some(collection) = collection {
                query = query.with_collection(collection);
            }
            let view = engine.render(&query).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_records(&view);
            }
        }
        Command::Order => {
            let records = engine.records().await;
            if records.is_empty() {
                print_empty_list("Catalog is empty");
                return Ok(());
            }
            let mut table = TableBuilder::new(&["#", "", "Name", "Artist", "Collection", "Tags", "Id"]);
            for (position, record) in records.iter().enumerate() {
                let mut row = vec![position.to_string()];
                row.extend(record_row(record));
                table.add_row(row);
            }
            table.print();
        }
        Command::Show { id } => {
            let record = engine
                .get(&id)
                .await
                .with_context(|| format!("No document with id {}", id))?;
            print_section_header(&record.name);
            print_key_value("Id", &record.id);
            print_key_value("Artist", &record.artist);
            print_key_value("Favorite", if record.favorite { "yes" } else { "no" });
            print_key_value("Collection", &record.collection);
            print_key_value("Tags", &record.tags.join(" "));
            print_key_value(
                "Preview",
                if record.preview.is_some() {
                    "yes"
                } else {
                    "no"
                },
            );
        }
        Command::Edit {
            id,
            name,
            collection,
            tags,
        } => {
            let current = engine
                .get(&id)
                .await
                .with_context(|| format!("No document with id {}", id))?;
            // A blank name keeps the current one.
            let name = name.unwrap_or_default();
            let collection = collection.unwrap_or(current.collection);
            let tags = tags.unwrap_or_else(|| current.tags.join(" "));
            let updated = engine.rename(&id, &name, &collection, &tags).await?;
            let dropped: Vec<&str> = tags
                .split_whitespace()
                .filter(|t| !updated.tags.iter().any(|kept| kept.as_str() == *t))
                .collect();
            if !dropped.is_empty() {
                print_warning(&format!(
                    "Ignored tokens not starting with '{}': {}",
                    TAG_MARKER,
                    dropped.join(" ")
                ));
            }
            print_success(&format!("Updated {}", updated.name));
        }
        Command::Fav { id } => {
            let favorite = engine.toggle_favorite(&id).await?;
            print_success(if favorite {
                "Marked as favorite"
            } else {
                "Removed from favorites"
            });
        }
        Command::Rm { id } => {
            let removal = engine.delete(&id).await?;
            removal.wait().await?;
            print_success(&format!("Removed {}", id));
        }
        Command::Move { from, to } => {
            engine.reorder(from, to).await?;
            print_success(&format!("Moved {} to {}", from, to));
        }
        Command::Drop { dragged, target } => {
            engine.reorder_by_id(&dragged, &target).await?;
            print_success(&format!("Moved {} to the place of {}", dragged, target));
        }
        Command::Open { id, output } => {
            let bytes = engine.open(&id).await?;
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("Failed to write {:?}", output))?;
            print_success(&format!("Wrote {} bytes to {}", bytes.len(), output.display()));
        }
        Command::Facets => {
            let facets = engine.facets().await;
            print_section_header("Artists");
            if facets.artists.is_empty() {
                print_empty_list("none");
            }
            for artist in &facets.artists {
                println!("  {}", artist);
            }
            print_section_header("Collections");
            if facets.collections.is_empty() {
                print_empty_list("none");
            }
            for collection in &facets.collections {
                println!("  {}", collection);
            }
        }
        Command::Sweep => {
            let removed = engine.sweep_orphaned_blobs().await?;
            if removed.is_empty() {
                print_success("No orphaned files");
            } else {
                for id in &removed {
                    print_key_value("Removed", id);
                }
                print_success(&format!("Removed {} orphaned files", removed.len()));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        data_dir: cli_args.data_dir.clone(),
        preview_command: cli_args.preview_command.clone(),
        no_preview: cli_args.no_preview,
        max_file_size_mb: cli_args.max_file_size_mb,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let catalog = Catalog::open(&config).await?;
    execute(&catalog, cli_args.command).await
}
