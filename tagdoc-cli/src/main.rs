use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tagdoc::{
    Decoder, DocItem, EditSession, LiveTree, RegionId, TypeTag, decode_lenient, serialize,
    serialize_root,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decodes a document and prints its canonical serialized form
    Normalize {
        file: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
    /// Decodes a document in edit mode and prints the region ids
    Regions { file: PathBuf },
    /// Applies text edits to regions and prints the resulting change records
    Edit { doc: PathBuf, edits: PathBuf },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("nothing left to decode in {}", .0.display())]
    Empty(PathBuf),
    #[error("no region with id {0}")]
    UnknownRegion(RegionId),
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct TextEdit {
    id: RegionId,
    text: String,
}

const CONTAINER: &str = "div";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Normalize { file, pretty } => normalize_command(file, *pretty),
        Commands::Regions { file } => regions_command(file),
        Commands::Edit { doc, edits } => edit_command(doc, edits),
    };
    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let raw = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a document, reporting every dropped node on stderr.
fn load_document(path: &Path) -> Result<DocItem, CliError> {
    let value: serde_json::Value = read_json(path)?;
    let decoded = decode_lenient(&value);
    for dropped in &decoded.dropped {
        eprintln!("dropped node at {:?}: {}", dropped.path, dropped.error);
    }
    decoded.item.ok_or_else(|| CliError::Empty(path.to_path_buf()))
}

fn is_body(item: &DocItem) -> bool {
    item.as_node().is_some_and(|node| node.tag == TypeTag::Body)
}

fn normalize_command(file: &Path, pretty: bool) -> Result<(), CliError> {
    let item = load_document(file)?;
    let mut tree = LiveTree::new(CONTAINER);
    let root = tree.root();
    let built = Decoder::new(&mut tree).decode(root, &item);

    let output = if is_body(&item) {
        serialize_root(&tree, root).map(DocItem::Node)
    } else {
        match built.as_record() {
            Some(record) => serialize(&tree, record.node),
            None => Some(item.clone()),
        }
    };
    let output = output.ok_or_else(|| CliError::Empty(file.to_path_buf()))?;
    let json = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{json}");
    Ok(())
}

fn regions_command(file: &Path) -> Result<(), CliError> {
    let item = load_document(file)?;
    let mut tree = LiveTree::new(CONTAINER);
    let root = tree.root();
    let mut session = EditSession::new();
    let record = Decoder::new(&mut tree).editing(&mut session).decode(root, &item);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn edit_command(doc: &Path, edits: &Path) -> Result<(), CliError> {
    let item = load_document(doc)?;
    let edits: Vec<TextEdit> = read_json(edits)?;
    let mut tree = LiveTree::new(CONTAINER);
    let root = tree.root();
    let mut session = EditSession::new();
    Decoder::new(&mut tree).editing(&mut session).decode(root, &item);

    for edit in &edits {
        let node = session
            .region(edit.id)
            .map(|region| region.node)
            .ok_or(CliError::UnknownRegion(edit.id))?;
        tree.set_text_content(node, &edit.text);
        session.on_input(&mut tree, node);
        session.on_blur(&mut tree, node);
    }
    let committed = session.stop(&mut tree);
    tracing::debug!(committed, "edits applied");
    println!("{}", serde_json::to_string_pretty(session.sink())?);
    Ok(())
}
