//! `aml`: inspect stored AML responses
//!
//! ```bash
//! aml inspect response.xml
//! aml property response.xml name --lang de
//! aml property response.xml related_id --as item
//! aml clone request.xml --with-relationships
//! ```

use aml_model::{Cardinality, Element, Item, ItemResult, Property, ServerContext};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "aml")]
#[command(version, about = "Inspect AML responses and requests", long_about = None)]
struct Cli {
    /// JSON file with the session context (language, locale, time zone)
    #[arg(short, long, global = true)]
    context: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize the items or fault held in a response
    Inspect {
        file: PathBuf,
    },

    /// Read one property of the single item in a document
    Property {
        file: PathBuf,

        name: String,

        /// Language of a multilingual property
        #[arg(short, long)]
        lang: Option<String>,

        /// Coercion to apply
        #[arg(long = "as", value_enum, default_value_t = Coercion::String)]
        coercion: Coercion,
    },

    /// Copy the single item in a document as a new `add` request
    Clone {
        file: PathBuf,

        /// Keep relationships, each renewed as well
        #[arg(long)]
        with_relationships: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Coercion {
    String,
    Bool,
    Int,
    Double,
    Date,
    Guid,
    Item,
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let context = load_context(cli.context.as_deref())?;

    match &cli.command {
        Commands::Inspect { file } => inspect(&load(file, &context)?, cli.json),
        Commands::Property {
            file,
            name,
            lang,
            coercion,
        } => {
            let item = load(file, &context)?
                .assert_item(None)
                .context("expected exactly one item")?;
            let property = match lang {
                Some(lang) => item.property_lang(name, lang),
                None => item.property(name),
            };
            print_property(&property, *coercion, cli.json)
        }
        Commands::Clone {
            file,
            with_relationships,
        } => {
            let item = load(file, &context)?
                .assert_item(None)
                .context("expected exactly one item")?;
            println!("{}", item.clone_as_new(*with_relationships).to_aml());
            Ok(())
        }
    }
}

fn load_context(path: Option<&Path>) -> Result<Arc<ServerContext>> {
    let Some(path) = path else {
        return Ok(ServerContext::default_context());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading context {}", path.display()))?;
    let raw: ServerContext =
        serde_json::from_str(&text).with_context(|| format!("parsing context {}", path.display()))?;
    // recompute the offset from the zone name unless one was given
    let context = if raw.utc_offset_minutes == 0 {
        ServerContext::new(raw.language_code, raw.locale, raw.time_zone)
    } else {
        raw
    };
    context
        .validate()
        .with_context(|| format!("invalid context {}", path.display()))?;
    tracing::debug!(?context, "loaded session context");
    Ok(Arc::new(context))
}

fn load(path: &Path, context: &Arc<ServerContext>) -> Result<ItemResult> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    ItemResult::from_aml_with_context(&text, Arc::clone(context))
        .with_context(|| format!("parsing {}", path.display()))
}

fn describe(item: &Item) -> serde_json::Value {
    json!({
        "type": item.type_name(),
        "id": item.id(),
        "action": item.action(),
        "keyed_name": item.keyed_name(),
        "relationships": item.relationships().len(),
    })
}

fn inspect(result: &ItemResult, as_json: bool) -> Result<()> {
    let summary = match result.cardinality() {
        Cardinality::Fault(fault) => json!({
            "fault": {
                "code": fault.code(),
                "message": fault.message(),
                "detail": fault.detail(),
                "source": fault.source(),
                "no_items": fault.is_no_items(),
            }
        }),
        Cardinality::Empty => json!({ "items": [], "value": result.value() }),
        Cardinality::One(item) => json!({ "items": [describe(&item)] }),
        Cardinality::Many(items) => json!({ "items": items.iter().map(describe).collect::<Vec<_>>() }),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    match result.cardinality() {
        Cardinality::Fault(fault) if fault.is_no_items() => println!("no items: {}", fault.message()),
        Cardinality::Fault(fault) => {
            println!("fault [{}] {}", fault.code(), fault.message());
            if !fault.detail().is_empty() {
                println!("  detail: {}", fault.detail());
            }
        }
        Cardinality::Empty => match result.value() {
            Some(value) => println!("value: {}", value),
            None => println!("empty"),
        },
        Cardinality::One(item) => print_item(&item),
        Cardinality::Many(items) => {
            println!("{} items", items.len());
            items.iter().for_each(print_item);
        }
    }
    if let Some(message) = result.message().and_then(|m| m.text()) {
        println!("message: {}", message);
    }
    Ok(())
}

fn print_item(item: &Item) {
    println!(
        "{} {} ({} relationships)",
        item.type_name(),
        item.id().unwrap_or_else(|| "<no id>".to_string()),
        item.relationships().len()
    );
}

fn print_property(property: &Property, coercion: Coercion, as_json: bool) -> Result<()> {
    if !property.exists() {
        bail!("property {} does not exist", property.name());
    }
    let value = match coercion {
        Coercion::String => json!(property.value()),
        Coercion::Bool => json!(property.as_boolean()?),
        Coercion::Int => json!(property.as_long()?),
        Coercion::Double => json!(property.as_double()?),
        Coercion::Date => json!(property.as_date_time()?.map(|d| d.to_string())),
        Coercion::Guid => json!(property.as_guid()?.map(|g| aml_model::value::format_guid(&g))),
        Coercion::Item => {
            let item = property.as_item();
            if item.exists() {
                describe(&item)
            } else {
                serde_json::Value::Null
            }
        }
    };
    if as_json {
        println!("{}", serde_json::to_string_pretty(&json!({ "name": property.name(), "value": value }))?);
    } else {
        match value {
            serde_json::Value::String(s) => println!("{}", s),
            serde_json::Value::Null => println!("null"),
            other => println!("{}", other),
        }
    }
    Ok(())
}
