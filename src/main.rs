use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use sees_list_sync::sync::runtime::{render, ConsolePresenter, ListOrchestrator};
use sees_list_sync::sync::service::FileDataService;
use sees_list_sync::{EngineConfig, Record, RecordKind, DB_PATH};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Students,
    Options,
    Events,
    Contacts,
}

impl From<Kind> for RecordKind {
    fn from(k: Kind) -> Self {
        match k {
            Kind::Students => RecordKind::Students,
            Kind::Options => RecordKind::DegreeOptions,
            Kind::Events => RecordKind::Events,
            Kind::Contacts => RecordKind::Contacts,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory document (JSON, one keyed map per kind)
    #[arg(long, default_value = DB_PATH)]
    data: PathBuf,

    #[arg(long, value_enum, default_value_t = Kind::Students)]
    kind: Kind,

    /// Recover from stale section bookkeeping by looking the record up by id
    #[arg(long)]
    fallback_scan: bool,

    /// Give up waiting for the data file after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the sectioned list
    List,
    /// Create a record
    Add {
        /// field=value pairs
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Change fields of an existing record
    Update {
        #[arg(long)]
        id: String,
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Delete a record
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Show a record's fields
    Show {
        #[arg(long)]
        id: String,
    },
}

fn parse_field(s: &str) -> Result<(String, String)> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected field=value, got `{}`", s))?;
    Ok((name.trim().to_string(), value.to_string()))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let kind: RecordKind = args.kind.into();
    let timeout = args.timeout_ms.map(Duration::from_millis);
    let config = EngineConfig {
        fallback_scan: args.fallback_scan,
    };

    log::info!("[MAIN] {} list from {}", kind, args.data.display());

    let service = FileDataService::open(&args.data)?;
    let presenter = ConsolePresenter {
        quiet: true,
        ..ConsolePresenter::default()
    };
    let mut orch = ListOrchestrator::new(service, presenter, config);

    orch.bootstrap();
    orch.run_until_settled(timeout)?;
    if !orch.engine(kind).is_some_and(|e| e.is_loaded()) {
        bail!("unable to fetch data from {}", args.data.display());
    }
    orch.presenter_mut().quiet = false;

    match args.command {
        Command::List => {}

        Command::Show { id } => {
            let record = current(&orch, kind, &id)?;
            println!("{}", record.display_text());
            for item in record.detail_items() {
                println!("    {:<16} {}", item.header, item.value);
            }
            return Ok(());
        }

        Command::Add { fields } => {
            let mut record = Record::new(kind);
            record.fields.extend(fields);
            println!("[MAIN] adding {}", record.id);
            orch.add(record);
        }

        Command::Update { id, fields } => {
            let mut record = current(&orch, kind, &id)?.clone();
            record.fields.extend(fields);
            orch.presenter_mut().show_detail(kind, &id);
            orch.update(record);
        }

        Command::Delete { id } => {
            current(&orch, kind, &id)?;
            orch.presenter_mut().show_detail(kind, &id);
            orch.delete(kind, id);
        }
    }

    orch.run_until_settled(timeout)?;

    if let Some(engine) = orch.engine(kind) {
        let malformed: Vec<_> = engine.malformed_ids().cloned().collect();
        if !malformed.is_empty() {
            log::warn!("[MAIN] records with missing fields: {}", malformed.join(", "));
        }
        println!("== {} ==", kind);
        print!("{}", render(engine.store()));
    }

    Ok(())
}

fn current<'a>(
    orch: &'a ListOrchestrator<FileDataService, ConsolePresenter>,
    kind: RecordKind,
    id: &str,
) -> Result<&'a Record> {
    orch.engine(kind)
        .and_then(|e| e.record(id))
        .ok_or_else(|| anyhow!("no {} record with id {}", kind, id))
}
