use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use rl_engine::{
    Dispatcher, EnvIdentity, Envelope, EventLog, IdentityResolver, Request,
    StaticIdentity,
};
use rl_server::{recording_sink, AppState, RlServer};
use rl_store::{LedgerConfig, LedgerStore, StateLedger};
use serde_json::Value;

use crate::cli::*;
use crate::settings::Settings;

/// Environment variable naming the caller when `--caller` is absent.
pub const CALLER_ENV: &str = "RL_CALLER";

/// Everything one command needs: an open ledger, a dispatcher, and the
/// caller it acts as.
pub struct Session {
    ledger: Arc<StateLedger>,
    events: Arc<EventLog>,
    dispatcher: Arc<Dispatcher>,
    identity: Arc<dyn IdentityResolver>,
    format: OutputFormat,
}

impl Session {
    pub fn open(
        settings: &Settings,
        caller: Option<String>,
        format: OutputFormat,
    ) -> anyhow::Result<Self> {
        let ledger = StateLedger::open(&settings.ledger).context("opening ledger")?;
        Self::with_ledger(settings, ledger, caller, format)
    }

    fn with_ledger(
        settings: &Settings,
        ledger: StateLedger,
        caller: Option<String>,
        format: OutputFormat,
    ) -> anyhow::Result<Self> {
        let events = Arc::new(EventLog::new());
        let dispatcher = Dispatcher::from_config(&settings.engine, recording_sink(&events))?;
        let identity: Arc<dyn IdentityResolver> = match caller {
            Some(name) => Arc::new(StaticIdentity::new(name)),
            None => Arc::new(EnvIdentity::new(CALLER_ENV)),
        };
        Ok(Self {
            ledger: Arc::new(ledger),
            events,
            dispatcher: Arc::new(dispatcher),
            identity,
            format,
        })
    }

    /// Run one action in its own transaction.
    pub fn dispatch(&self, kind: &str, action: &str, args: Vec<String>) -> Envelope {
        let tx = self.ledger.begin();
        let request = Request {
            kind: kind.to_string(),
            action: action.to_string(),
            args,
        };
        self.dispatcher.invoke(&tx, self.identity.clone(), &request)
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(cli.config.as_deref())?.with_ledger(cli.ledger.clone());

    match cli.command {
        Command::Serve(args) => cmd_serve(settings, args, cli.caller),
        Command::Kinds(args) => cmd_kinds(&settings, args, &cli.format),
        command => {
            let session = Session::open(&settings, cli.caller, cli.format)?;
            run_action(&session, command)
        }
    }
}

fn run_action(session: &Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Create(args) => {
            let env = session.dispatch(&args.kind, "create", vec![read_json_arg(&args.json)?]);
            report(session, &env, |data| {
                println!(
                    "{} Created {} {}",
                    "✓".green().bold(),
                    data["record"]["kind"].as_str().unwrap_or_default(),
                    data["id"].as_str().unwrap_or_default().yellow()
                );
            })
        }
        Command::CreateBulk(args) => {
            let env = session.dispatch(&args.kind, "createBulk", vec![read_json_arg(&args.json)?]);
            report(session, &env, print_bulk)
        }
        Command::UpdateStatus(args) => {
            let body = read_json_arg(&args.json)?;
            let argv = match (args.id, args.lookup) {
                (Some(id), _) => vec![id, body],
                (None, Some(mut pair)) if pair.len() == 2 => {
                    let value = pair.pop().unwrap_or_default();
                    let field = pair.pop().unwrap_or_default();
                    vec![field, value, body]
                }
                _ => vec![body],
            };
            let env = session.dispatch(&args.kind, "updateStatus", argv);
            report(session, &env, |data| {
                let record = &data["record"];
                println!(
                    "{} Updated {} {}",
                    "✓".green().bold(),
                    record["kind"].as_str().unwrap_or_default(),
                    record["id"].as_str().unwrap_or_default().yellow()
                );
            })
        }
        Command::UpdateStatusBulk(args) => {
            let env = session.dispatch(
                &args.kind,
                "updateStatusBulk",
                vec![read_json_arg(&args.json)?],
            );
            report(session, &env, print_bulk)
        }
        Command::Get(args) => {
            let env = session.dispatch(&args.kind, "queryById", vec![args.id]);
            report(session, &env, print_pretty)
        }
        Command::Query(args) => {
            let env = session.dispatch(&args.kind, "queryBySelector", vec![args.selector]);
            report(session, &env, |data| {
                print_records(data);
            })
        }
        Command::Page(args) if args.all => cmd_page_all(session, args),
        Command::Page(args) => {
            let env = session.dispatch(
                &args.kind,
                "queryPaginated",
                vec![args.selector, args.page_size.to_string(), args.bookmark],
            );
            report(session, &env, |data| {
                print_records(&data["records"]);
                println!(
                    "{} record(s), next bookmark: {}",
                    data["recordsCount"],
                    data["nextBookmark"].as_str().unwrap_or_default().cyan()
                );
            })
        }
        Command::History(args) => {
            let env = session.dispatch(&args.kind, "history", vec![args.id]);
            report(session, &env, print_history)
        }
        Command::Invoke(args) => {
            let env = session.dispatch(&args.kind, &args.action, args.args);
            println!("{}", serde_json::to_string_pretty(&env)?);
            if env.is_success() {
                Ok(())
            } else {
                anyhow::bail!("{} failed", args.action)
            }
        }
        Command::Serve(_) | Command::Kinds(_) => Ok(()),
    }
}

fn cmd_page_all(session: &Session, args: PageArgs) -> anyhow::Result<()> {
    let manager = session
        .dispatcher
        .manager(&args.kind, session.identity.clone())?;
    let tx = session.ledger.begin();
    let mut total = 0;
    for (n, page) in manager.pages(&tx, &args.selector, args.page_size)?.enumerate() {
        let page = page?;
        total += page.records_count;
        match session.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&page)?),
            OutputFormat::Text => {
                println!("{}", format!("page {}", n + 1).bold());
                print_records(&serde_json::to_value(&page.records)?);
            }
        }
    }
    if matches!(session.format, OutputFormat::Text) {
        println!("{total} record(s) in {} (tx {})", args.kind.yellow(), tx.tx_id().short());
    }
    Ok(())
}

fn cmd_kinds(settings: &Settings, args: KindsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let registry = settings.engine.registry()?;
    let schemas: Vec<_> = match &args.kind {
        Some(kind) => vec![registry.get(kind)?],
        None => registry.schemas().cloned().map(Arc::new).collect(),
    };

    if matches!(format, OutputFormat::Json) {
        let list: Vec<_> = schemas.iter().map(|s| s.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    for schema in &schemas {
        println!(
            "{}  ({} rules, mutable: {})",
            schema.kind.yellow().bold(),
            schema.rules.len(),
            schema.mutable.join(", ")
        );
        if args.kind.is_some() {
            println!("  {} {}", schema.id_field.bold(), "mandatory".dimmed());
            for rule in &schema.rules {
                let mut notes = vec![if rule.optional { "optional" } else { "mandatory" }.to_string()];
                if rule.integer {
                    notes.push("integer".into());
                }
                if let Some(domain) = &rule.one_of {
                    notes.push(domain.to_string());
                }
                println!("  {} {}", rule.field.bold(), notes.join(", ").dimmed());
            }
            if let Some(lookup) = &schema.lookup {
                println!("  lookup by {}", lookup.cyan());
            }
        }
    }
    Ok(())
}

fn cmd_serve(settings: Settings, args: ServeArgs, caller: Option<String>) -> anyhow::Result<()> {
    let mut config = settings.server.clone();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if caller.is_some() {
        config.default_caller = caller;
    }
    let ledger_config = if args.in_memory {
        LedgerConfig::in_memory()
    } else {
        settings.ledger.clone()
    };

    let state = AppState::open(&ledger_config, &settings.engine).context("opening ledger")?;

    println!(
        "{} RL server on {} ({})",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        match &ledger_config.path {
            Some(path) => path.display().to_string(),
            None => "in-memory".into(),
        }
    );
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(RlServer::new(config, state).serve())?;
    Ok(())
}

/// Inline JSON, or the contents of the file after `@`.
fn read_json_arg(arg: &str) -> anyhow::Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("reading {path}")),
        None => Ok(arg.to_string()),
    }
}

fn report(session: &Session, env: &Envelope, text: impl FnOnce(&Value)) -> anyhow::Result<()> {
    if matches!(session.format, OutputFormat::Json) {
        println!("{}", serde_json::to_string_pretty(env)?);
    } else if let Some(data) = &env.data {
        text(data);
        println!("  {} {}", "tx".dimmed(), short_tx(&env.trxn_id).dimmed());
    }
    tracing::debug!(events = session.events.len(), "command finished");

    if env.is_success() {
        return Ok(());
    }
    let tag = env.error.map(|k| k.as_str()).unwrap_or("ERROR");
    let message = env.message.clone().unwrap_or_default();
    if matches!(session.format, OutputFormat::Text) {
        eprintln!("{} {} {}", "✗".red().bold(), tag.red(), message);
    }
    Err(anyhow::Error::msg(message).context(tag))
}

fn short_tx(tx: &str) -> &str {
    tx.get(..8).unwrap_or(tx)
}

fn print_bulk(data: &Value) {
    println!(
        "{} accepted {}, rejected {}",
        "✓".green().bold(),
        data["acceptedCount"].to_string().green(),
        data["rejectedIds"].as_array().map_or(0, Vec::len).to_string().red()
    );
    for failure in data["failures"].as_array().into_iter().flatten() {
        println!(
            "  {} #{} {} {}",
            "✗".red(),
            failure["index"],
            failure["id"].as_str().unwrap_or_default().yellow(),
            failure["message"].as_str().unwrap_or_default()
        );
    }
}

fn print_pretty(data: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
    );
}

fn print_records(records: &Value) {
    let records = records.as_array().map(Vec::as_slice).unwrap_or_default();
    if records.is_empty() {
        println!("{}", "No records.".dimmed());
    }
    for entry in records {
        println!(
            "{}  {}",
            entry["key"].as_str().unwrap_or_default().yellow(),
            entry["record"]
        );
    }
}

fn print_history(data: &Value) {
    let entries = data.as_array().map(Vec::as_slice).unwrap_or_default();
    if entries.is_empty() {
        println!("{}", "No history.".dimmed());
    }
    for entry in entries {
        let tx = entry["txId"].as_str().unwrap_or_default();
        let when = entry["timestamp"].as_str().unwrap_or_default();
        if entry["isDelete"].as_bool().unwrap_or(false) {
            println!("{}  {}  {}", short_tx(tx).yellow(), when.dimmed(), "deleted".red());
        } else {
            println!("{}  {}  {}", short_tx(tx).yellow(), when.dimmed(), entry["value"]);
        }
    }
}
