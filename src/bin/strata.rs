//! Binary entry point for the Strata command-line tool.
#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use strata::{
    compile::{validate_filter, validate_order, SortPlan, TypeScope},
    context::{Aspect, AspectContext, ColumnSet, LanguageAspect, OverlayMode, WorkspaceAspect},
    error::ErrorWithCode,
    exec::{QueryAssembler, SqliteExecutor},
    DefaultParser, EngineConfig, Error, Execution, ExpressionParser, Schema, Selection,
};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "STRATA_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Validate, compile, and run filter/order queries over a relational schema",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "STRATA_CONFIG",
        help = "Engine configuration file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct TargetArgs {
    #[arg(long, value_name = "FILE", help = "Schema definition (TOML)")]
    schema: PathBuf,

    #[arg(long = "type", value_name = "TYPE", help = "Entity type queried at the root")]
    type_name: String,

    #[arg(long, value_name = "EXPR", help = "Filter expression")]
    filter: Option<String>,

    #[arg(long, value_name = "EXPR", help = "Order expression")]
    order: Option<String>,
}

#[derive(Args, Debug)]
struct ContextArgs {
    #[arg(long, value_name = "ID", help = "Active language id")]
    language: Option<i64>,

    #[arg(
        long,
        value_name = "MODE",
        default_value = "off",
        help = "Language overlay mode (off, mixed, on, on_with_floating)"
    )]
    overlay: OverlayMode,

    #[arg(long, value_name = "ID", help = "Active workspace id (0 = live)")]
    workspace: Option<i64>,
}

impl ContextArgs {
    fn aspects(&self) -> AspectContext {
        let mut aspects = AspectContext::new();
        if let Some(workspace) = self.workspace {
            aspects = aspects.with(Aspect::Workspace(WorkspaceAspect::new(workspace)));
        }
        if let Some(language) = self.language {
            aspects = aspects.with(Aspect::Language(LanguageAspect::new(language, self.overlay)));
        }
        aspects
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and validate filter/order expressions against a type.
    Check(TargetArgs),
    /// Print the SQL and parameters of a root query.
    Compile {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Run a root query against a SQLite database and print JSON rows.
    Query {
        #[arg(long, value_name = "FILE", help = "SQLite database")]
        db: PathBuf,
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        context: ContextArgs,
        #[arg(
            long,
            value_name = "FIELDS",
            help = "Comma-separated fields; dotted paths select through relations"
        )]
        select: Option<String>,
        #[arg(long, default_value = "items", help = "Root field name")]
        root: String,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {}", ErrorWithCode(&err));
        std::process::exit(if err.is_user_facing() { 2 } else { 1 });
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(true)
        .try_init();
}

fn run(cli: Cli) -> Result<(), Error> {
    let config = EngineConfig::discover(cli.config.clone())?;
    match cli.command {
        Command::Check(target) => {
            let schema = Schema::load(&target.schema, &config)?;
            let scope = TypeScope::entity(&schema, &target.type_name)?;
            let (filter, order) = parse_expressions(&target)?;
            validate_filter(filter.as_ref(), &scope, &config.limits)?;
            validate_order(order.as_ref(), &scope, &config.limits)?;
            match cli.format {
                OutputFormat::Text => println!("ok"),
                OutputFormat::Json => println!("{}", json!({ "ok": true })),
            }
        }
        Command::Compile { target, context } => {
            let schema = Schema::load(&target.schema, &config)?;
            let aspects = context.aspects();
            let rendered = compile_root(&schema, &config, &aspects, &target)?;
            match cli.format {
                OutputFormat::Text => print!("{rendered}"),
                OutputFormat::Json => {
                    let params: serde_json::Map<String, serde_json::Value> = rendered
                        .params
                        .iter()
                        .map(|(name, value)| (name.clone(), sql_to_json(value)))
                        .collect();
                    println!("{}", json!({ "sql": rendered.sql, "params": params }));
                }
            }
        }
        Command::Query {
            db,
            target,
            context,
            select,
            root,
        } => {
            let schema = Schema::load(&target.schema, &config)?;
            let executor = open_database(&db)?;
            let mut selection = Selection::new(&root);
            if let Some(filter) = &target.filter {
                selection = selection.argument("filter", filter);
            }
            if let Some(order) = &target.order {
                selection = selection.argument("order", order);
            }
            if let Some(select) = &select {
                selection.children = parse_select(select);
            }
            let value = Execution::new(&schema, &config)
                .with_aspects(context.aspects())
                .run(&executor, &selection, &target.type_name)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let written = match cli.format {
                OutputFormat::Text => serde_json::to_writer_pretty(&mut out, &value),
                OutputFormat::Json => serde_json::to_writer(&mut out, &value),
            }
            .map_err(io::Error::from)
            .and_then(|()| writeln!(out));
            if let Err(err) = written {
                eprintln!("error: failed to write output: {err}");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn parse_expressions(
    target: &TargetArgs,
) -> Result<(Option<strata::ExpressionNode>, Option<strata::ExpressionNode>), Error> {
    let parser = DefaultParser;
    let filter = match &target.filter {
        Some(text) => parser.parse_filter(text)?,
        None => None,
    };
    let order = match &target.order {
        Some(text) => parser.parse_order(text)?,
        None => None,
    };
    Ok((filter, order))
}

fn compile_root(
    schema: &Schema,
    config: &EngineConfig,
    aspects: &AspectContext,
    target: &TargetArgs,
) -> Result<strata::sql::RenderedQuery, Error> {
    let scope = TypeScope::entity(schema, &target.type_name)?;
    let (filter, order) = parse_expressions(target)?;
    validate_filter(filter.as_ref(), &scope, &config.limits)?;
    validate_order(order.as_ref(), &scope, &config.limits)?;
    let plan = SortPlan::plan(order.as_ref(), &scope, &config.output.sort_alias_prefix);

    let assembler = QueryAssembler::new(schema, config, aspects);
    let mut rendered = None;
    for ty in scope.candidates().iter().copied() {
        let mut query = assembler.table(ty)?;
        query.project(&ColumnSet::All).project_source();
        query.filter(filter.as_ref())?;
        query.sort(&plan, &scope, order.as_ref());
        rendered = Some(query.build()?.render()?);
    }
    rendered.ok_or_else(|| {
        strata::error::ValidationError::UnknownType {
            name: target.type_name.clone(),
        }
        .into()
    })
}

fn open_database(path: &Path) -> Result<SqliteExecutor, Error> {
    if !path.exists() {
        return Err(rusqlite::Error::InvalidPath(path.to_path_buf()).into());
    }
    Ok(SqliteExecutor::open(path)?)
}

/// Builds a selection tree from `a,b,rel.c,rel.d`.
fn parse_select(text: &str) -> Vec<Selection> {
    let mut roots: Vec<Selection> = Vec::new();
    for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let mut level = &mut roots;
        for segment in entry.split('.') {
            let pos = match level.iter().position(|s| s.field == segment) {
                Some(pos) => pos,
                None => {
                    level.push(Selection::new(segment));
                    level.len() - 1
                }
            };
            level = &mut level[pos].children;
        }
    }
    roots
}

fn sql_to_json(value: &rusqlite::types::Value) -> serde_json::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Sql::Null => serde_json::Value::Null,
        Sql::Integer(v) => json!(v),
        Sql::Real(v) => json!(v),
        Sql::Text(v) => json!(v),
        Sql::Blob(v) => json!(format!("<{} bytes>", v.len())),
    }
}
