//! Schema Compiler CLI
//!
//! Compiles a JSON schema, validates instances against it, and fetches
//! stored schemas from the configured directory store.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use typed_schemas::codegen::generate_rust;
use typed_schemas::config::Settings;
use typed_schemas::store::load_compiled;
use typed_schemas::{compile_with, CompiledSchema, CompilerOptions, DirectoryStore, SchemaDocument};

#[derive(Parser)]
#[command(name = "schema-compile")]
#[command(about = "Compile JSON schemas into typed descriptors")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a schema file
    Compile {
        schema: PathBuf,
        /// Root type name
        #[arg(short, long)]
        root: Option<String>,
        #[arg(short, long, value_enum, default_value = "summary")]
        emit: Emit,
    },

    /// Validate an instance against a schema file
    Validate {
        schema: PathBuf,
        instance: PathBuf,
        #[arg(short, long)]
        root: Option<String>,
    },

    /// Fetch and compile a schema from the store
    Fetch {
        name: String,
        /// User whose namespace is searched first
        #[arg(short, long)]
        user: Option<String>,
        #[arg(short, long, value_enum, default_value = "summary")]
        emit: Emit,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Emit {
    Summary,
    JsonSchema,
    Rust,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref().map(Path::to_string_lossy);
    let settings = Settings::load_from(config_path.as_deref()).context("loading configuration")?;

    let mut options = CompilerOptions::from(&settings.compiler);
    options.strict |= cli.strict;

    match cli.command {
        Commands::Compile { schema, root, emit } => {
            let root = root.unwrap_or_else(|| settings.compiler.default_root.clone());
            let compiled = compile_file(&schema, &root, &options)?;
            print_emit(&compiled, emit, &settings)?;
        }

        Commands::Validate {
            schema,
            instance,
            root,
        } => {
            let root = root.unwrap_or_else(|| settings.compiler.default_root.clone());
            let compiled = compile_file(&schema, &root, &options)?;
            let instance: Value = read_json(&instance)?;

            match compiled.validate(&instance) {
                Ok(()) => println!("✅ Instance is valid for {}", compiled.root_name()),
                Err(report) => {
                    println!("❌ {} error(s):", report.len());
                    println!("{}", report);
                    bail!("instance does not match {}", compiled.root_name());
                }
            }
        }

        Commands::Fetch { name, user, emit } => {
            let store = DirectoryStore::open(settings.store_path());
            let compiled = load_compiled(&store, &settings.store, user.as_deref(), &name, &options)?;
            print_emit(&compiled, emit, &settings)?;
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn compile_file(path: &Path, root: &str, options: &CompilerOptions) -> anyhow::Result<CompiledSchema> {
    let raw = read_json(path)?;
    let document = SchemaDocument::from_json(&raw)?;
    Ok(compile_with(&document, root, options)?)
}

fn print_emit(compiled: &CompiledSchema, emit: Emit, settings: &Settings) -> anyhow::Result<()> {
    match emit {
        Emit::Summary => print_summary(compiled),
        Emit::JsonSchema => {
            println!("{}", settings.output.format.render(&compiled.to_json_schema())?);
        }
        Emit::Rust => print!("{}", generate_rust(compiled).code),
    }
    Ok(())
}

fn print_summary(compiled: &CompiledSchema) {
    println!("📦 {} ({})", compiled.root_name(), compiled.fingerprint().short());
    println!("   Types: {}", compiled.cache().len());

    for (id, name, _) in compiled.cache().iter() {
        let marker = if compiled.recursion().is_recursive(id) { " ↻" } else { "" };
        println!("   {} {}{}", id, name, marker);
    }

    if !compiled.recursion().is_empty() {
        println!("   Recursive groups: {}", compiled.recursion().groups.len());
        for group in &compiled.recursion().groups {
            println!("     - {}", group.names.join(" ↔ "));
        }
    }

    if compiled.diagnostics().is_empty() {
        println!("\n✅ No diagnostics");
    } else {
        println!("\n⚠️  {} diagnostic(s):", compiled.diagnostics().len());
        println!("{}", compiled.diagnostics().format_all());
    }
}
