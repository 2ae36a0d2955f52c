use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use layerconf::loader::{
	DirectoryCascade, EnvironmentLoader, OverrideLoader, SourceLoader, init_template, load_all,
};
use layerconf::{Config, EngineOptions, TypeDescriptor, Value};

#[derive(Parser)]
#[command(name = "layerconf")]
#[command(
	author,
	version,
	about = "Resolve layered configuration with profiles, macro expansion and typed conversion"
)]
#[command(arg_required_else_help = true)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	/// Create a template application.toml in the start directory
	#[arg(long)]
	init: bool,

	/// Overwrite existing application.toml when using --init
	#[arg(long, requires = "init")]
	force: bool,

	/// Directory the file cascade starts from (defaults to the current directory)
	#[arg(long, global = true, value_name = "DIR")]
	dir: Option<PathBuf>,

	/// Override a property (highest precedence), may be repeated
	#[arg(short = 'D', value_name = "KEY=VALUE", global = true)]
	define: Vec<String>,

	/// Do not read properties from the process environment
	#[arg(long, global = true)]
	no_env: bool,

	/// TOML file with engine options (key delimiter, profile key, ...)
	#[arg(long, global = true, value_name = "FILE")]
	engine_options: Option<PathBuf>,

	/// Increase log verbosity (-v debug, -vv trace)
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
	/// Print a property expanded and converted to a type
	Get {
		name: String,

		/// Target type, e.g. `i32`, `list<string>`, `map<string, u16>`
		#[arg(long = "type", short = 't', default_value = "string")]
		target: String,
	},
	/// Print a property as stored, without expansion
	Raw { name: String },
	/// Show where a property's value comes from
	Explain { name: String },
	/// List all property names
	Names,
	/// List sources in search order with ordinals and profile tags
	Sources,
}

fn main() -> ExitCode {
	match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:?}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<ExitCode> {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	let start_dir = match cli.dir.clone() {
		Some(dir) => dir,
		None => std::env::current_dir().context("Failed to get current directory")?,
	};

	// Handle --init
	if cli.init {
		return handle_init(&start_dir, cli.force);
	}

	let Some(command) = cli.command.as_ref() else {
		// No command specified - this shouldn't happen due to arg_required_else_help
		return Ok(ExitCode::SUCCESS);
	};

	let config = load_config(&cli, &start_dir)?;
	match command {
		Commands::Get { name, target } => handle_get(&config, name, target),
		Commands::Raw { name } => handle_raw(&config, name),
		Commands::Explain { name } => handle_explain(&config, name),
		Commands::Names => handle_names(&config),
		Commands::Sources => handle_sources(&config),
	}
}

fn init_tracing(verbose: u8) {
	let default_level = match verbose {
		0 => "warn",
		1 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	// A second initialization only happens in tests; ignore it.
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.try_init();
}

fn load_config(cli: &Cli, start_dir: &Path) -> Result<Config> {
	let options = match &cli.engine_options {
		Some(path) => EngineOptions::from_file(path)
			.with_context(|| format!("Failed to load engine options from {}", path.display()))?,
		None => EngineOptions::default(),
	};

	let overrides = OverrideLoader::parse(&cli.define).context("Invalid -D override")?;
	let cascade = DirectoryCascade::new(start_dir, options.clone());
	let mut loaders: Vec<&dyn SourceLoader> = vec![&overrides, &cascade];
	if !cli.no_env {
		loaders.push(&EnvironmentLoader);
	}

	let sources = load_all(&loaders).context("Failed to load configuration sources")?;
	Config::builder()
		.sources(sources)
		.options(options)
		.build()
		.context("Failed to build configuration")
}

fn handle_init(start_dir: &Path, force: bool) -> Result<ExitCode> {
	let config_path = start_dir.join("application.toml");

	if config_path.exists() && !force {
		anyhow::bail!(
			"{} already exists. Use --force to overwrite.",
			config_path.display()
		);
	}

	std::fs::write(&config_path, init_template())
		.with_context(|| format!("Failed to write {}", config_path.display()))?;

	println!("Created {}", config_path.display());
	Ok(ExitCode::SUCCESS)
}

fn handle_get(config: &Config, name: &str, target: &str) -> Result<ExitCode> {
	let target: TypeDescriptor = target
		.parse()
		.with_context(|| format!("Invalid --type: {target}"))?;

	let value = config
		.get_value(name, &target)
		.with_context(|| format!("Failed to read {name} as {target}"))?;
	let value = match value {
		Value::Deferred(deferred) => deferred
			.get()
			.with_context(|| format!("Failed to read {name} as {target}"))?,
		other => other,
	};

	println!("{value}");
	Ok(ExitCode::SUCCESS)
}

fn handle_raw(config: &Config, name: &str) -> Result<ExitCode> {
	match config.raw_value(name) {
		Some(raw) => {
			println!("{raw}");
			Ok(ExitCode::SUCCESS)
		}
		None => {
			eprintln!("Property not found: {name}");
			Ok(ExitCode::FAILURE)
		}
	}
}

fn handle_explain(config: &Config, name: &str) -> Result<ExitCode> {
	let Some(value) = config
		.config_value(name)
		.with_context(|| format!("Failed to expand {name}"))?
	else {
		eprintln!("Property not found: {name}");
		return Ok(ExitCode::FAILURE);
	};

	println!("name:    {}", value.name);
	println!("value:   {}", value.value);
	println!("raw:     {}", value.raw);
	println!("source:  {} (ordinal {})", value.source_name, value.source_ordinal);
	Ok(ExitCode::SUCCESS)
}

fn handle_names(config: &Config) -> Result<ExitCode> {
	for name in config.property_names() {
		println!("{name}");
	}
	Ok(ExitCode::SUCCESS)
}

fn handle_sources(config: &Config) -> Result<ExitCode> {
	let snapshot = config.snapshot();
	let profiles = snapshot.sources().profiles();
	if profiles.is_empty() {
		println!("Active profiles: (none)");
	} else {
		println!("Active profiles: {}", profiles.join(", "));
	}
	println!("Sources (in search order):\n");

	for ordered in snapshot.sources().sources() {
		match &ordered.profile {
			Some(profile) => println!("  [{}] {} (profile: {profile})", ordered.ordinal, ordered.name()),
			None => println!("  [{}] {}", ordered.ordinal, ordered.name()),
		}
	}
	Ok(ExitCode::SUCCESS)
}
