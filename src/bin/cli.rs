use std::path::PathBuf;
use std::process;

use clap::{CommandFactory, Parser as ClapParser};

use formtable::{
    ParamError, RequestConfig, RequestContext, RuleSet, TableLimits, Utf8Check, format_debug,
    format_json, to_xml,
};

/// formtable CLI: build, validate and dump a request parameter table.
///
/// Fields are given on the command line; uploads are read from files and
/// fed to the table in chunks, the way a request body reader would.
#[derive(ClapParser)]
#[command(name = "formtable-cli", version, about, long_about = None)]
struct Cli {
    /// Scalar field as NAME=VALUE (repeatable).
    #[arg(long = "field", value_name = "NAME=VALUE", value_parser = parse_pair)]
    fields: Vec<(String, String)>,

    /// Uploaded file as NAME=PATH (repeatable).
    #[arg(long = "upload", value_name = "NAME=PATH", value_parser = parse_pair)]
    uploads: Vec<(String, String)>,

    /// Array element as NAME=VALUE; repeated names form one array field.
    #[arg(long = "item", value_name = "NAME=VALUE", value_parser = parse_pair)]
    items: Vec<(String, String)>,

    /// Validation rule as NAME:RULE, e.g. `port:int=1..65535` (repeatable).
    #[arg(long = "rule", value_name = "NAME:RULE")]
    rules: Vec<String>,

    /// Value substituted for a field that fails validation, as NAME=VALUE.
    #[arg(long = "default", value_name = "NAME=VALUE", value_parser = parse_pair)]
    defaults: Vec<(String, String)>,

    /// Size of the chunks uploads are delivered in.
    #[arg(long, default_value = "4096", value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: u64,

    /// Maximum size of a single uploaded value in bytes.
    #[arg(long, default_value = "10485760")]
    max_value_size: usize,

    /// Mark the request as received over HTTPS.
    #[arg(long)]
    https: bool,

    /// Mark the server as running in a chroot.
    #[arg(long)]
    chroot: bool,

    /// UI language code.
    #[arg(long, default_value = "en")]
    lang: String,

    /// Output format.
    #[arg(short, long, default_value = "json", value_enum)]
    format: OutputFormat,

    /// Pretty-print JSON output (ignored for other formats).
    #[arg(short, long)]
    pretty: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormat {
    /// JSON output
    Json,
    /// XML document as handed to the stylesheet renderer
    Xml,
    /// Human-readable debug output
    Debug,
}

fn main() {
    let cli = Cli::parse();

    if cli.fields.is_empty() && cli.uploads.is_empty() && cli.items.is_empty() {
        Cli::command().print_help().ok();
        println!();
        process::exit(0);
    }

    let mut rules = RuleSet::new();
    for spec in &cli.rules {
        if let Err(e) = rules.add_spec(spec) {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }

    let config = RequestConfig {
        chroot: cli.chroot,
        https: cli.https,
        language: cli.lang.clone(),
    };
    let limits = TableLimits {
        max_value_size: cli.max_value_size,
    };
    let mut ctx = RequestContext::with_limits(config, limits);

    if let Err(e) = load_request(&cli, &mut ctx) {
        eprintln!("Request error: {e}");
        process::exit(2);
    }

    let invalid = match ctx.validate(&rules, &Utf8Check) {
        Ok(report) => report.invalid.clone(),
        Err(e) => {
            eprintln!("Validation error: {e}");
            process::exit(2);
        }
    };

    for (name, value) in &cli.defaults {
        if invalid.iter().any(|path| path == name) {
            if let Err(e) = ctx.replace_value(name, value) {
                eprintln!("Error: {e}");
                process::exit(2);
            }
        }
    }

    if !invalid.is_empty() {
        eprintln!("Invalid fields: {}", invalid.join(", "));
    }

    let output = match cli.format {
        OutputFormat::Json => format_json(ctx.table(), cli.pretty),
        OutputFormat::Xml => to_xml(&ctx),
        OutputFormat::Debug => format_debug(ctx.table()),
    };

    print!("{output}");
}

#[derive(Debug)]
enum LoadError {
    Io(PathBuf, std::io::Error),
    Param(ParamError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "{}: {e}", path.display()),
            Self::Param(e) => write!(f, "{e}"),
        }
    }
}

impl From<ParamError> for LoadError {
    fn from(e: ParamError) -> Self {
        Self::Param(e)
    }
}

/// Feed every command-line input into the context, as a body reader would.
fn load_request(cli: &Cli, ctx: &mut RequestContext) -> Result<(), LoadError> {
    for (name, value) in &cli.fields {
        ctx.add(name.as_str(), value)?;
    }

    let chunk_size = usize::try_from(cli.chunk_size).unwrap_or(usize::MAX);
    for (name, path) in &cli.uploads {
        let path = PathBuf::from(path);
        let data = std::fs::read(&path).map_err(|e| LoadError::Io(path.clone(), e))?;

        // Start a fresh record so a repeated name replaces the old one.
        ctx.add(name.as_str(), b"")?;
        for (i, chunk) in data.chunks(chunk_size).enumerate() {
            ctx.append_chunk(name, chunk, i * chunk_size)?;
        }

        if let Some(filename) = path.file_name() {
            ctx.set_filename(name, filename.to_string_lossy())?;
        }
    }

    let mut arrays: Vec<(&str, Vec<&str>)> = Vec::new();
    for (name, value) in &cli.items {
        let existing = arrays.iter().position(|(n, _)| *n == name.as_str());
        match existing {
            Some(i) => arrays[i].1.push(value.as_str()),
            None => arrays.push((name.as_str(), vec![value.as_str()])),
        }
    }
    for (name, values) in arrays {
        let children = ctx.add_multi(name)?;
        for (i, value) in values.into_iter().enumerate() {
            children.add(i.to_string(), value);
        }
    }

    Ok(())
}

/// Split `NAME=VALUE` at the first `=`.
fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) => Ok((name.to_string(), value.to_string())),
        None => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}
