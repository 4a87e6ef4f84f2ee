use clap::Parser;
use gogen::{
    config::Config,
    diagnostics::emit_error,
    error::Error,
    imports::DEFAULT_REVENDOR_SEGMENT,
    project::{Resolver, ResolverOptions, SearchPath, Strategy},
    unmarshalmap::Generator,
};
use std::{
    env, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::{error, info};

/// Generates `func (s *T) UnmarshalMap(map[string]interface{}) error` for a
/// Go struct type, together with a test file for it.
#[derive(Parser, Debug)]
#[command(name = "gounmarshalmap", version)]
struct Cli {
    /// Struct type to generate the method for.
    #[arg(value_name = "STRUCT")]
    struct_name: String,

    /// File to write the method to; stdout when absent.
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    out: Option<PathBuf>,

    /// File to write the test to; derived from `-o` when absent.
    #[arg(long = "o-test", value_name = "FILE")]
    test_out: Option<PathBuf>,

    /// Package holding the struct; the working directory when absent.
    #[arg(long = "pkg", value_name = "ID")]
    package: Option<String>,

    /// How package identifiers map to directories.
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Also load `_test.go` files.
    #[arg(long)]
    include_tests: bool,

    /// GOPATH-style workspace; may be repeated.
    #[arg(long = "search-path", value_name = "DIR")]
    search_path: Vec<PathBuf>,

    /// Go installation providing the standard library.
    #[arg(long, value_name = "DIR")]
    goroot: Option<PathBuf>,

    /// Import path segment marking re-vendored packages; may be repeated.
    #[arg(long = "revendor", value_name = "SEGMENT")]
    revendor: Vec<String>,

    /// Configuration file; `gogen.toml` is searched upwards when absent.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log resolution details.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(
                package = cli.package.as_deref().unwrap_or("."),
                struct_name = %cli.struct_name,
                "generation failed"
            );
            emit_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), Error> {
    let working_dir = env::current_dir().map_err(Error::WorkingDir)?;
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(&working_dir)?,
    };
    let options = resolver_options(cli, &config, working_dir);
    let revendor = if !cli.revendor.is_empty() {
        cli.revendor.clone()
    } else if !config.imports.revendor.is_empty() {
        config.imports.revendor.clone()
    } else {
        vec![DEFAULT_REVENDOR_SEGMENT.to_string()]
    };
    let package = cli.package.clone().unwrap_or_else(|| ".".to_string());
    let test_out = cli
        .test_out
        .clone()
        .or_else(|| cli.out.as_deref().map(default_test_path));

    info!(
        out = ?cli.out,
        test_out = ?test_out,
        package = %package,
        struct_name = %cli.struct_name,
        strategy = %options.strategy,
        config = ?config.path,
        "generating UnmarshalMap"
    );

    let mut resolver = Resolver::new(options)?;
    let generator = Generator::new(&mut resolver, &package, &cli.struct_name)?
        .with_revendor_segments(revendor);
    let method = generator.generate()?;
    let test = generator.generate_test()?;

    write_output(cli.out.as_deref(), &method)?;
    write_output(test_out.as_deref(), &test)?;
    Ok(())
}

/// CLI flags win over the config file, which wins over `GOPATH`/`GOROOT`.
fn resolver_options(cli: &Cli, config: &Config, working_dir: PathBuf) -> ResolverOptions {
    let search_path = if !cli.search_path.is_empty() {
        SearchPath::from_workspaces(&cli.search_path)
    } else if !config.resolver.search_path.is_empty() {
        SearchPath::from_workspaces(&config.resolver.search_path)
    } else {
        env_search_path()
    };
    ResolverOptions {
        strategy: cli
            .strategy
            .or(config.resolver.strategy)
            .unwrap_or_default(),
        include_tests: cli.include_tests || config.resolver.include_tests.unwrap_or(false),
        search_path,
        goroot: cli
            .goroot
            .clone()
            .or_else(|| config.resolver.goroot.clone())
            .or_else(|| env::var_os("GOROOT").map(PathBuf::from)),
        working_dir,
    }
}

fn env_search_path() -> SearchPath {
    match env::var("GOPATH") {
        Ok(list) if !list.is_empty() => SearchPath::parse_list(&list),
        _ => env::var_os("HOME")
            .map(|home| SearchPath::from_workspaces([PathBuf::from(home).join("go")]))
            .unwrap_or_default(),
    }
}

fn default_test_path(out: &Path) -> PathBuf {
    let text = out.to_string_lossy();
    let stem = text.strip_suffix(".go").unwrap_or(&text);
    PathBuf::from(format!("{stem}_test.go"))
}

fn write_output(path: Option<&Path>, contents: &[u8]) -> Result<(), Error> {
    match path {
        Some(path) => fs::write(path, contents).map_err(|error| Error::Write {
            path: path.to_path_buf(),
            error,
        }),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(contents)
                .and_then(|()| stdout.flush())
                .map_err(|error| Error::Write {
                    path: PathBuf::from("<stdout>"),
                    error,
                })
        }
    }
}
