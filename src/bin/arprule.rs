//! arprule: arptables-style front-end over a snapshot-backed rule table.

use clap::Parser;
use std::path::PathBuf;
use std::process;

use arprule::command::CommandSet;
use arprule::namespace::{OptionNamespace, OptionOwner};
use arprule::options::CoreOpt;
use arprule::parser::{Scanner, Token};
use arprule::{
    help_text, CommandDispatcher, Config, Error, ExtensionRegistry, Invocation, MemoryEngine,
    Result, RuleSpecParser, SystemResolver, TableEngine,
};

#[derive(Parser)]
#[command(name = "arprule")]
#[command(author = "Kaitu.io")]
#[command(about = "Administer ARP filtering rules", long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    /// JSON configuration file (defaults to $ARPRULE_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Table snapshot file, overriding the configuration
    #[arg(long, value_name = "PATH")]
    state_file: Option<PathBuf>,

    /// arptables command line, e.g. `-A INPUT -s 10.0.0.1 -j DROP`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    args: Vec<String>,
}

/// Count `-v` flags ahead of the real parse so logging is set up first.
fn verbosity(args: &[String]) -> usize {
    let namespace = OptionNamespace::new();
    let mut scanner = Scanner::new(args);
    let mut count = 0;
    while let Some(Ok(token)) = scanner.next_token(&namespace) {
        if let Token::Opt {
            owner: OptionOwner::Core(CoreOpt::Verbose),
            ..
        } = token
        {
            count += 1;
        }
    }
    count
}

fn init_logging(verbose: usize) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let registry = ExtensionRegistry::with_builtins()?;
    let resolver = SystemResolver::new();
    let mut parser = RuleSpecParser::new(&registry, &resolver);

    let cmd = match parser.parse(cli.args.as_slice())? {
        Invocation::Help(topic) => {
            print!("{}", help_text(&registry, topic.as_deref()));
            return Ok(0);
        }
        Invocation::Version { inverted: true } => {
            println!("Not {} ;-)", arprule::VERSION);
            return Ok(0);
        }
        Invocation::Version { inverted: false } => {
            println!("arprule v{}", arprule::VERSION);
            return Ok(0);
        }
        Invocation::Command(cmd) => cmd,
    };

    let config = Config::discover(cli.config.as_deref())?;
    let table = cmd.table.clone().unwrap_or_else(|| config.table.clone());
    let state_file = cli
        .state_file
        .unwrap_or_else(|| config.state_file_for(&table));
    let read_only = cmd.commands == CommandSet::LIST || cmd.commands == CommandSet::CHECK;

    let mut engine = MemoryEngine::open(&table, &state_file)?;
    let outcome = CommandDispatcher::new(&registry).dispatch(cmd, &mut engine)?;

    if let Some(listing) = &outcome.listing {
        print!("{}", listing);
    }
    if !outcome.success {
        for err in &outcome.errors {
            eprintln!("arprule: {}", err);
        }
        return Ok(1);
    }
    if !read_only {
        engine.commit()?;
    }
    Ok(0)
}

fn report(err: &Error) {
    eprintln!("arprule: {}", err);
    if err.wants_help_hint() {
        eprintln!("Try `arprule -h' or 'arprule --help' for more information.");
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(verbosity(&cli.args));

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            report(&err);
            process::exit(err.exit_code());
        }
    }
}
