use clap::{Args, Parser, Subcommand, ValueEnum};
use dottest::{
    RegistrationConfig, RegistrationEngine, RegistrationReport, ResolverError, Suffix, TargetKind,
};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Route a custom top-level domain to localhost for local development.
#[derive(Parser, Debug)]
#[command(name = "dottest", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Resolver directory holding one file per suffix [env: DOTTEST_RESOLVER_DIR].
    #[arg(long, global = true)]
    resolver_dir: Option<PathBuf>,

    /// Hosts file used as fallback [env: DOTTEST_HOSTS_FILE].
    #[arg(long, global = true)]
    hosts_file: Option<PathBuf>,

    /// Address the suffix resolves to.
    #[arg(long, default_value = "127.0.0.1", global = true)]
    address: IpAddr,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register the suffix with the system resolver.
    Install {
        #[command(flatten)]
        target: TargetArgs,

        /// Nameserver port written to the resolver file.
        #[arg(long)]
        port: Option<u16>,

        /// Also write the hosts file when a resolver directory exists.
        #[arg(long)]
        with_hosts: bool,
    },
    /// Remove the suffix registration.
    Uninstall {
        #[command(flatten)]
        target: TargetArgs,

        /// Also clean the hosts file when a resolver directory exists.
        #[arg(long)]
        with_hosts: bool,
    },
    /// Show whether the suffix is registered.
    Status {
        #[command(flatten)]
        target: TargetArgs,

        /// Also inspect the hosts file when a resolver directory exists.
        #[arg(long)]
        with_hosts: bool,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Domain suffix to route, without or with a leading dot.
    #[arg(default_value = "test")]
    suffix: String,

    /// Only manage this kind of target.
    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Host name to map under the suffix in the hosts file (repeatable).
    #[arg(long = "host", value_name = "NAME")]
    hosts: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    /// The per-suffix file in the resolver directory
    Resolver,
    /// The shared hosts file
    Hosts,
}

impl From<KindArg> for TargetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Resolver => Self::ResolverDirectoryEntry,
            KindArg::Hosts => Self::HostsFileEntry,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            if let Some(report) = e.report() {
                eprint!("{report}");
            }
            if e.is_permission_denied() {
                eprintln!("hint: re-run with sudo");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, ResolverError> {
    let (target, port, with_hosts) = match &cli.command {
        Command::Install {
            target,
            port,
            with_hosts,
        } => (target, *port, *with_hosts),
        Command::Uninstall { target, with_hosts } | Command::Status { target, with_hosts } => {
            (target, None, *with_hosts)
        }
    };

    let suffix = Suffix::parse(&target.suffix)?;
    let mut config = RegistrationConfig::from_env()
        .with_address(cli.address)
        .with_hosts_alongside(with_hosts);
    if let Some(dir) = &cli.resolver_dir {
        config = config.with_resolver_dir(dir);
    }
    if let Some(file) = &cli.hosts_file {
        config = config.with_hosts_file(file);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    if let Some(kind) = target.kind {
        config = config.with_kind(kind.into());
    }
    for host in &target.hosts {
        config = config.with_hostname(host)?;
    }

    let engine = RegistrationEngine::new(config);
    match cli.command {
        Command::Install { .. } => Ok(finish(&engine.install(&suffix)?)),
        Command::Uninstall { .. } => Ok(finish(&engine.uninstall(&suffix)?)),
        Command::Status { .. } => {
            print!("{}", engine.status(&suffix)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn finish(report: &RegistrationReport) -> ExitCode {
    print!("{report}");
    for target in report.global_targets() {
        eprintln!(
            "warning: {} is shared by every hostname on this machine",
            target.path.display()
        );
    }
    match report.reload_failures().next() {
        None => ExitCode::SUCCESS,
        Some(e) => {
            eprintln!("error: {e}");
            eprintln!("the configuration is in place; cached lookups expire on their own");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
