use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use authgate::crypto::PasswordManager;
use authgate::{Authenticator, Configuration, Outcome, database, telemetry};
use clap::{Parser, Subcommand};
use zeroize::Zeroizing;

const GRANTED: u8 = 0;
const DENIED: u8 = 1;
const UNAVAILABLE: u8 = 2;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file, `config.yaml` when unset.
    #[arg(long, env = "CONFIG_PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Read a password on stdin and verify it for USERNAME.
    Check { username: String },
    /// Read a password on stdin and print its Argon2id hash.
    Hash,
    /// Create or update the `users` table.
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = telemetry::init_logging() {
        eprintln!("cannot install logger: {err}");
    }

    let path = args.config.unwrap_or_default();
    let result = match args.cmd {
        Commands::Check { username } => check(path, &username).await,
        Commands::Hash => hash(path),
        Commands::Migrate => migrate(path).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!(error = %err, "authgate failed");
            ExitCode::from(UNAVAILABLE)
        },
    }
}

fn configuration(
    path: PathBuf,
) -> Result<std::sync::Arc<Configuration>, Box<dyn std::error::Error>> {
    Ok(Configuration::default().path(path).read()?)
}

fn read_password() -> Result<Zeroizing<String>, std::io::Error> {
    let mut line = Zeroizing::new(String::new());
    std::io::stdin().lock().read_line(&mut line)?;

    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}

async fn check(path: PathBuf, username: &str) -> Result<u8, Box<dyn std::error::Error>> {
    let config = configuration(path)?;
    let Some(postgres) = &config.postgres else {
        return Err("missing `postgres` entry on configuration file".into());
    };

    // an unreachable store must not keep the directory from answering.
    let pool = database::connect_lazy(postgres)?;
    let authenticator = Authenticator::from_config(&config, pool)?;
    let password = read_password()?;

    let decision = authenticator.decide(username, &password).await;
    let code = match decision.outcome {
        Outcome::Granted => {
            println!("granted");
            GRANTED
        },
        Outcome::Denied(_) => {
            println!("denied");
            DENIED
        },
        Outcome::Failed(_) => {
            println!("denied");
            UNAVAILABLE
        },
    };

    Ok(code)
}

fn hash(path: PathBuf) -> Result<u8, Box<dyn std::error::Error>> {
    let config = configuration(path)?;
    let password = read_password()?;
    if password.is_empty() {
        return Err("refusing to hash an empty password".into());
    }

    let pwd = PasswordManager::new(config.argon2.clone())?;
    println!("{}", pwd.hash_password(password.as_bytes())?);

    Ok(GRANTED)
}

async fn migrate(path: PathBuf) -> Result<u8, Box<dyn std::error::Error>> {
    let config = configuration(path)?;
    let Some(postgres) = &config.postgres else {
        return Err("missing `postgres` entry on configuration file".into());
    };

    let pool = database::connect(postgres).await?;
    database::migrate(&pool).await?;
    tracing::info!("migrations applied");

    Ok(GRANTED)
}
