use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cipherchat::config::ServerConfig;
use cipherchat::server::{ConsoleCommand, Delivery};
use cipherchat::ui::{detect_input, UserInput};
use cipherchat::{AdminOperations, ChatServer, CredentialStore, KeyPair, ServiceState};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h") {
        println!("cipherchat server");
        println!("Usage: {} [CREDENTIALS_FILE] [PORT]", args[0]);
        println!("  CREDENTIALS_FILE: user database (default: Auth.txt)");
        println!("  PORT: port to listen on (default: 8080)");
        return Ok(());
    }

    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_sources(|key| std::env::var(key).ok(), &args[1..])?;

    // A malformed credential file stops startup here
    let store = Arc::new(CredentialStore::open(&config.credentials_path)?);
    info!(bits = config.key_bits, "generating service key pair");
    let keys = Arc::new(KeyPair::generate(config.key_bits)?);
    let service = ServiceState::new(keys, store);
    let admin = service.admin();

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let server = ChatServer::bind(addr, service).await?;
    tokio::spawn(server.run());

    // Operator input blocks on stdin, so the console gets its own thread
    let runtime = Handle::current();
    let mut input = detect_input();
    tokio::task::spawn_blocking(move || run_console(&runtime, &admin, input.as_mut())).await?
}

fn run_console(runtime: &Handle, admin: &AdminOperations, input: &mut dyn UserInput) -> Result<(), BoxError> {
    while let Some(line) = input.read_line()? {
        match ConsoleCommand::parse(&line) {
            ConsoleCommand::Empty => {}
            ConsoleCommand::Help => println!("{}", cipherchat::server::console::HELP),
            ConsoleCommand::Clients => {
                let clients = admin.list_clients();
                println!("Active users({}):", clients.len());
                for name in clients {
                    println!("\t{}", name);
                }
            }
            ConsoleCommand::Broadcast(message) => {
                let reached = admin.broadcast_from_admin(&message);
                println!("Sent to {} client(s)", reached);
            }
            ConsoleCommand::Message { to, message } => {
                if admin.private_from_admin(&to, &message) == Delivery::NoSuchClient {
                    eprintln!("No such client: {}", to);
                }
            }
            ConsoleCommand::Kick(name) => {
                if admin.kick(&name) == Delivery::NoSuchClient {
                    eprintln!("No such client: {}", name);
                }
            }
            ConsoleCommand::Kill => {
                println!("This kicks everyone and deletes every registered credential. Type 'yes' to continue:");
                if input.read_line()?.as_deref() != Some("yes") {
                    println!("Aborted");
                    continue;
                }
                match runtime.block_on(admin.kill_all()) {
                    Ok(report) => {
                        info!(kicked = report.kicked.len(), "shutting down");
                        std::process::exit(0);
                    }
                    Err(e) => error!(error = %e, "shutdown failed"),
                }
            }
            ConsoleCommand::Unknown(command) => eprintln!("UNKNOWN COMMAND: {}", command),
        }
    }
    Ok(())
}
