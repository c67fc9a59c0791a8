use std::io::Write;

use tokio::net::TcpStream;
use tokio::runtime::Handle;

use cipherchat::config::ClientConfig;
use cipherchat::ui::{detect_input, style_line, UserInput};
use cipherchat::ChatClient;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const HELP: &str = "commands:\n\
\t@<username> <message> - send <message> to <username> only\n\
\t:clients - list connected clients\n\
\t:changepassword - prompts for a new password and changes it\n\
\t:help - list all commands\n\
\t:quit - disconnect from the server";

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h") {
        println!("cipherchat client");
        println!("Usage: {} [HOST] [PORT]", args[0]);
        return Ok(());
    }

    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let config = ClientConfig::from_sources(|key| std::env::var(key).ok(), &args[1..])?;
    let stream = TcpStream::connect(config.address()).await?;
    stream.set_nodelay(true)?;
    let client = ChatClient::connect(stream, config.key_bits).await?;

    // Prompts block on stdin, so they run off the async workers
    let runtime = Handle::current();
    let input = detect_input();
    tokio::task::spawn_blocking(move || run_prompt(&runtime, client, input)).await?
}

fn run_prompt(
    runtime: &Handle,
    mut client: ChatClient<TcpStream>,
    mut input: Box<dyn UserInput>,
) -> Result<(), BoxError> {
    loop {
        print!("Nickname: ");
        std::io::stdout().flush()?;
        let Some(name) = input.read_line()? else { return Ok(()) };
        print!("Password: ");
        std::io::stdout().flush()?;
        let Some(password) = input.read_password()? else { return Ok(()) };

        let response = runtime.block_on(client.login(&name, &password))?;
        println!("{}", response);
        if response.is_accepted() {
            break;
        }
    }

    let (mut receiver, mut sender) = client.into_split();
    runtime.spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(Some(line)) => println!("{}", style_line(&line)),
                Ok(None) => {
                    eprintln!("SERVER DISCONNECTED");
                    std::process::exit(0);
                }
                Err(e) => {
                    eprintln!("Connection error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    });

    println!("type :help for a list of all commands, or just type a message");
    while let Some(line) = input.read_line()? {
        if line.is_empty() {
            continue;
        }
        let lowered = line.to_lowercase();
        if lowered.starts_with(":quit") {
            break;
        } else if lowered.starts_with(":help") {
            println!("{}", HELP);
        } else if lowered.starts_with(":changepassword") {
            print!("New password: ");
            std::io::stdout().flush()?;
            if let Some(password) = input.read_password()? {
                runtime.block_on(sender.change_password(&password))?;
            }
        } else {
            runtime.block_on(sender.send(&line))?;
        }
    }

    Ok(())
}
