//! msigflow CLI Application
//!
//! Create, sign and broadcast multisig spends passed around as tokens.

use clap::{Parser, Subcommand};
use multisig_flow::api::{create_router, ApiState};
use multisig_flow::cli::{self, read_token};
use multisig_flow::config::Config;
use multisig_flow::core::Amount;
use multisig_flow::exchange::MultisigCoordinator;
use multisig_flow::node::{NodeBackend, RpcNode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "msigflow")]
#[command(version = "0.1.0")]
#[command(about = "Multisig spends passed between signers as opaque tokens", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(short, long, env = "MSIGFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Wallet node JSON-RPC endpoint (overrides the config file)
    #[arg(long)]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an unsigned spend and print its token
    Create {
        /// Paying multisig address or account
        #[arg(short, long)]
        from: String,

        /// Destination address
        #[arg(short, long)]
        to: String,

        /// Amount in coins, e.g. 1.5
        #[arg(short, long)]
        amount: Amount,

        /// Fee in coins
        #[arg(long)]
        fee: Amount,

        /// Minimum confirmations of the spent outputs
        #[arg(long)]
        min_conf: Option<u32>,

        /// Only show the coin selection
        #[arg(long)]
        dry_run: bool,
    },

    /// Add this node's signatures to a token
    Sign {
        /// Token (read from stdin when omitted)
        #[arg(short, long)]
        token: Option<String>,

        /// Use at most this many keys
        #[arg(long)]
        max_signers: Option<usize>,
    },

    /// Broadcast a fully signed token
    Send {
        /// Token (read from stdin when omitted)
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Sign, then broadcast if the token became complete
    SignAndSend {
        /// Token (read from stdin when omitted)
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Show the content of a token
    Decode {
        /// Token (read from stdin when omitted)
        #[arg(short, long)]
        token: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List unspent outputs of a multisig address or account
    Unspent { identifier: String },

    /// Show the multisig address and participants behind an identifier
    Resolve { identifier: String },

    /// REST API server
    Api {
        #[command(subcommand)]
        action: ApiCommands,
    },

    /// Run a 2-of-3 walkthrough on a simulated ledger
    Demo,
}

#[derive(Subcommand)]
enum ApiCommands {
    /// Start the REST API server
    Start {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

type SharedCoordinator = MultisigCoordinator<Box<dyn NodeBackend>>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(url) = cli.rpc_url {
        config.rpc.url = url;
        config.validate()?;
    }

    // The demo runs on its own simulated ledger
    if let Commands::Demo = cli.command {
        return cli::cmd_demo(&config.token_key);
    }

    let node: Box<dyn NodeBackend> = Box::new(RpcNode::new(&config.rpc)?);
    let coordinator = MultisigCoordinator::from_config(node, &config);

    match cli.command {
        Commands::Create {
            from,
            to,
            amount,
            fee,
            min_conf,
            dry_run,
        } => cli::cmd_create(&coordinator, &from, &to, amount, fee, min_conf, dry_run),
        Commands::Sign { token, max_signers } => {
            cli::cmd_sign(&coordinator, &read_token(token)?, max_signers)
        }
        Commands::Send { token } => cli::cmd_send(&coordinator, &read_token(token)?),
        Commands::SignAndSend { token } => {
            cli::cmd_sign_and_send(&coordinator, &read_token(token)?)
        }
        Commands::Decode { token, json } => {
            cli::cmd_decode(&coordinator, &read_token(token)?, json)
        }
        Commands::Unspent { identifier } => cli::cmd_unspent(&coordinator, &identifier),
        Commands::Resolve { identifier } => cli::cmd_resolve(&coordinator, &identifier),
        Commands::Api { action } => run_api_command(action, coordinator, &config),
        Commands::Demo => Ok(()),
    }
}

fn run_api_command(
    action: ApiCommands,
    coordinator: SharedCoordinator,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    // Last handle is dropped after the runtime returns: the blocking RPC
    // client must not be dropped inside async code
    let state = ApiState::new(coordinator);
    let server_state = state.clone();

    rt.block_on(async move {
        match action {
            ApiCommands::Start { port } => {
                let port = port.unwrap_or(config.api_port);
                let app = create_router(server_state);

                let addr = format!("0.0.0.0:{}", port);
                println!("🚀 REST API server starting on http://localhost:{}", port);
                println!("   Wallet node: {}", config.rpc.url);

                println!();
                println!("📖 Available endpoints:");
                println!("   GET  /health                              - Health check");
                println!("   POST /api/multisig/transactions           - Create spend");
                println!("   POST /api/multisig/transactions/preview   - Coin selection");
                println!("   POST /api/multisig/sign                   - Sign token");
                println!("   POST /api/multisig/send                   - Broadcast token");
                println!("   POST /api/multisig/sign-and-send          - Sign and broadcast");
                println!("   POST /api/multisig/decode                 - Decode token");
                println!("   GET  /api/multisig/{{id}}                   - Resolve address");
                println!("   GET  /api/multisig/{{id}}/unspent           - Unspent outputs");
                println!();

                let listener = tokio::net::TcpListener::bind(&addr).await?;
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        tokio::signal::ctrl_c().await.ok();
                        println!("\n📴 Shutting down API server...");
                    })
                    .await?;
            }
        }

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    drop(rt);
    drop(state);
    Ok(())
}
