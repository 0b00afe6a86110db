//  MAIN.rs
//    by Lut99
//
//  Created:
//    17 Apr 2024, 09:41:17
//  Last edited:
//    07 May 2024, 12:06:55
//  Auto updated?
//    Yes
//
//  Description:
//!   Entrypoint to the main `policy-vault` binary.
//

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use error_trace::ErrorTrace as _;
use generator::HttpGenerator;
use humanlog::{DebugMode, HumanLogger};
use lifecycle::Lifecycle;
use log::{error, info};
use policy_vault::sqlite::SqlitePolicyStore;
use render::HttpPdfRenderer;
use srv::Srv;


/***** ARGUMENTS *****/
/// Defines the arguments for the `policy-vault` server.
#[derive(Debug, Parser)]
struct Arguments {
    /// Whether to enable full debugging
    #[clap(long, global = true, help = "If given, enables more verbose debugging.")]
    trace: bool,

    /// The address on which to bind ourselves.
    #[clap(short, long, env, default_value = "127.0.0.1:4180", help = "The address on which to bind the server.")]
    address: SocketAddr,

    /// Where the policy database lives.
    #[clap(long, env = "DATABASE_URL", default_value = "./data/policy-vault.db", help = "Path to the SQLite policy database.")]
    database_url: String,

    /// The external text-generation service.
    #[clap(long, env = "GENERATOR_URL", help = "The URL of the external policy text generator.")]
    generator_url: String,

    /// How long one generation round trip may take.
    #[clap(long, env = "GENERATOR_TIMEOUT", default_value = "100", help = "Timeout, in seconds, for the text generator.")]
    generator_timeout: u64,

    /// The external HTML-to-PDF converter.
    #[clap(long, env = "RENDERER_URL", help = "The URL of the HTML-to-PDF converter used for downloads.")]
    renderer_url: String,

    /// The logo stamped in the "powered by" corner of exported PDFs.
    #[clap(long, env = "PARENT_LOGO_URL", default_value = "", help = "URL of the parent logo embedded in exported PDFs.")]
    parent_logo_url: String,
}


/***** ENTRYPOINT *****/
#[tokio::main]
async fn main() {
    // Load the .env before clap reads the environment
    let _ = dotenvy::dotenv();

    // Parse arguments
    let args = Arguments::parse();

    // Setup a logger
    if let Err(err) = HumanLogger::terminal(if args.trace { DebugMode::Full } else { DebugMode::Debug }).init() {
        eprintln!("WARNING: Failed to setup logger: {err} (no logging for this session)");
    }
    info!("{} - v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let store = match SqlitePolicyStore::new(&args.database_url) {
        Ok(store) => store,
        Err(err) => {
            error!("{}", err.trace());
            std::process::exit(1);
        },
    };
    let generator = match HttpGenerator::new(args.generator_url, Duration::from_secs(args.generator_timeout)) {
        Ok(generator) => generator,
        Err(err) => {
            error!("{}", err.trace());
            std::process::exit(1);
        },
    };
    let renderer = HttpPdfRenderer::new(args.renderer_url);

    let lifecycle = Lifecycle::new(Arc::new(store), Arc::new(generator), Arc::new(renderer), args.parent_logo_url);
    let server = Srv::new(args.address, lifecycle);

    server.run().await;
}
