// ABOUTME: CLI entrypoint for pocket2notion
// ABOUTME: Sets up logging, wires credentials and clients, maps errors to exit codes

use clap::Parser;
use pocket2notion::{
    api::PocketClient,
    auth::{
        obtain_credential, present_authorization_url, resolve_consumer_key, resolve_notion_token,
        TokenAcquirer,
    },
    cli::Cli,
    clipper::Clipper,
    storage::{CredentialStore, Paths},
    sync, Result,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("pocket2notion: [E{}] {}", e.exit_code(), e);
        std::process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pocket2notion={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    // Before any credential lookup or network call
    let block_id = cli.destination_block()?;

    let paths = Paths::new(cli.config_dir.clone())?;
    paths.ensure_dirs()?;

    let consumer_key = resolve_consumer_key(cli.consumer_key.clone(), &paths)?;
    let client = PocketClient::new(consumer_key.clone(), Some(cli.pocket_base.clone()))?;

    let store = CredentialStore::new(paths.token_path());
    let credential = obtain_credential(&store, &consumer_key, || {
        let open_browser = cli.open_browser;
        TokenAcquirer::new(&client)
            .with_timeout(Duration::from_secs(cli.auth_timeout))
            .with_presenter(move |url| present_authorization_url(url, open_browser))
            .acquire()
    })?;
    let client = client.with_access_token(credential.access_token);

    let filter = cli.filter();
    let options = cli.sync_options();

    let Some(block_id) = block_id else {
        sync::list(&client, &filter, &options)?;
        return Ok(());
    };

    let token = resolve_notion_token(cli.notion_token.clone(), &paths)?;
    let mut clipper = Clipper::new(token, Some(cli.notion_base.clone()))?;

    sync::run(&client, &mut clipper, &filter, &block_id, &options)?;
    Ok(())
}
