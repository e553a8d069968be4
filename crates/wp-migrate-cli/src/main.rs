//! wp-migrator - copy published WordPress posts between sites.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use wp_migrate::{
    ClientConfig, MigrationError, MigrationOptions, MigrationProgress, ProgressUpdate,
    SiteEndpoint, WordPressMigrator, WpClient,
};

mod logging;

/// Copy published posts and their featured images from one WordPress site
/// to another
#[derive(Parser, Debug)]
#[command(name = "wp-migrator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Source site URL
    #[arg(long, env = "WP_SOURCE_URL")]
    source_url: String,

    /// Destination site URL
    #[arg(long, env = "WP_DEST_URL")]
    dest_url: String,

    /// Source site username
    #[arg(long, env = "WP_SOURCE_USER")]
    source_user: String,

    /// Source site password
    #[arg(long, env = "WP_SOURCE_PASS", hide_env_values = true)]
    source_pass: String,

    /// Destination site username
    #[arg(long, env = "WP_DEST_USER")]
    dest_user: String,

    /// Destination site password
    #[arg(long, env = "WP_DEST_PASS", hide_env_values = true)]
    dest_pass: String,

    /// Posts requested per page
    #[arg(long, default_value_t = 5)]
    per_page: u32,

    /// Seconds to wait between page requests
    #[arg(long, default_value_t = 2)]
    page_delay: u64,

    /// Timeout in seconds for listing and creating content
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Log file, appended to on every run
    #[arg(long, default_value = "wordpress_migration.log")]
    log_file: PathBuf,

    /// Increase console verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> MigrationOptions {
        MigrationOptions::default()
            .with_per_page(self.per_page)
            .with_page_delay(Duration::from_secs(self.page_delay))
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig::default().with_request_timeout(Duration::from_secs(self.timeout))
    }

    fn endpoints(&self) -> anyhow::Result<(SiteEndpoint, SiteEndpoint)> {
        let source = SiteEndpoint::new(&self.source_url, &self.source_user, &self.source_pass)
            .context("invalid source site")?;
        let destination = SiteEndpoint::new(&self.dest_url, &self.dest_user, &self.dest_pass)
            .context("invalid destination site")?;
        Ok((source, destination))
    }
}

/// Phase changes go to the log at info, per-post steps at debug.
fn log_progress(update: ProgressUpdate) {
    match update.current_item {
        None => tracing::info!(total = update.total, "{}", update.phase),
        Some(item) => tracing::debug!("[{}/{}] {item}", update.completed, update.total),
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let (source, destination) = cli.endpoints()?;
    let client = WpClient::new(cli.client_config())?;
    let progress = MigrationProgress::with_callback(Box::new(log_progress));

    let report = WordPressMigrator::new(client, source, destination, cli.options())
        .with_progress(progress)
        .run()
        .await?;

    report.print_summary();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, &cli.log_file) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    if let Err(e) = run(&cli).await {
        let credentials_rejected = e
            .downcast_ref::<MigrationError>()
            .is_some_and(MigrationError::is_credentials_failure);

        tracing::error!("Migration aborted: {e:#}");
        if credentials_rejected {
            eprintln!("\nAuthentication error: the source site rejected the supplied password.");
            eprintln!("Please check the username and password provided.");
        }
        eprintln!("\nError during migration: {e:#}");
        std::process::exit(1);
    }
}
