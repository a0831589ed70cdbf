use std::path::Path;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "ocr-reconcile",
    version,
    about = "Reconcile layout and read OCR results into fitted text regions"
)]
struct Cli {
    /// Saved layout analysis result (JSON)
    #[arg(long = "layout")]
    layout: Option<String>,

    /// Saved read analysis result (JSON)
    #[arg(long = "read")]
    read: Option<String>,

    /// Document to analyze (image or pdf)
    #[arg(short = 'd', long = "data")]
    data: Option<String>,

    /// API key (overrides DOCUMENT_INTELLIGENCE_KEY)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Analysis service endpoint (overrides settings and DOCUMENT_INTELLIGENCE_ENDPOINT)
    #[arg(long = "endpoint")]
    endpoint: Option<String>,

    /// Include fitted font sizes and wrapped lines in the output
    #[arg(long = "fit")]
    fit: bool,

    /// Write the text overlay for the first page to this image path
    #[arg(long = "render")]
    render: Option<String>,

    /// Write region outlines for the first page to this image path
    #[arg(long = "debug-bbox")]
    debug_bbox: Option<String>,

    /// Run as an HTTP server on this address (e.g. 127.0.0.1:8080)
    #[arg(long = "server")]
    server: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ocr_reconcile::logging::init(cli.verbose)?;

    if let Some(addr) = cli.server {
        let settings_path = cli.read_settings.as_deref().map(Path::new);
        let settings = ocr_reconcile::settings::load_settings(settings_path)?;
        return ocr_reconcile::server::run_server(settings, addr).await;
    }

    let config = ocr_reconcile::Config {
        layout_path: cli.layout,
        read_path: cli.read,
        data_path: cli.data,
        key: cli.key,
        endpoint: cli.endpoint,
        fit: cli.fit,
        render_path: cli.render,
        debug_bbox_path: cli.debug_bbox,
        settings_path: cli.read_settings,
    };
    let output = ocr_reconcile::run(config).await?;
    println!("{}", output);
    Ok(())
}
