use std::path::PathBuf;

use tracing::info;

use slidecrawl::{crawl, load_config};

fn parse_flag(name: &str) -> Option<String> {
    let mut args = std::env::args().peekable();
    let eq_prefix = format!("{}=", name);
    while let Some(a) = args.next() {
        if a == name {
            if let Some(v) = args.next() {
                return Some(v);
            }
        } else if let Some(rest) = a.strip_prefix(&eq_prefix) {
            return Some(rest.to_string());
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config_path = parse_flag("--config").map(PathBuf::from);
    let mut cfg = load_config(config_path.as_deref());
    if let Some(urls) = parse_flag("--urls") {
        cfg.url_file = PathBuf::from(urls);
    }
    if let Some(out) = parse_flag("--out") {
        cfg.data_file = PathBuf::from(out);
    }

    info!(
        "slidecrawl starting: urls={} table={}",
        cfg.url_file.display(),
        cfg.data_file.display()
    );

    let summary = crawl::run(cfg).await?;

    if !summary.failed.is_empty() {
        info!("Failed sequence numbers: {:?}", summary.failed);
    }
    if summary.interrupted {
        std::process::exit(130);
    }
    Ok(())
}
