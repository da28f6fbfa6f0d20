use std::error::Error;

use pagefetch::{HttpFetcher, PagefetchConfig, PendingPage};
use tracing_subscriber::EnvFilter;

// Usage: pagefetch <url> [config.yaml]
fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("usage: pagefetch <url> [config.yaml]");
        std::process::exit(2);
    };

    let mut config = match args.next() {
        Some(path) => PagefetchConfig::from_file(path)?,
        None => PagefetchConfig::default(),
    };
    config.apply_env_overrides()?;

    let fetch_cfg = config.fetch_config()?;
    let fetcher = HttpFetcher::new(&config.http)?;
    let pending = PendingPage::parse(url, &fetch_cfg)?;
    let page_id = pending.url().page_id(&fetch_cfg.page_id_namespace);
    let page = fetcher.fetch(pending, &fetch_cfg)?;

    let summary = serde_json::json!({
        "url": page.url().as_str(),
        "page_id": page_id,
        "status": page.status(),
        "content_type": page.content_type(),
        "content_encoding": page.content_encoding(),
        "content_charset": page.content_charset(),
        "body_bytes": page.content_bytes().len(),
        "headers": page.response_headers(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if std::env::var_os("PAGEFETCH_LOG_JSON").is_some() {
        builder.json().init();
    } else {
        builder.init();
    }
}
