//! cf-contexts - list authentication contexts
//!
//! Reads the context file (`--config <path>`, `$CFCONFIG` or `$HOME/.cfconfig`)
//! and prints every context with its URL and active account. Pass
//! `--offline` to skip the identity lookups.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use codefresh_sdk::auth::{current_account, AccountInfo};
use codefresh_sdk::{defaults, ContextStore};
use futures::future::join_all;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cf-contexts", version, about = "List authentication contexts")]
struct Args {
    /// Context file to read
    #[arg(long, env = "CFCONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Skip the active account lookups
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codefresh_sdk=info,cf_contexts=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let path = args.config.unwrap_or_else(defaults::config_path);

    let store = Arc::new(ContextStore::default());
    store.load_config(Some(path.as_path()), false).await?;
    info!("Loaded {} contexts from {}", store.get_all_contexts().len(), path.display());

    let contexts = store.get_all_contexts();
    let accounts = if args.offline {
        vec![None; contexts.len()]
    } else {
        let lookups = contexts.iter().map(|context| {
            let transport = store.transport();
            async move {
                if context.is_no_auth() {
                    return None;
                }
                match current_account(context, transport).await {
                    Ok(info) => Some(info),
                    Err(e) => {
                        warn!("Could not get account of context {}: {}", context.name, e);
                        None
                    }
                }
            }
        });
        join_all(lookups).await
    };

    println!("{:<3}{:<24}{:<40}ACCOUNT", "", "NAME", "URL");
    for (context, account) in contexts.iter().zip(accounts) {
        let marker = if context.current { "*" } else { "" };
        let account = account
            .and_then(|AccountInfo { name, .. }| name)
            .unwrap_or_else(|| "-".to_string());
        println!("{:<3}{:<24}{:<40}{}", marker, context.name, context.url, account);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_args_accept_both_config_forms() {
        let args = Args::try_parse_from(["cf-contexts", "--config=/tmp/a.cfconfig", "--offline"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/a.cfconfig")));
        assert!(args.offline);

        let args = Args::try_parse_from(["cf-contexts", "--config", "/tmp/b.cfconfig"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/b.cfconfig")));
        assert!(!args.offline);
    }

    #[test]
    fn test_args_reject_unknown_flags() {
        assert!(Args::try_parse_from(["cf-contexts", "--verbose"]).is_err());
    }
}
