//! Token Guard CLI
//!
//! Usage:
//!   token_guard <TOKEN_ADDRESS> [CHAIN]
//!
//! CHAIN defaults to `eth`. Endpoints come from the environment
//! (`ETH_HTTP_URL`, `ALCHEMY_API_KEY`, `ETHERSCAN_API_KEY`, ...).

use token_guard::{ChainId, GuardConfig, SecurityAnalyzer};

use eyre::{eyre, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let mut args = std::env::args().skip(1);
    let Some(address) = args.next() else {
        eprintln!("Usage: token_guard <TOKEN_ADDRESS> [CHAIN]");
        eprintln!("   CHAIN: eth | bsc | polygon | arbitrum | optimism | avalanche | base | <chain id>");
        return Err(eyre!("missing token address"));
    };
    let chain_arg = args.next().unwrap_or_else(|| "eth".to_string());

    let chain: ChainId = match chain_arg.parse() {
        Ok(chain) => chain,
        Err(e) => {
            eprintln!("❌ {}", e.user_message());
            return Err(eyre!("{}", e));
        }
    };

    let config = GuardConfig::from_env().map_err(|e| eyre!("{}", e))?;
    if config.endpoints.is_empty() {
        eprintln!("⚠️  No chain configured. Set ETH_HTTP_URL or ALCHEMY_API_KEY.");
    }

    let analyzer = SecurityAnalyzer::new(&config).map_err(|e| eyre!("{}", e))?;

    tokio::select! {
        result = analyzer.analyze_token(&address, chain) => match result {
            Ok(report) => {
                println!("{}", report.summary());
                Ok(())
            }
            Err(e) => {
                eprintln!("❌ {}", e.user_message());
                Err(eyre!("{}", e))
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n🛑 Interrupted");
            Ok(())
        }
    }
}
