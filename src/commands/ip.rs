//! Public-IP discovery via an external HTTP service.

use anyhow::{Context, Result};
use clap::Args;

use super::CommandExecutor;

const IP_SERVICE: &str = "http://checkip.amazonaws.com";

/// Print this machine's public IP address.
///
/// Informational only: the profile's advertised address is never changed.
/// What a NAT shows the world and what a peer can actually reach may differ.
#[derive(Args, Debug)]
pub struct IpCommand {}

impl CommandExecutor for IpCommand {
    fn execute(&self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("starting runtime")?;
        let ip = runtime.block_on(public_ip())?;
        println!("{ip}");
        Ok(())
    }
}

/// Ask the discovery service for our public address.
pub(crate) async fn public_ip() -> Result<String> {
    let body = reqwest::get(IP_SERVICE)
        .await
        .and_then(|response| response.error_for_status())
        .with_context(|| format!("querying {IP_SERVICE}"))?
        .text()
        .await
        .context("reading discovery response")?;
    Ok(body.trim().to_string())
}
