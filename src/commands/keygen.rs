//! Key generation command: long-term identity and profile creation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use parley::crypto::signing;
use parley::profile::{write_profile, Profile};

use super::CommandExecutor;

/// Generate a long-term ed25519 signing key pair and a matching profile.
///
/// Writes `identity.key.json` (private; keep it to yourself) and
/// `profile.json` (public; hand it to your peers).
#[derive(Args, Debug)]
pub struct KeygenCommand {
    /// Display name. May contain spaces
    #[arg(long)]
    pub name: String,

    /// Address to advertise (IPv4, bracketed IPv6, or DNS)
    #[arg(long, default_value = "127.0.0.1")]
    pub address: String,

    /// UDP port to listen on
    #[arg(long, default_value_t = 5190)]
    pub port: u16,

    /// Directory for the generated files
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

impl CommandExecutor for KeygenCommand {
    fn execute(&self) -> Result<()> {
        let key = signing::generate();
        let profile = Profile {
            name: self.name.clone(),
            address: self.address.clone(),
            port: self.port.to_string(),
            public_signing_key: key.verifying_key().to_bytes(),
        };

        let key_path = self.out_dir.join("identity.key.json");
        let profile_path = self.out_dir.join("profile.json");
        signing::write_private_key(&key, &key_path)
            .with_context(|| format!("writing {}", key_path.display()))?;
        write_profile(&profile, &profile_path)
            .with_context(|| format!("writing {}", profile_path.display()))?;

        println!("wrote {}", key_path.display());
        println!("wrote {}", profile_path.display());
        println!("profile: {profile}");
        println!(
            "fingerprint: {}",
            hex::encode(&profile.public_signing_key[..8])
        );
        Ok(())
    }
}
