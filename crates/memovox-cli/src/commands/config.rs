//! `memovox config` — show or change persisted settings.
//!
//! The API key is intentionally not configurable here: it is supplied via
//! the environment or an interactive prompt and never written to disk.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use memovox_core::Settings;

#[derive(Args)]
pub struct ConfigArgs {
    /// Set the transcription endpoint
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Set the microphone device name (empty string resets to default)
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// Set the language hint (empty string clears it)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Enable or disable automatic clipboard copy
    #[arg(long, value_name = "BOOL")]
    pub copy: Option<bool>,

    /// Print the current configuration
    #[arg(long)]
    pub show: bool,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    let mut settings = Settings::load();
    let mut changed = false;

    if let Some(endpoint) = args.endpoint {
        settings.endpoint = endpoint;
        changed = true;
    }
    if let Some(device) = args.device {
        settings.device = (!device.is_empty()).then_some(device);
        changed = true;
    }
    if let Some(language) = args.language {
        settings.language = (!language.is_empty()).then_some(language);
        changed = true;
    }
    if let Some(copy) = args.copy {
        settings.copy_to_clipboard = copy;
        changed = true;
    }

    if changed {
        settings.save().context("Failed to save settings")?;
        println!("Settings saved.");
    }

    if args.show || !changed {
        println!("endpoint:          {}", settings.endpoint());
        println!(
            "device:            {}",
            settings.device.as_deref().unwrap_or("(system default)")
        );
        println!(
            "language:          {}",
            settings.language.as_deref().unwrap_or("(auto)")
        );
        println!("copy to clipboard: {}", settings.copy_to_clipboard);
        println!();
        println!(
            "{}",
            style("API key comes from MEMOVOX_API_KEY (or a prompt) and is never stored.").dim()
        );
    }
    Ok(())
}
