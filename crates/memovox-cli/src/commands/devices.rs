//! `memovox devices` — list microphone devices.

use anyhow::Result;
use console::style;
use memovox_core::list_input_devices;

pub fn run() -> Result<()> {
    for device in list_input_devices()? {
        if device.is_default {
            println!("{} {}", style("*").green(), device.name);
        } else {
            println!("  {}", device.name);
        }
    }
    println!();
    println!("{}", style("* = system default").dim());
    Ok(())
}
