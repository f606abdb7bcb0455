use anyhow::Result;
use cover_accent::{start_dominant_color_worker, AccentRequest, Config, DominantColorPipeline};
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    let locators: Vec<String> = std::env::args().skip(1).collect();
    if locators.is_empty() {
        eprintln!("usage: cover-accent <url-or-path>...");
        std::process::exit(2);
    }

    let config = Config::load_or_default()?;
    let debounce = Duration::from_millis(config.debounce_ms);
    let pipeline = DominantColorPipeline::from_config(&config);
    let (tx, rx) = start_dominant_color_worker(pipeline, debounce);

    for (key, locator) in locators.iter().enumerate() {
        tx.send(AccentRequest {
            key: key as u64,
            locator: locator.clone(),
        })?;
    }
    drop(tx);

    let multiple = locators.len() > 1;
    for res in rx {
        let line = match res.color {
            Some(c) => format!("color={} on_color={}", c.color, c.on_color),
            None => "none".to_string(),
        };
        if multiple {
            println!("{}: {line}", res.locator);
        } else {
            println!("{line}");
        }
    }

    Ok(())
}
