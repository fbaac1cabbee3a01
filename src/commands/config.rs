use crate::core::{validation, Config, CrawlSettings, JitterRange};
use crate::ui;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

/// Key that sets the default output directory instead of a crawl setting
const OUTPUT_KEY: &str = "output";

pub fn execute(matches: &clap::ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => show(),
        Some(("set", sub_matches)) => set(sub_matches),
        Some(("reset", sub_matches)) => reset(sub_matches.get_flag("yes")),
        _ => {
            println!("Use 'drivecrawl config --help' for more information.");
            Ok(())
        }
    }
}

fn show() -> Result<()> {
    let config = Config::load()?;
    let path = Config::get_config_path()?;

    println!("{} {}", "Archivo de configuración:".white(), path.display().to_string().dimmed());
    println!();

    match config.get_output_path() {
        Some(out) => println!("  {:<24} {}", OUTPUT_KEY, out.cyan().bold()),
        None => println!(
            "  {:<24} {}",
            OUTPUT_KEY,
            format!("(sin definir, se usa ./{})", "downloads").dimmed()
        ),
    }

    for (key, value) in setting_rows(&config.settings) {
        println!("  {:<24} {}", key, value.cyan());
    }

    println!();
    println!("{}", "Para cambiar un valor:".dimmed());
    println!("  {}", "drivecrawl config set <clave> <valor>".dimmed());
    Ok(())
}

fn set(matches: &clap::ArgMatches) -> Result<()> {
    let key = matches
        .get_one::<String>("key")
        .context("Key argument is required")?;
    let value = matches
        .get_one::<String>("value")
        .context("Value argument is required")?;

    let mut config = Config::load()?;

    if key == OUTPUT_KEY {
        set_output_path(&mut config, value)?;
    } else {
        config.settings.set_value(key, value)?;
        println!("{} {} = {}", "✓".green(), key, value.cyan().bold());
    }

    config.save()
}

fn set_output_path(config: &mut Config, path: &str) -> Result<()> {
    validation::validate_directory_path(path)?;

    let path_buf = Path::new(path);
    let stored = if path_buf.exists() {
        path_buf
            .canonicalize()
            .map_err(|e| anyhow::anyhow!("Failed to resolve path: {}", e))?
            .to_string_lossy()
            .to_string()
    } else {
        ui::warn(&format!("La ruta '{}' no existe todavía; se creará al rastrear", path));
        path.to_string()
    };

    // Windows verbatim prefix is noise in the config file
    let stored = stored
        .strip_prefix("\\\\?\\")
        .map(str::to_string)
        .unwrap_or(stored);

    println!("{} {}", "✓ Carpeta de destino:".green(), stored);
    config.set_output_path(stored);
    Ok(())
}

fn reset(skip_confirm: bool) -> Result<()> {
    if !skip_confirm && !ui::confirm("¿Restablecer toda la configuración? [s/N]")? {
        ui::dimmed("Sin cambios");
        return Ok(());
    }

    Config::default().save()?;
    ui::success("✓ Configuración restablecida");
    Ok(())
}

/// Settings as `(key, value)` pairs, in the same spelling `config set` accepts
pub fn setting_rows(settings: &CrawlSettings) -> Vec<(&'static str, String)> {
    fn range(r: &JitterRange) -> String {
        if r.min_ms % 1000 == 0 && r.max_ms % 1000 == 0 {
            format!("{}-{}", r.min_ms / 1000, r.max_ms / 1000)
        } else {
            format!("{}-{} ms", r.min_ms, r.max_ms)
        }
    }

    vec![
        ("max-attempts", settings.max_attempts.to_string()),
        ("pre-download-wait", range(&settings.pre_download_wait)),
        ("retry-backoff", range(&settings.retry_backoff)),
        ("download-timeout", settings.download_timeout_secs.to_string()),
        ("navigation-timeout", settings.navigation_timeout_secs.to_string()),
        ("control-poll-attempts", settings.control_poll_attempts.to_string()),
        ("control-poll-interval", settings.control_poll_interval_ms.to_string()),
        ("post-click-wait", settings.post_click_wait_ms.to_string()),
        ("settle-stable", settings.settle_stable_ms.to_string()),
        ("settle-interval", settings.settle_interval_ms.to_string()),
        ("settle-max-rounds", settings.settle_max_rounds.to_string()),
        ("folder-prefixes", settings.folder_prefixes.join(",")),
        ("file-prefixes", settings.file_prefixes.join(",")),
        ("download-labels", settings.download_labels.join(",")),
        ("error-selector", settings.error_selector.clone()),
        ("skip-existing", settings.skip_existing.to_string()),
    ]
}
