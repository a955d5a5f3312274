//! Init command implementation

use colored::Colorize;
use dialoguer::{Input, Password, theme::ColorfulTheme};

use crate::cli::args::GlobalOptions;
use crate::config::Config;
use crate::error::Result;

/// Run the init command
///
/// Values not given on the command line are prompted for. Existing settings
/// in the config file, including the cache section, are preserved.
pub fn run(opts: &GlobalOptions, token: Option<String>) -> Result<()> {
    let path = Config::resolve_path(opts.config_ref())?;
    let mut config = Config::load_or_default(&path)?;

    println!("{}", "Welcome to stockcache!".bold().green());
    println!("Let's set up your API connection.\n");

    let theme = ColorfulTheme::default();
    let api_url = match opts.api_url.clone() {
        Some(url) => url,
        None => {
            let mut prompt = Input::<String>::with_theme(&theme).with_prompt("API base URL");
            if let Some(ref current) = config.api_url {
                prompt = prompt.default(current.clone());
            }
            prompt.interact_text()?
        }
    };

    let api_token = match token {
        Some(token) => token,
        None => Password::with_theme(&theme)
            .with_prompt("API token")
            .interact()?,
    };

    apply(&mut config, api_url, api_token, opts.tenant.clone());
    config.validate()?;
    config.save_at(&path)?;

    println!(
        "\n{} Configuration saved to: {}",
        "✓".green(),
        path.display()
    );
    if let Some(ref tenant) = config.tenant_id {
        println!("  Tenant: {}", tenant.bold());
    }

    println!("\n{}", "You're all set! Try running:".bold());
    println!("  {} - Show configuration status", "stockcache status".cyan());
    println!("  {} - List batches", "stockcache get batches".cyan());

    Ok(())
}

fn apply(config: &mut Config, api_url: String, api_token: String, tenant: Option<String>) {
    config.api_url = Some(api_url.trim_end_matches('/').to_string());
    config.api_token = Some(api_token).filter(|t| !t.is_empty());
    if tenant.is_some() {
        config.tenant_id = tenant;
    }
}
