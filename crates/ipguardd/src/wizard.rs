//! `ipguardd init`: interactive configuration generator
//!
//! Walks through the global settings, then each account and each of its
//! servers, and writes the resulting JSON document. Answering `n` to any
//! question stores `PLACEHOLDER` so the value can be filled in by hand later.

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use ipguard_core::config::{
    AccountConfig, GlobalConfig, MonitorConfig, PLACEHOLDER, ServerConfig,
};
use std::path::{Path, PathBuf};

const DEFAULT_ROUND_TIME: u64 = 600;
const DEFAULT_CHECK_URL: &str = "http://your-check-server.com/check";
const DEFAULT_PORT: u16 = 443;

/// Source of answers
pub trait Prompter {
    /// Ask for a line of text; `default` is returned on empty input
    fn ask(&mut self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Ask a yes/no question
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;
}

/// Prompts on the controlling terminal
#[derive(Default)]
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        Ok(input.interact_text()?)
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }
}

/// Run the wizard on the terminal and write the result
///
/// Returns the path actually written.
pub fn run(output: &Path) -> Result<PathBuf> {
    println!("ipguard configuration wizard");
    println!("Answer 'n' to anything you are unsure about and edit the file later.");
    println!("{}", "-".repeat(50));

    let mut prompter = TerminalPrompter::default();
    let config = build_config(&mut prompter)?;

    let chosen = choose_output(&mut prompter, output)?;
    let overwrite = chosen.exists()
        && prompter.confirm(
            &format!("{} already exists. Overwrite?", chosen.display()),
            false,
        )?;
    let path = output_path(&chosen, overwrite);

    config.write_to(&path)?;
    println!("\nConfiguration saved to {}", path.display());
    println!("Fill in any PLACEHOLDER values before starting the daemon.");
    println!("{}", "-".repeat(50));
    println!("{}", serde_json::to_string_pretty(&config)?);
    println!("{}", "-".repeat(50));

    Ok(path)
}

/// Collect a full configuration document
pub fn build_config(prompter: &mut impl Prompter) -> Result<MonitorConfig> {
    let round_time = ask(prompter, "Check interval (seconds)", Some("600"))?;
    let round_time = parse_or(&round_time, DEFAULT_ROUND_TIME, "check interval");

    let check_server_url = ask(prompter, "Check service URL", Some(DEFAULT_CHECK_URL))?;
    let proxy = ask(prompter, "Proxy URL (leave empty for none)", None)?;
    let history_dir = ask(prompter, "Directory for address history files", Some("."))?;

    let account_count = ask(prompter, "How many OCI accounts to monitor?", Some("1"))?;
    let account_count = parse_count(&account_count);

    let mut accounts = Vec::with_capacity(account_count);
    for n in 1..=account_count {
        println!("\n--- Account {} ---", n);
        accounts.push(build_account(prompter, n)?);
    }

    Ok(MonitorConfig {
        global: GlobalConfig {
            round_time,
            check_server_url,
            proxy,
            history_dir,
        },
        accounts,
    })
}

fn build_account(prompter: &mut impl Prompter, n: usize) -> Result<AccountConfig> {
    let default_name = format!("oracle-account{}", n);
    let name = ask(prompter, &format!("Account {} name", n), Some(&default_name))?;

    let default_path = if n == 1 {
        "~/.oci/config".to_string()
    } else {
        format!("~/.oci/config{}", n)
    };
    let oci_config_path = ask(prompter, "OCI config file path", Some(&default_path))?;
    let oci_profile = ask(prompter, "OCI config profile", Some("DEFAULT"))?;

    let server_count = ask(
        prompter,
        &format!("How many instances to monitor in account {}?", n),
        Some("1"),
    )?;
    let server_count = parse_count(&server_count);

    let mut servers = Vec::with_capacity(server_count);
    for s in 1..=server_count {
        println!("\n--- Account {} instance {} ---", n, s);
        servers.push(ServerConfig {
            compartment_id: ask(prompter, "Compartment OCID of the instance", None)?,
            instance_id: ask(prompter, "Instance OCID", None)?,
            vnic_id: ask(prompter, "VNIC OCID (leave empty to look it up)", None)?,
            port: parse_or(
                &ask(prompter, "Port to monitor", Some("443"))?,
                DEFAULT_PORT,
                "port",
            ),
        });
    }

    Ok(AccountConfig {
        name,
        oci_config_path,
        oci_profile,
        provider: "oci".to_string(),
        servers,
    })
}

/// Ask, mapping `n`/`N` to [`PLACEHOLDER`]
fn ask(prompter: &mut impl Prompter, prompt: &str, default: Option<&str>) -> Result<String> {
    let answer = prompter.ask(prompt, default)?;
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("n") {
        return Ok(PLACEHOLDER.to_string());
    }
    if answer.is_empty() {
        return Ok(default.unwrap_or_default().to_string());
    }
    Ok(answer.to_string())
}

fn parse_count(answer: &str) -> usize {
    match answer.parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            println!("Invalid number '{}', using 1", answer);
            1
        }
    }
}

fn parse_or<T>(answer: &str, default: T, what: &str) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    answer.parse().unwrap_or_else(|_| {
        println!("Invalid {} '{}', using {}", what, answer, default);
        default
    })
}

/// Ask for the file name, defaulting to `default`
pub fn choose_output(prompter: &mut impl Prompter, default: &Path) -> Result<PathBuf> {
    let default = default.display().to_string();
    let answer = prompter.ask("Save configuration as", Some(&default))?;
    let answer = answer.trim();
    Ok(PathBuf::from(if answer.is_empty() { default.as_str() } else { answer }))
}

/// Where to write: `output` itself, or `new_<name>` beside it when the file
/// exists and must not be overwritten
pub fn output_path(output: &Path, overwrite: bool) -> PathBuf {
    if overwrite || !output.exists() {
        return output.to_path_buf();
    }
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "oci_monitor_config.json".to_string());
    output.with_file_name(format!("new_{}", name))
}
