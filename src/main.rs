//! # vmws
//!
//! Command-line controller for VMware Workstation instances on a local or
//! remote host.
//!
//! ## Modules
//!
//! - **cli**: clap command tree and flag binding
//! - **config**: YAML config file, `VMWS_*` environment overrides
//! - **output**: plaintext and JSON rendering

mod cli;
mod config;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use config::Config;
use output::Report;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vmws_control::Controller;
use vmws_core::{
    CreateOptions, DestroyOptions, FilesOptions, ShowOptions, StopOptions, VmwsError, VmwsResult,
};
use vmws_exec::Executor;
use vmws_host::{ControlApi, RestClient};

const LOG_ENV: &str = "VMWS_LOG";

fn init_logging(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    // `init` also installs the log bridge for the library crates.
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let json = cli.json;
    let result = match run(cli).await {
        Ok(report) => report.print(json),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> VmwsResult<Report> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(|k| std::env::var(k).ok());
    if let Some(host) = cli.host {
        config.host = host;
    }
    if cli.no_humanize {
        config.no_humanize = true;
    }
    config.validate()?;

    let shell = Executor::connect(config.exec_config()).await?;
    let api: Option<Arc<dyn ControlApi>> = match config.api_config() {
        Some(c) => Some(Arc::new(RestClient::new(&c)?)),
        None => None,
    };
    let mut ctl = Controller::new(Arc::new(shell), api, config.settings());
    dispatch(&mut ctl, &config, cli.command).await
}

async fn dispatch(ctl: &mut Controller, config: &Config, command: Command) -> VmwsResult<Report> {
    match command {
        Command::Create { name, features } => {
            let mut flags = features.to_flags();
            config.apply_create_defaults(&mut flags);
            let (opts, iso) = CreateOptions::from_flags(&flags)?;
            let vm = ctl.create(&name, &opts, &iso).await?;
            Ok(Report::Vms { vms: vec![vm], detail: false })
        }
        Command::Modify { vid, name, features } => {
            let mut flags = features.to_flags();
            flags.name = name;
            let (opts, iso) = CreateOptions::from_flags(&flags)?;
            Ok(Report::Lines(ctl.modify(&vid, &opts, &iso).await?))
        }
        Command::Destroy { vid, force } => {
            let state = ctl.destroy(&vid, &DestroyOptions { force }).await?;
            Ok(Report::State(state))
        }
        Command::Edit { vid } => {
            let changed = ctl.edit(&vid, run_editor).await?;
            Ok(Report::Text(if changed { "updated" } else { "unchanged" }.to_string()))
        }
        Command::Get { vid, property } => {
            let value = ctl.get_property(&vid, property.as_deref().unwrap_or("")).await?;
            Ok(Report::Value(value))
        }
        Command::Set { vid, property, value } => {
            Ok(Report::Text(ctl.set_property(&vid, &property, &value).await?))
        }
        Command::List { target, detail, all, iso } => {
            let opts = FilesOptions { detail, all, iso };
            let files = ctl.files(target.as_deref().unwrap_or(""), &opts).await?;
            Ok(Report::Files { files, detail })
        }
        Command::Show { vid, running, detail } => {
            let opts = ShowOptions { running_only: running, detail };
            let vms = ctl.show(vid.as_deref().unwrap_or(""), &opts).await?;
            Ok(Report::Vms { vms, detail })
        }
        Command::Start { vid, start, iso } => {
            let mut flags = vmws_core::flags::CreateFlags::default();
            iso.apply(&mut flags);
            let (_, iso) = CreateOptions::from_flags(&flags)?;
            Ok(Report::State(ctl.start(&vid, &start.to_options(), &iso).await?))
        }
        Command::Stop { vid, power_off, wait } => {
            let state = ctl.stop(&vid, &StopOptions { power_off, wait }).await?;
            Ok(Report::State(state))
        }
        Command::Restart { vid, start } => Ok(Report::State(ctl.restart(&vid, &start.to_options()).await?)),
        Command::Wait { vid, state } => Ok(Report::State(ctl.wait(&vid, &state).await?)),
        Command::Sendkeys { vid, keys } => {
            let n = ctl.send_keys(&vid, &keys).await?;
            Ok(Report::Text(format!("{} key actions sent", n)))
        }
        Command::Upload { local, vid, dest } => {
            Ok(Report::Text(ctl.upload(&local, &vid, dest.as_deref()).await?))
        }
        Command::Download { vid, file, local } => {
            let path = ctl.download(&vid, &file, local.as_deref()).await?;
            Ok(Report::Text(path.display().to_string()))
        }
        Command::Vmrun { args } => Ok(Report::Lines(ctl.vmrun_passthrough(&args).await?)),
        Command::Vmware { args } => {
            ctl.vmware_passthrough(&args).await?;
            Ok(Report::Nothing)
        }
    }
}

/// Run `$VISUAL` / `$EDITOR` on `path` with the terminal attached.
fn run_editor(path: &Path) -> VmwsResult<()> {
    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| if cfg!(windows) { "notepad" } else { "vi" }.to_string());
    let mut parts = editor.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| VmwsError::config("EDITOR is empty"))?;
    let status = tokio::task::block_in_place(|| {
        std::process::Command::new(program).args(parts).arg(path).status()
    })
    .map_err(|e| VmwsError::exec_failed(program, e.to_string()))?;
    if !status.success() {
        return Err(VmwsError::non_zero_exit(&editor, status.code().unwrap_or(-1), &[]));
    }
    Ok(())
}
