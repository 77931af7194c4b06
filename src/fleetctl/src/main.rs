//! fleetctl 主入口
//!
//! 解析命令行，装配配置与计划，驱动执行引擎，渲染结果并以
//! 约定的退出码结束进程。

mod cli;
mod config;
mod dry_run;
mod ops;
mod output;
mod resolve;
mod secret;
mod telemetry;

use std::sync::Arc;

use clap::Parser;
use secrecy::SecretString;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use common::error::Result;
use common::plan::OperationPlan;
use fleet_engine::{
    resolve_exit_code, CredentialBroker, Dispatcher, SecretSource, SshTransport, StaticSecret,
    Transport,
};

use cli::{Cli, Command};
use config::{
    ConfigFile, CopySettings, DeploymentSettings, InstallSettings, MaintenanceSettings,
    RunSettings, UploadLogsSettings,
};
use dry_run::DryRunTransport;
use secret::{EnvSecret, PromptSecret};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fleetctl: {:#}", e);
            5
        }
    };
    std::process::exit(exit_code);
}

async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    let common = cli.command.common();
    telemetry::init(&common.log_level, common.log_format, common.log_file.as_deref())?;

    match execute(&cli.command).await {
        Ok(code) => Ok(code),
        Err(e) => {
            error!(error = %e, "Run aborted");
            eprintln!("fleetctl: {}", e);
            Ok(e.process_exit_code())
        }
    }
}

async fn execute(command: &Command) -> Result<i32> {
    let common = command.common();

    let file = match &common.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };

    let settings = RunSettings::assemble(common, &file)?;
    let plan = build_plan(command, &file)?;

    let source: Box<dyn SecretSource> = if settings.dry_run {
        // dry-run 不连接任何主机，无需真实密码
        Box::new(StaticSecret::new(SecretString::new("dry-run".to_string())))
    } else if let Some(var) = &settings.password_env {
        Box::new(EnvSecret::new(var))
    } else {
        Box::new(PromptSecret)
    };
    let broker = Arc::new(CredentialBroker::new(settings.username.clone(), source));

    let transport: Arc<dyn Transport> = if settings.dry_run {
        warn!("Dry-run mode: no hosts will be contacted");
        Arc::new(DryRunTransport)
    } else {
        Arc::new(SshTransport::new(settings.ssh.clone()))
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling remaining hosts");
            interrupt.cancel();
        }
    });

    let dispatcher = Dispatcher::new(transport, broker);
    let summary = dispatcher
        .execute(settings.hosts, plan, settings.policy, cancel)
        .await?;

    let rendered = output::render(&summary, common.output)?;
    println!("{}", rendered);

    Ok(resolve_exit_code(&summary))
}

fn build_plan(command: &Command, file: &ConfigFile) -> Result<OperationPlan> {
    match command {
        Command::Install(args) => ops::install(&InstallSettings::assemble(args, file)?),
        Command::Remove(args) => Ok(ops::remove(&DeploymentSettings::assemble(args, file)?)),
        Command::Start(args) => Ok(ops::start(&DeploymentSettings::assemble(args, file)?)),
        Command::Stop(args) => Ok(ops::stop(&DeploymentSettings::assemble(args, file)?)),
        Command::Restart(args) => Ok(ops::restart(&DeploymentSettings::assemble(args, file)?)),
        Command::ClearCache(args) => {
            Ok(ops::clear_cache(&MaintenanceSettings::assemble(args, file)?))
        }
        Command::ClearLogs(args) => {
            Ok(ops::clear_logs(&MaintenanceSettings::assemble(args, file)?))
        }
        Command::UploadLogs(args) => {
            Ok(ops::upload_logs(&UploadLogsSettings::assemble(args, file)?))
        }
        Command::Copy(args) => ops::copy(&CopySettings::assemble(args)?),
        Command::Exec(args) => ops::exec(&args.command, args.expect.as_deref()),
    }
}
