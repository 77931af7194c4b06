//! 配置装配
//!
//! 可选的 JSON 配置文件与命令行参数合并，命令行优先。所有校验都在
//! 接触任何主机之前完成，失败映射为配置错误（退出码 2）。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use common::error::{FleetError, Result};
use common::host::Host;
use fleet_engine::{ExecutionMode, ExecutionPolicy, FailurePolicy, SshSettings};

use crate::cli::{CommonArgs, ModeArg};
use crate::resolve::{HostResolver, InventoryFile, StaticHosts};

/// 默认单步超时（秒）
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;

fn default_nginx_dir_name() -> String {
    "nginx_run".to_string()
}

/// JSON 配置文件的全部可选字段
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub hosts: Option<HostsField>,
    pub inventory: Option<PathBuf>,
    pub username: Option<String>,
    pub password_env: Option<String>,
    pub mode: Option<String>,
    pub max_concurrency: Option<usize>,
    pub fail_fast: Option<bool>,
    pub timeout: Option<u64>,
    pub port: Option<u16>,
    pub host_key_verification: Option<String>,

    pub base_conda_path: Option<String>,
    pub deployment_path: Option<String>,
    pub nginx_dir_name: Option<String>,
    pub nginx_conf: Option<PathBuf>,
    pub conda_channel: Option<String>,
    pub s3_bucket: Option<String>,
    pub archive_after_upload: Option<String>,
}

/// hosts 字段同时接受逗号分隔字符串与字符串数组
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum HostsField {
    List(Vec<String>),
    Csv(String),
}

impl HostsField {
    fn as_csv(&self) -> String {
        match self {
            HostsField::Csv(s) => s.clone(),
            HostsField::List(list) => list.join(","),
        }
    }
}

impl ConfigFile {
    /// 读取并解析 JSON 配置文件
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FleetError::config(format!("cannot read config file {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| FleetError::config(format!("invalid JSON in {}: {}", path.display(), e)))
    }
}

/// 合并校验后的执行目标与策略
#[derive(Debug)]
pub struct RunSettings {
    pub hosts: Vec<Host>,
    pub username: String,
    pub password_env: Option<String>,
    pub policy: ExecutionPolicy,
    pub ssh: SshSettings,
    pub dry_run: bool,
}

impl RunSettings {
    /// 合并命令行与配置文件，解析主机来源并校验
    pub fn assemble(common: &CommonArgs, file: &ConfigFile) -> Result<Self> {
        let hosts_arg = common
            .hosts
            .clone()
            .or_else(|| file.hosts.as_ref().map(HostsField::as_csv));
        let inventory = common.inventory.clone().or_else(|| file.inventory.clone());

        let hosts = match (hosts_arg, inventory) {
            (Some(_), Some(_)) => {
                return Err(FleetError::config("--hosts and --inventory are mutually exclusive"));
            }
            (None, None) => {
                return Err(FleetError::config("either --hosts or --inventory must be provided"));
            }
            (Some(csv), None) => StaticHosts::new(csv).resolve()?,
            (None, Some(path)) => InventoryFile::new(path).resolve()?,
        };

        if hosts.is_empty() {
            return Err(FleetError::config("host list is empty"));
        }

        let username = common
            .username
            .clone()
            .or_else(|| file.username.clone())
            .ok_or_else(|| FleetError::config("username must be provided"))?;
        if username.trim().is_empty() {
            return Err(FleetError::config("username must not be empty"));
        }

        let mode = match common.mode {
            Some(ModeArg::Serial) => ExecutionMode::Serial,
            Some(ModeArg::Parallel) => ExecutionMode::Parallel,
            None => match file.mode.as_deref() {
                Some("serial") => ExecutionMode::Serial,
                Some("parallel") | None => ExecutionMode::Parallel,
                Some(other) => {
                    return Err(FleetError::config(format!("unknown execution mode: {}", other)));
                }
            },
        };

        let failure_policy = if common.fail_fast || file.fail_fast.unwrap_or(false) {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::ContinueOnError
        };

        let timeout_secs = common
            .timeout
            .or(file.timeout)
            .unwrap_or(DEFAULT_STEP_TIMEOUT_SECS);

        let max_concurrency = common.max_concurrency.or(file.max_concurrency);
        if max_concurrency == Some(0) {
            return Err(FleetError::config("--max-concurrency must be at least 1"));
        }

        let policy = ExecutionPolicy {
            mode,
            max_concurrency,
            failure_policy,
            step_deadline: Duration::from_secs(timeout_secs),
        };

        let mut ssh = SshSettings::default();
        if let Some(port) = common.port.or(file.port) {
            ssh.port = port;
        }
        if let Some(mode) = &file.host_key_verification {
            ssh.host_key_verification = mode.parse().map_err(FleetError::config)?;
        }

        Ok(Self {
            hosts,
            username,
            password_env: common.password_env.clone().or_else(|| file.password_env.clone()),
            policy,
            ssh,
            dry_run: common.dry_run,
        })
    }
}

/// 取命令行值，否则取配置文件值，两者皆缺则报配置错误
pub fn required<T: Clone>(cli: &Option<T>, file: &Option<T>, name: &str) -> Result<T> {
    cli.clone()
        .or_else(|| file.clone())
        .ok_or_else(|| FleetError::config(format!("{} must be provided", name)))
}

/// 带默认值的三级合并
pub fn with_default<T: Clone>(cli: &Option<T>, file: &Option<T>, default: T) -> T {
    cli.clone().or_else(|| file.clone()).unwrap_or(default)
}

/// 安装参数
#[derive(Debug)]
pub struct InstallSettings {
    pub base_conda_path: String,
    pub deployment_path: String,
    pub nginx_dir_name: String,
    pub nginx_conf: PathBuf,
    pub conda_channel: String,
}

impl InstallSettings {
    pub fn assemble(args: &crate::cli::InstallArgs, file: &ConfigFile) -> Result<Self> {
        let nginx_conf = required(&args.nginx_conf, &file.nginx_conf, "--nginx-conf")?;
        if !nginx_conf.is_file() {
            return Err(FleetError::config(format!(
                "nginx.conf not found: {}",
                nginx_conf.display()
            )));
        }

        Ok(Self {
            base_conda_path: required(&args.base_conda_path, &file.base_conda_path, "--base-conda-path")?,
            deployment_path: required(&args.deployment_path, &file.deployment_path, "--deployment-path")?,
            nginx_dir_name: with_default(&args.nginx_dir_name, &file.nginx_dir_name, default_nginx_dir_name()),
            nginx_conf,
            conda_channel: required(&args.conda_channel, &file.conda_channel, "--conda-channel")?,
        })
    }
}

/// 服务生命周期与卸载共用的参数
#[derive(Debug)]
pub struct DeploymentSettings {
    pub base_conda_path: String,
    pub deployment_path: String,
    pub nginx_dir_name: String,
}

impl DeploymentSettings {
    pub fn assemble(args: &crate::cli::DeploymentArgs, file: &ConfigFile) -> Result<Self> {
        Ok(Self {
            base_conda_path: required(&args.base_conda_path, &file.base_conda_path, "--base-conda-path")?,
            deployment_path: required(&args.deployment_path, &file.deployment_path, "--deployment-path")?,
            nginx_dir_name: with_default(&args.nginx_dir_name, &file.nginx_dir_name, default_nginx_dir_name()),
        })
    }
}

/// 维护操作参数
#[derive(Debug)]
pub struct MaintenanceSettings {
    pub deployment_path: String,
    pub nginx_dir_name: String,
}

impl MaintenanceSettings {
    pub fn assemble(args: &crate::cli::MaintenanceArgs, file: &ConfigFile) -> Result<Self> {
        Ok(Self {
            deployment_path: required(&args.deployment_path, &file.deployment_path, "--deployment-path")?,
            nginx_dir_name: with_default(&args.nginx_dir_name, &file.nginx_dir_name, default_nginx_dir_name()),
        })
    }
}

/// 文件分发参数
#[derive(Debug)]
pub struct CopySettings {
    pub source: PathBuf,
    pub destination: String,
    pub recursive: bool,
}

impl CopySettings {
    pub fn assemble(args: &crate::cli::CopyArgs) -> Result<Self> {
        if !args.source.exists() {
            return Err(FleetError::config(format!(
                "source path not found: {}",
                args.source.display()
            )));
        }
        if args.source.is_dir() && !args.recursive {
            return Err(FleetError::config(format!(
                "{} is a directory; use --recursive to copy it",
                args.source.display()
            )));
        }
        if args.destination.trim().is_empty() {
            return Err(FleetError::config("destination must not be empty"));
        }

        Ok(Self {
            source: args.source.clone(),
            destination: args.destination.clone(),
            recursive: args.recursive,
        })
    }
}

/// 日志上传参数
#[derive(Debug)]
pub struct UploadLogsSettings {
    pub deployment_path: String,
    pub nginx_dir_name: String,
    pub s3_bucket: String,
    pub archive_after_upload: Option<String>,
    pub delete_after_upload: bool,
}

impl UploadLogsSettings {
    pub fn assemble(args: &crate::cli::UploadLogsArgs, file: &ConfigFile) -> Result<Self> {
        let s3_bucket = required(&args.s3_bucket, &file.s3_bucket, "--s3-bucket")?;
        if !s3_bucket.starts_with("s3://") {
            return Err(FleetError::config("S3 bucket must start with 's3://'"));
        }

        Ok(Self {
            deployment_path: required(&args.deployment_path, &file.deployment_path, "--deployment-path")?,
            nginx_dir_name: with_default(&args.nginx_dir_name, &file.nginx_dir_name, default_nginx_dir_name()),
            s3_bucket,
            archive_after_upload: args
                .archive_after_upload
                .clone()
                .or_else(|| file.archive_after_upload.clone()),
            delete_after_upload: args.delete_after_upload,
        })
    }
}
