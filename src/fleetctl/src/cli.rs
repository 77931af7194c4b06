//! 命令行定义
//!
//! 子命令对应一种 NGINX 运维操作，公共参数（目标主机、凭证、调度
//! 策略、输出）在所有子命令间共享。

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// NGINX 集群运维工具
#[derive(Debug, Parser)]
#[command(name = "fleetctl", version, about = "Manage NGINX deployments across a fleet of servers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 安装 NGINX：创建目录结构、重建 conda 环境、下发配置文件
    Install(InstallArgs),

    /// 卸载 NGINX：停止进程、删除部署目录、移除 conda 环境
    Remove(DeploymentArgs),

    /// 启动 NGINX
    Start(DeploymentArgs),

    /// 停止 NGINX（优先 pid 文件优雅退出，回退 pkill）
    Stop(DeploymentArgs),

    /// 重启 NGINX
    Restart(DeploymentArgs),

    /// 清空 NGINX 缓存目录
    ClearCache(MaintenanceArgs),

    /// 清空 NGINX 日志文件
    ClearLogs(MaintenanceArgs),

    /// 归档日志并上传到 S3
    UploadLogs(UploadLogsArgs),

    /// 把本地文件或目录分发到所有目标主机
    Copy(CopyArgs),

    /// 在所有目标主机上执行一条任意命令
    Exec(ExecArgs),
}

impl Command {
    /// 子命令携带的公共参数
    pub fn common(&self) -> &CommonArgs {
        match self {
            Command::Install(args) => &args.common,
            Command::Remove(args)
            | Command::Start(args)
            | Command::Stop(args)
            | Command::Restart(args) => &args.common,
            Command::ClearCache(args) | Command::ClearLogs(args) => &args.common,
            Command::UploadLogs(args) => &args.common,
            Command::Copy(args) => &args.common,
            Command::Exec(args) => &args.common,
        }
    }
}

/// 所有子命令共享的参数
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// 逗号分隔的目标主机列表
    #[arg(long)]
    pub hosts: Option<String>,

    /// JSON 清单文件（与 --hosts 互斥）
    #[arg(long)]
    pub inventory: Option<PathBuf>,

    /// SSH 用户名
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// 从该环境变量读取 SSH 密码；未设置时交互提示
    #[arg(long)]
    pub password_env: Option<String>,

    /// JSON 配置文件；命令行参数优先于文件内容
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// 主机间调度模式
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// 并行上限（默认 min(主机数, 10)）
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// 首个失败后取消尚未开始的主机（默认继续尝试所有主机）
    #[arg(long)]
    pub fail_fast: bool,

    /// 单步超时（秒）；0 表示不设上限
    #[arg(long)]
    pub timeout: Option<u64>,

    /// SSH 端口
    #[arg(long)]
    pub port: Option<u16>,

    /// 不连接任何主机，伪造成功结果
    #[arg(long)]
    pub dry_run: bool,

    /// 日志级别（RUST_LOG 优先）
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// 日志格式
    #[arg(long, value_enum, default_value_t = LogFormat::Default)]
    pub log_format: LogFormat,

    /// 追加写入的日志文件
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// 结果输出格式
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Serial,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Default,
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// install 子命令参数
#[derive(Debug, Args)]
pub struct InstallArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// 基础 conda 环境路径
    #[arg(long)]
    pub base_conda_path: Option<String>,

    /// 部署根目录
    #[arg(long)]
    pub deployment_path: Option<String>,

    /// NGINX 目录名
    #[arg(long)]
    pub nginx_dir_name: Option<String>,

    /// 本地 nginx.conf 路径
    #[arg(long)]
    pub nginx_conf: Option<PathBuf>,

    /// 提供 nginx 包的自定义 conda channel
    #[arg(long)]
    pub conda_channel: Option<String>,
}

/// 需要部署路径与 conda 环境的子命令参数
#[derive(Debug, Args)]
pub struct DeploymentArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// 基础 conda 环境路径
    #[arg(long)]
    pub base_conda_path: Option<String>,

    /// 部署根目录
    #[arg(long)]
    pub deployment_path: Option<String>,

    /// NGINX 目录名
    #[arg(long)]
    pub nginx_dir_name: Option<String>,
}

/// 只需要部署路径的维护子命令参数
#[derive(Debug, Args)]
pub struct MaintenanceArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// 部署根目录
    #[arg(long)]
    pub deployment_path: Option<String>,

    /// NGINX 目录名
    #[arg(long)]
    pub nginx_dir_name: Option<String>,
}

/// upload-logs 子命令参数
#[derive(Debug, Args)]
pub struct UploadLogsArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// 部署根目录
    #[arg(long)]
    pub deployment_path: Option<String>,

    /// NGINX 目录名
    #[arg(long)]
    pub nginx_dir_name: Option<String>,

    /// 目标 S3 地址（s3://bucket/prefix）
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// 上传后把归档移动到该远端目录
    #[arg(long)]
    pub archive_after_upload: Option<String>,

    /// 上传后删除远端日志
    #[arg(long)]
    pub delete_after_upload: bool,
}

/// copy 子命令参数
#[derive(Debug, Args)]
pub struct CopyArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// 本地源文件或目录
    pub source: PathBuf,

    /// 远端目标路径
    pub destination: String,

    /// 递归分发目录
    #[arg(long, short = 'R')]
    pub recursive: bool,
}

/// exec 子命令参数
#[derive(Debug, Args)]
pub struct ExecArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// 要执行的命令
    pub command: String,

    /// 可接受的退出码（逗号分隔，默认只接受 0）
    #[arg(long)]
    pub expect: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exec() {
        let cli = Cli::parse_from([
            "fleetctl",
            "exec",
            "--hosts",
            "h1,h2",
            "--username",
            "deploy",
            "uptime",
        ]);
        let Command::Exec(args) = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(args.command, "uptime");
        assert_eq!(args.common.hosts.as_deref(), Some("h1,h2"));
        assert_eq!(args.common.username.as_deref(), Some("deploy"));
        assert_eq!(args.common.output, OutputFormat::Text);
    }

    #[test]
    fn test_parse_install_flags() {
        let cli = Cli::parse_from([
            "fleetctl",
            "install",
            "--hosts",
            "web-01",
            "--username",
            "deploy",
            "--base-conda-path",
            "/opt/conda",
            "--deployment-path",
            "/srv",
            "--conda-channel",
            "https://conda.internal/nginx",
            "--nginx-conf",
            "/etc/nginx.conf",
            "--mode",
            "serial",
            "--timeout",
            "0",
        ]);
        let Command::Install(args) = cli.command else {
            panic!("expected install");
        };
        assert_eq!(args.base_conda_path.as_deref(), Some("/opt/conda"));
        assert_eq!(args.common.mode, Some(ModeArg::Serial));
        assert_eq!(args.common.timeout, Some(0));
    }

    #[test]
    fn test_parse_copy() {
        let cli = Cli::parse_from([
            "fleetctl",
            "copy",
            "--hosts",
            "h1",
            "-u",
            "deploy",
            "-R",
            "./site",
            "/srv/www",
        ]);
        let Command::Copy(args) = cli.command else {
            panic!("expected copy");
        };
        assert_eq!(args.source, PathBuf::from("./site"));
        assert_eq!(args.destination, "/srv/www");
        assert!(args.recursive);
    }

    #[test]
    fn test_fail_fast_flag_defaults_off() {
        let cli = Cli::parse_from(["fleetctl", "exec", "--hosts", "h1", "-u", "deploy", "uptime"]);
        assert!(!cli.command.common().fail_fast);

        let cli = Cli::parse_from([
            "fleetctl", "exec", "--hosts", "h1", "-u", "deploy", "--fail-fast", "uptime",
        ]);
        assert!(cli.command.common().fail_fast);
    }

    #[test]
    fn test_common_accessor_covers_all_commands() {
        let cli = Cli::parse_from(["fleetctl", "clear-cache", "--hosts", "h1", "-u", "deploy"]);
        assert_eq!(cli.command.common().hosts.as_deref(), Some("h1"));
    }
}
