//! NGINX 操作计划构造
//!
//! 每个子命令对应一份纯数据的 OperationPlan。这里只拼装命令文本，
//! 不接触任何主机；conf 文件以 base64 解码步骤的形式下发，
//! 引擎因此保持纯命令执行的契约。

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use common::error::{FleetError, Result};
use common::plan::OperationPlan;

use crate::config::{
    CopySettings, DeploymentSettings, InstallSettings, MaintenanceSettings, UploadLogsSettings,
};

/// 部署目录的绝对路径
fn nginx_path(deployment_path: &str, nginx_dir_name: &str) -> String {
    format!("{}/{}", deployment_path.trim_end_matches('/'), nginx_dir_name)
}

fn activate_base(base_conda_path: &str) -> String {
    format!("source {}/bin/activate", base_conda_path.trim_end_matches('/'))
}

/// 安装：目录结构、conda 环境、配置文件
pub fn install(settings: &InstallSettings) -> Result<OperationPlan> {
    let path = nginx_path(&settings.deployment_path, &settings.nginx_dir_name);
    let activate = activate_base(&settings.base_conda_path);

    let create_dirs = format!(
        "mkdir -p {path}/conf {path}/cache {path}/logs {path}/var/tmp/nginx/client"
    );

    // 已存在的环境先删除再重建，保证安装可重入
    let rebuild_env = format!(
        "{activate} && conda env list | grep -q '^nginx_env ' && conda remove -n nginx_env --all -y || true && \
         {activate} && conda create --name nginx_env -y -k nginx -c {channel}",
        channel = settings.conda_channel,
    );

    let conf = std::fs::read(&settings.nginx_conf).map_err(|e| {
        FleetError::config(format!(
            "cannot read nginx.conf {}: {}",
            settings.nginx_conf.display(),
            e
        ))
    })?;
    let deploy_conf = format!(
        "echo {} | base64 -d > {path}/conf/nginx.conf",
        BASE64.encode(&conf)
    );

    Ok(OperationPlan::new("install")
        .step("create directory structure", create_dirs)
        .step("rebuild conda environment", rebuild_env)
        .step("deploy nginx.conf", deploy_conf))
}

/// 卸载：停进程、删目录、移除 conda 环境
pub fn remove(settings: &DeploymentSettings) -> OperationPlan {
    let path = nginx_path(&settings.deployment_path, &settings.nginx_dir_name);
    let activate = activate_base(&settings.base_conda_path);

    OperationPlan::new("remove")
        .step("stop nginx processes", "pkill -f nginx || true")
        .step("remove deployment directory", format!("rm -rf {path}"))
        .step(
            "remove conda environment",
            format!("{activate} && conda remove -n nginx_env --all -y"),
        )
}

/// 启动 NGINX
pub fn start(settings: &DeploymentSettings) -> OperationPlan {
    let path = nginx_path(&settings.deployment_path, &settings.nginx_dir_name);
    let activate = activate_base(&settings.base_conda_path);

    OperationPlan::new("start").step(
        "start nginx",
        format!("{activate} && conda activate nginx_env && nginx -c {path}/conf/nginx.conf -p {path}/"),
    )
}

/// 停止 NGINX：pid 文件存在时优雅退出，否则 pkill
pub fn stop(settings: &DeploymentSettings) -> OperationPlan {
    OperationPlan::new("stop").step("stop nginx", stop_command(settings))
}

fn stop_command(settings: &DeploymentSettings) -> String {
    let path = nginx_path(&settings.deployment_path, &settings.nginx_dir_name);
    format!(
        "if [ -f {path}/logs/nginx.pid ]; then nginx -s quit -c {path}/conf/nginx.conf -p {path}/; else pkill -f nginx; fi"
    )
}

/// 重启：同一份计划内先停后启，停失败则不再启动
pub fn restart(settings: &DeploymentSettings) -> OperationPlan {
    let path = nginx_path(&settings.deployment_path, &settings.nginx_dir_name);
    let activate = activate_base(&settings.base_conda_path);

    OperationPlan::new("restart")
        .step("stop nginx", stop_command(settings))
        .step(
            "start nginx",
            format!("{activate} && conda activate nginx_env && nginx -c {path}/conf/nginx.conf -p {path}/"),
        )
}

/// 清空缓存目录
pub fn clear_cache(settings: &MaintenanceSettings) -> OperationPlan {
    let path = nginx_path(&settings.deployment_path, &settings.nginx_dir_name);
    OperationPlan::new("clear-cache").step("clear cache", format!("rm -rf {path}/cache/*"))
}

/// 清空日志文件（优先截断，回退删除）
pub fn clear_logs(settings: &MaintenanceSettings) -> OperationPlan {
    let path = nginx_path(&settings.deployment_path, &settings.nginx_dir_name);
    OperationPlan::new("clear-logs").step(
        "clear logs",
        format!("truncate -s 0 {path}/logs/*.log 2>/dev/null || rm -f {path}/logs/*.log"),
    )
}

/// 归档日志并上传 S3
pub fn upload_logs(settings: &UploadLogsSettings) -> OperationPlan {
    let path = nginx_path(&settings.deployment_path, &settings.nginx_dir_name);

    let mut commands = vec![
        format!("cd {path}/logs"),
        "TIMESTAMP=$(date +%Y%m%d_%H%M%S)".to_string(),
        "HOSTNAME=$(hostname -s)".to_string(),
        "ARCHIVE_NAME=\"nginx_logs_${HOSTNAME}_${TIMESTAMP}.tar.gz\"".to_string(),
        "tar -czf /tmp/${ARCHIVE_NAME} *.log 2>/dev/null || echo 'No logs to archive'".to_string(),
        format!("aws s3 cp /tmp/${{ARCHIVE_NAME}} {}", settings.s3_bucket),
    ];

    // 临时归档恰好被处理一次：要么移入归档目录，要么删除
    if let Some(archive_dir) = &settings.archive_after_upload {
        commands.push(format!("mkdir -p {archive_dir}"));
        commands.push(format!("mv /tmp/${{ARCHIVE_NAME}} {archive_dir}/"));
    } else {
        commands.push("rm -f /tmp/${ARCHIVE_NAME}".to_string());
    }

    if settings.delete_after_upload {
        commands.push(format!("rm -f {path}/logs/*.log"));
    }

    OperationPlan::new("upload-logs").step("archive and upload logs", commands.join(" && "))
}

/// 文件分发：单文件或递归目录，内容以 base64 解码步骤下发
pub fn copy(settings: &CopySettings) -> Result<OperationPlan> {
    if settings.source.is_dir() {
        copy_tree(&settings.source, &settings.destination)
    } else {
        let destination = if settings.destination.ends_with('/') {
            let name = settings
                .source
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    FleetError::config(format!("invalid source path: {}", settings.source.display()))
                })?;
            format!("{}{}", settings.destination, name)
        } else {
            settings.destination.clone()
        };

        Ok(OperationPlan::new("copy").step(
            format!("copy {}", settings.source.display()),
            copy_file_command(&settings.source, &destination)?,
        ))
    }
}

/// 递归分发：按排序后的相对路径逐文件下发，保证计划确定
fn copy_tree(source: &Path, destination: &str) -> Result<OperationPlan> {
    let root = match destination.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    let mut files = Vec::new();
    collect_files(source, &mut files)?;
    files.sort();

    let mut plan = OperationPlan::new("copy")
        .step("create destination directory", format!("mkdir -p {root}"));

    for file in &files {
        let relative = file.strip_prefix(source).map_err(|_| {
            FleetError::unexpected(format!("path {} escapes source tree", file.display()))
        })?;
        let remote = format!("{}/{}", root, relative.display());
        plan = plan.step(format!("copy {}", relative.display()), copy_file_command(file, &remote)?);
    }

    Ok(plan)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        FleetError::config(format!("cannot read directory {}: {}", dir.display(), e))
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| {
            FleetError::config(format!("cannot read directory {}: {}", dir.display(), e))
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

fn copy_file_command(source: &Path, remote: &str) -> Result<String> {
    let data = std::fs::read(source).map_err(|e| {
        FleetError::config(format!("cannot read {}: {}", source.display(), e))
    })?;
    Ok(format!(
        "mkdir -p $(dirname {remote}) && echo {} | base64 -d > {remote}",
        BASE64.encode(&data)
    ))
}

/// 任意命令，可接受的退出码来自 `--expect`
pub fn exec(command: &str, expect: Option<&str>) -> Result<OperationPlan> {
    if command.trim().is_empty() {
        return Err(FleetError::config("command must not be empty"));
    }

    let expected = match expect {
        None => vec![0],
        Some(raw) => {
            let codes: Vec<i32> = raw
                .split(',')
                .map(|part| {
                    part.trim()
                        .parse::<i32>()
                        .map_err(|_| FleetError::config(format!("invalid exit code: {}", part.trim())))
                })
                .collect::<Result<_>>()?;
            if codes.is_empty() {
                return Err(FleetError::config("--expect must list at least one exit code"));
            }
            codes
        }
    };

    Ok(OperationPlan::new("exec").step_expecting("run command", command, &expected))
}
