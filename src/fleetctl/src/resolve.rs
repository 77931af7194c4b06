//! 目标主机解析
//!
//! 主机来源在 trait 边界后面：静态列表与 JSON 清单文件。
//! 集群管理 API（如云端弹性伸缩组）可以作为新的实现接入，
//! 引擎与 CLI 的其余部分不感知来源。

use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use common::error::{FleetError, Result};
use common::host::Host;

/// 把一个主机来源展开为有序主机列表
///
/// 返回顺序即执行与汇总顺序
pub trait HostResolver {
    fn resolve(&self) -> Result<Vec<Host>>;
}

/// 逗号分隔的静态主机列表
pub struct StaticHosts {
    csv: String,
}

impl StaticHosts {
    pub fn new(csv: impl Into<String>) -> Self {
        Self { csv: csv.into() }
    }
}

impl HostResolver for StaticHosts {
    fn resolve(&self) -> Result<Vec<Host>> {
        let hosts = Host::parse_list(&self.csv);
        if hosts.is_empty() {
            return Err(FleetError::config("host list is empty"));
        }
        debug!(count = hosts.len(), "Resolved static host list");
        Ok(hosts)
    }
}

/// JSON 清单文件
///
/// 支持两种形式：字符串数组，或 `{ "address": ..., "name": ... }` 对象数组
pub struct InventoryFile {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InventoryEntry {
    Address(String),
    Named { address: String, name: Option<String> },
}

impl InventoryFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HostResolver for InventoryFile {
    fn resolve(&self) -> Result<Vec<Host>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            FleetError::config(format!("cannot read inventory {}: {}", self.path.display(), e))
        })?;

        let entries: Vec<InventoryEntry> = serde_json::from_str(&raw).map_err(|e| {
            FleetError::config(format!("invalid inventory {}: {}", self.path.display(), e))
        })?;

        let hosts: Vec<Host> = entries
            .into_iter()
            .filter_map(|entry| match entry {
                InventoryEntry::Address(address) => {
                    let trimmed = address.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        Some(Host::new(trimmed))
                    }
                }
                InventoryEntry::Named { address, name } => {
                    let trimmed = address.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        Some(match name {
                            Some(name) => Host::named(trimmed, name),
                            None => Host::new(trimmed),
                        })
                    }
                }
            })
            .collect();

        if hosts.is_empty() {
            return Err(FleetError::config(format!(
                "inventory {} contains no hosts",
                self.path.display()
            )));
        }

        debug!(count = hosts.len(), path = %self.path.display(), "Resolved inventory hosts");
        Ok(hosts)
    }
}
