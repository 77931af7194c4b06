//! 目标主机模型
//!
//! 主机一旦解析完成即不可变；主机列表的顺序决定最终报告的顺序

use serde::{Deserialize, Serialize};

/// 一台目标主机：连接地址 + 展示名称
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Host {
    /// 连接地址（主机名或 IP）
    pub address: String,

    /// 展示名称（报告中使用；默认等于地址）
    pub name: String,
}

impl Host {
    /// 从地址创建主机，展示名称与地址相同
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            name: address.clone(),
            address,
        }
    }

    /// 从地址和展示名称创建主机
    pub fn named(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }

    /// 解析逗号分隔的主机列表（忽略空白项）
    pub fn parse_list(raw: &str) -> Vec<Host> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Host::new)
            .collect()
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_new_uses_address_as_name() {
        let host = Host::new("10.0.0.1");
        assert_eq!(host.address, "10.0.0.1");
        assert_eq!(host.name, "10.0.0.1");
    }

    #[test]
    fn test_host_named() {
        let host = Host::named("10.0.0.1", "web-01");
        assert_eq!(host.address, "10.0.0.1");
        assert_eq!(host.to_string(), "web-01");
    }

    #[test]
    fn test_parse_list() {
        let hosts = Host::parse_list("h1, h2 ,,h3,");
        assert_eq!(hosts.len(), 3);
        assert_eq!(hosts[0].address, "h1");
        assert_eq!(hosts[1].address, "h2");
        assert_eq!(hosts[2].address, "h3");
    }

    #[test]
    fn test_parse_list_empty() {
        assert!(Host::parse_list("").is_empty());
        assert!(Host::parse_list(" , ").is_empty());
    }

    #[test]
    fn test_host_serialization() {
        let host = Host::named("10.0.0.1", "web-01");
        let json = serde_json::to_string(&host).unwrap();
        assert!(json.contains("\"address\":\"10.0.0.1\""));
        assert!(json.contains("\"name\":\"web-01\""));

        let back: Host = serde_json::from_str(&json).unwrap();
        assert_eq!(back, host);
    }
}
