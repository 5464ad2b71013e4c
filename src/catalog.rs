//! Endpoint catalog: download sources, upload sinks and latency hosts

use crate::error::{AppError, ErrorContext, Result};
use crate::types::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A remote URL used for one kind of probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Target URL
    pub url: String,

    /// Human-readable label
    pub label: String,

    /// Approximate size of the resource, informational only
    #[serde(default, rename = "size", skip_serializing_if = "Option::is_none")]
    pub approx_size: Option<String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
            approx_size: None,
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.approx_size = Some(size.into());
        self
    }

    /// Host part of the URL, if it parses
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Whether the endpoint is probed over unencrypted HTTP
    pub fn is_plain_http(&self) -> bool {
        self.url.starts_with("http://")
    }
}

/// Ordered candidate lists for each probe kind. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCatalog {
    pub download: Vec<Endpoint>,
    pub upload: Vec<Endpoint>,
    pub latency: Vec<Endpoint>,
}

/// On-disk form; lists that are left out fall back to the built-in ones
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    download: Option<Vec<Endpoint>>,
    #[serde(default)]
    upload: Option<Vec<Endpoint>>,
    #[serde(default)]
    latency: Option<Vec<Endpoint>>,
}

impl Default for EndpointCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl EndpointCatalog {
    /// Catalog compiled into the binary
    pub fn builtin() -> Self {
        let iso = "centos/7/isos/x86_64/CentOS-7-x86_64-DVD-2009.iso";
        let download = vec![
            Endpoint::new(format!("https://mirrors.aliyun.com/{}", iso), "Aliyun Mirror").with_size("100MB"),
            Endpoint::new("https://dldir1.qq.com/qqfile/qq/PCQQ9.7.17/QQ9.7.17.29225.exe", "Tencent QQ Download")
                .with_size("200MB"),
            Endpoint::new(format!("https://mirrors.163.com/{}", iso), "NetEase Mirror").with_size("100MB"),
            Endpoint::new(format!("https://mirrors.huaweicloud.com/{}", iso), "Huawei Cloud Mirror").with_size("100MB"),
            Endpoint::new(format!("https://mirrors.tuna.tsinghua.edu.cn/{}", iso), "Tsinghua TUNA Mirror")
                .with_size("100MB"),
            Endpoint::new(format!("https://mirrors.ustc.edu.cn/{}", iso), "USTC Mirror").with_size("100MB"),
            Endpoint::new(format!("http://mirrors.sohu.com/{}", iso), "Sohu Mirror").with_size("100MB"),
            Endpoint::new(
                "https://issuecdn.baidupcs.com/issue/netdisk/yunguanjia/BaiduNetdisk_7.17.0.12.exe",
                "Baidu Netdisk Client",
            )
            .with_size("100MB"),
        ];

        let upload = vec![
            Endpoint::new("https://httpbin.org/post", "httpbin"),
            Endpoint::new("https://postman-echo.com/post", "postman-echo"),
            Endpoint::new("http://httpbin.org/post", "httpbin-http"),
        ];

        let latency = [
            ("www.baidu.com", "Baidu"),
            ("www.qq.com", "Tencent"),
            ("www.taobao.com", "Taobao"),
            ("www.163.com", "NetEase"),
            ("www.jd.com", "JD"),
            ("www.aliyun.com", "Aliyun"),
            ("cloud.tencent.com", "Tencent Cloud"),
            ("www.huaweicloud.com", "Huawei Cloud"),
            ("www.bilibili.com", "Bilibili"),
            ("www.douyin.com", "Douyin"),
        ]
        .iter()
        .map(|(host, label)| Endpoint::new(normalize_latency_url(host), *label))
        .collect();

        Self {
            download,
            upload,
            latency,
        }
    }

    /// Parse a catalog from JSON and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let builtin = Self::builtin();

        let mut catalog = Self {
            download: file.download.unwrap_or(builtin.download),
            upload: file.upload.unwrap_or(builtin.upload),
            latency: file.latency.unwrap_or(builtin.latency),
        };
        for endpoint in &mut catalog.latency {
            endpoint.url = normalize_latency_url(&endpoint.url);
        }

        catalog.validate()?;
        Ok(catalog)
    }

    /// Read a catalog JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read endpoint catalog {}", path.display()))?;
        Self::from_json_str(&content)
            .map_err(|e| AppError::config(format!("Invalid endpoint catalog {}: {}", path.display(), e)))
    }

    /// Load the catalog from an optional path, falling back to the built-in one
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    /// Check every list is non-empty and every URL is usable
    pub fn validate(&self) -> Result<()> {
        for (name, endpoints) in [
            ("download", &self.download),
            ("upload", &self.upload),
            ("latency", &self.latency),
        ] {
            if endpoints.is_empty() {
                return Err(AppError::validation(format!("The {} endpoint list is empty", name)));
            }

            let mut labels = HashSet::new();
            for endpoint in endpoints {
                if endpoint.label.trim().is_empty() {
                    return Err(AppError::validation(format!(
                        "Endpoint '{}' in the {} list has an empty label",
                        endpoint.url, name
                    )));
                }

                if !labels.insert(endpoint.label.trim()) {
                    return Err(AppError::validation(format!(
                        "Label '{}' appears twice in the {} list",
                        endpoint.label, name
                    )));
                }

                let parsed = url::Url::parse(&endpoint.url).map_err(|e| {
                    AppError::validation(format!("Invalid {} endpoint URL '{}': {}", name, endpoint.url, e))
                })?;

                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(AppError::validation(format!(
                        "Unsupported scheme '{}' for {} endpoint '{}'",
                        parsed.scheme(),
                        name,
                        endpoint.label
                    )));
                }

                if parsed.host_str().is_none() {
                    return Err(AppError::validation(format!(
                        "Endpoint '{}' has no host",
                        endpoint.url
                    )));
                }
            }
        }

        Ok(())
    }

    /// Candidates for a throughput direction
    pub fn endpoints(&self, direction: Direction) -> &[Endpoint] {
        match direction {
            Direction::Download => &self.download,
            Direction::Upload => &self.upload,
        }
    }

    /// Iterate every endpoint of every list
    pub fn all_endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.download.iter().chain(&self.upload).chain(&self.latency)
    }

    /// Pretty JSON of the catalog, in the same format `from_json_str` reads
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Bare host names are probed over plain HTTP
pub fn normalize_latency_url(host: &str) -> String {
    let host = host.trim();
    let lowered = host.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}
