use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `CAMKIT_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("CAMKIT_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !positive(self.geometry.arc_section_length) {
            return Err(ConfigError::Invalid(format!(
                "geometry.arc_section_length 必须为正数，当前为 {}",
                self.geometry.arc_section_length
            )));
        }
        if !positive(self.geometry.drill_marker_radius) {
            return Err(ConfigError::Invalid(format!(
                "geometry.drill_marker_radius 必须为正数，当前为 {}",
                self.geometry.drill_marker_radius
            )));
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 几何离散与刀路导入参数。
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeometryConfig {
    /// 圆弧离散时每段的目标弧长。
    #[serde(default = "GeometryConfig::default_arc_section_length")]
    pub arc_section_length: f64,
    /// 钻孔标记圆的半径。
    #[serde(default = "GeometryConfig::default_drill_marker_radius")]
    pub drill_marker_radius: f64,
}

impl GeometryConfig {
    fn default_arc_section_length() -> f64 {
        1.0
    }

    fn default_drill_marker_radius() -> f64 {
        4.0
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            arc_section_length: Self::default_arc_section_length(),
            drill_marker_radius: Self::default_drill_marker_radius(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// 图元没有图层时写入的图层名。
    #[serde(default = "ExportConfig::default_layer_fallback")]
    pub layer_fallback: String,
}

impl ExportConfig {
    fn default_layer_fallback() -> String {
        "0".to_string()
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            layer_fallback: Self::default_layer_fallback(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("配置无效: {0}")]
    Invalid(String),
}
