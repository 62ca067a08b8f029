//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BEE__*` 覆盖（双下划线表示嵌套，如 `BEE__LLM__PROVIDER=openai`）。
//! API Key 等凭据不进配置文件，由 OPENAI_API_KEY / DEEPSEEK_API_KEY 提供；子进程凭据经 [[service.env]] 透传。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub service: ServiceSection,
    pub classifier: ClassifierSection,
    pub prompts: PromptsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock；没有对应 API Key 时回退到 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmDeepSeekSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [service] 段：数据服务子进程的启动方式与超时
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    #[serde(default = "default_service_command")]
    pub command: String,
    #[serde(default = "default_service_args")]
    pub args: Vec<String>,
    /// 子进程工作目录；未设置时继承当前目录
    #[serde(default = "default_service_working_dir")]
    pub working_dir: Option<PathBuf>,
    /// 追加给子进程的环境变量（凭据等，对核心不透明）；子进程同时继承当前进程的环境
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// 是否把子进程 stderr 透传到当前终端
    #[serde(default)]
    pub inherit_stderr: bool,
    /// initialize + tools/list 每一步的超时（秒）
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_client_version")]
    pub client_version: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            command: default_service_command(),
            args: default_service_args(),
            working_dir: default_service_working_dir(),
            env: Vec::new(),
            inherit_stderr: false,
            handshake_timeout_secs: default_handshake_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            client_name: default_client_name(),
            client_version: default_client_version(),
        }
    }
}

/// 一个子进程环境变量；用数组表而非 map，变量名大小写原样保留
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

fn default_service_command() -> String {
    "node".to_string()
}

fn default_service_args() -> Vec<String> {
    vec!["index.js".to_string()]
}

fn default_service_working_dir() -> Option<PathBuf> {
    Some(PathBuf::from("amazon-mcp-server"))
}

fn default_handshake_timeout_secs() -> u64 {
    10
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_client_name() -> String {
    "bee-dispatch".to_string()
}

fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// [classifier] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierSection {
    /// LLM 返回非法标签时的重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

fn default_max_retries() -> u32 {
    1
}

/// [prompts] 段：各角色 system prompt 覆盖，未设置时用内置文本
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PromptsSection {
    pub classifier: Option<String>,
    pub therapist: Option<String>,
    pub logical: Option<String>,
    pub data_query: Option<String>,
}

/// 从 config 目录加载配置，环境变量 BEE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 BEE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BEE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.service.command, "node");
        assert_eq!(cfg.service.args, vec!["index.js"]);
        assert_eq!(cfg.service.tool_timeout_secs, 30);
        assert_eq!(cfg.classifier.max_retries, 1);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[service]
command = "bee-seller-stub"
args = []
tool_timeout_secs = 5

[[service.env]]
name = "SP_API_REGION"
value = "eu-west-1"

[classifier]
max_retries = 2
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.service.command, "bee-seller-stub");
        assert!(cfg.service.args.is_empty());
        assert_eq!(cfg.service.tool_timeout_secs, 5);
        assert_eq!(cfg.service.handshake_timeout_secs, 10);
        assert_eq!(
            cfg.service.env,
            vec![EnvVar {
                name: "SP_API_REGION".to_string(),
                value: "eu-west-1".to_string(),
            }]
        );
        assert_eq!(cfg.classifier.max_retries, 2);
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
    }
}
