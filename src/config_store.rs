use ini::{Ini, ParseOption};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::client::{Auth, JiraConfig};
use crate::error::{Error, Result};
use crate::field_rule::FieldRuleSet;
use crate::oauth::{OAuthCredentials, OAuthSigner};

/// 設定ディレクトリを上書きする環境変数
pub const CONFIG_DIR_ENV: &str = "JIRA_EXPORT_CONFIG_DIR";
pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const CREDENTIALS_FILE: &str = ".oauthconfig";
pub const EXPORT_CONFIG_FILE: &str = "issue_export.config";
pub const DEFAULT_PAGE_SIZE: u32 = 50;

const FIELD_SECTIONS: [&str; 2] = ["issue_field_config_section", "issue_field_config"];
const JQL_SECTION: &str = "jql_section";
const EXPORT_SECTION: &str = "export";
const OAUTH_SECTION: &str = "oauth_token_config";
const PAT_SECTION: &str = "pat_config";
const SERVER_SECTION: &str = "server_info";

/// 形が合わないフィールド値の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionPolicy {
    /// 空文字列にして警告を出し、続行する
    #[default]
    Lenient,
    /// エクスポート全体を失敗させる
    Strict,
}

/// `[export]` セクションの任意設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub page_size: u32,
    pub policy: ProjectionPolicy,
    /// 先頭に見出し行を出力するか
    pub header: bool,
    pub output_file: Option<PathBuf>,
    pub console: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            policy: ProjectionPolicy::Lenient,
            header: false,
            output_file: None,
            console: true,
        }
    }
}

/// エクスポート定義（JQL・フィールドルール・出力設定）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub jql: String,
    pub rules: FieldRuleSet,
    pub options: ExportOptions,
}

impl ExportConfig {
    pub fn parse(contents: &str) -> Result<Self> {
        let ini = load_ini(contents, EXPORT_CONFIG_FILE)?;

        let fields = FIELD_SECTIONS
            .iter()
            .find_map(|name| ini.section(Some(*name)))
            .ok_or_else(|| {
                Error::ConfigurationMissing(format!(
                    "[{}] section not found in {}",
                    FIELD_SECTIONS[0], EXPORT_CONFIG_FILE
                ))
            })?;
        let rules = FieldRuleSet::from_entries(fields.iter())?;

        let jql = ini
            .get_from(Some(JQL_SECTION), "jql")
            .map(str::trim)
            .filter(|jql| !jql.is_empty())
            .ok_or_else(|| {
                Error::ConfigurationMissing(format!("[{}] jql is not set", JQL_SECTION))
            })?
            .to_string();

        let options = parse_options(&ini)?;

        Ok(Self { jql, rules, options })
    }
}

fn parse_options(ini: &Ini) -> Result<ExportOptions> {
    let mut options = ExportOptions::default();
    let Some(section) = ini.section(Some(EXPORT_SECTION)) else {
        return Ok(options);
    };

    if let Some(value) = section.get("page_size") {
        options.page_size = value
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                Error::InvalidConfiguration(format!(
                    "[{}] page_size must be a positive integer, got '{}'",
                    EXPORT_SECTION, value
                ))
            })?;
    }
    if let Some(value) = section.get("strict") {
        options.policy = if parse_bool("strict", value)? {
            ProjectionPolicy::Strict
        } else {
            ProjectionPolicy::Lenient
        };
    }
    if let Some(value) = section.get("header") {
        options.header = parse_bool("header", value)?;
    }
    if let Some(value) = section.get("console") {
        options.console = parse_bool("console", value)?;
    }
    if let Some(value) = section.get("output_file").map(str::trim).filter(|v| !v.is_empty()) {
        options.output_file = Some(PathBuf::from(value));
    }

    if !options.console && options.output_file.is_none() {
        return Err(Error::InvalidConfiguration(format!(
            "[{}] console is disabled and no output_file is set",
            EXPORT_SECTION
        )));
    }

    Ok(options)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(Error::InvalidConfiguration(format!(
            "[{}] {} must be a boolean, got '{}'",
            EXPORT_SECTION, key, other
        ))),
    }
}

/// 資格情報ファイルの内容（秘密鍵ファイルはまだ読んでいない状態）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    OAuth {
        access_token: String,
        access_token_secret: String,
        consumer_key: String,
        private_key_file: String,
    },
    PersonalAccessToken(String),
}

/// `.oauthconfig` の内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialsFile {
    pub base_url: String,
    pub source: CredentialSource,
}

impl CredentialsFile {
    pub fn parse(contents: &str) -> Result<Self> {
        let ini = load_ini(contents, CREDENTIALS_FILE)?;

        let base_url = ini
            .get_from(Some(SERVER_SECTION), "jira_base_url")
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                Error::ConfigurationMissing(format!("[{}] jira_base_url is not set", SERVER_SECTION))
            })?
            .to_string();

        let source = if let Some(section) = ini.section(Some(OAUTH_SECTION)) {
            let required = |key: &str| -> Result<String> {
                section
                    .get(key)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::Credential(format!("[{}] {} is not set", OAUTH_SECTION, key))
                    })
            };
            CredentialSource::OAuth {
                access_token: required("oauth_token")?,
                access_token_secret: required("oauth_token_secret")?,
                consumer_key: required("consumer_key")?,
                private_key_file: required("user_private_key_file_name")?,
            }
        } else if let Some(token) = ini
            .get_from(Some(PAT_SECTION), "personal_access_token")
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            CredentialSource::PersonalAccessToken(token.to_string())
        } else {
            return Err(Error::Credential(format!(
                "neither [{}] nor [{}] is configured in {}",
                OAUTH_SECTION, PAT_SECTION, CREDENTIALS_FILE
            )));
        };

        Ok(Self { base_url, source })
    }
}

/// JQLに含まれる引用符やバックスラッシュはそのまま残す
fn load_ini(contents: &str, file_name: &str) -> Result<Ini> {
    let option = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    Ini::load_from_str_opt(contents, option)
        .map_err(|e| Error::InvalidConfiguration(format!("{} is malformed: {}", file_name, e)))
}

/// 固定レイアウトの設定ディレクトリ
///
/// ```text
/// config/
///   .oauthconfig
///   issue_export.config
///   <秘密鍵ファイル>
/// ```
pub struct FileConfigStore {
    /// 設定ディレクトリのパス
    config_dir: PathBuf,
}

impl FileConfigStore {
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    /// 環境変数、なければカレントディレクトリの `config/` を使う
    pub fn from_env() -> Self {
        let dir = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
        Self::new(dir)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn credentials_path(&self) -> PathBuf {
        self.config_dir.join(CREDENTIALS_FILE)
    }

    fn export_config_path(&self) -> PathBuf {
        self.config_dir.join(EXPORT_CONFIG_FILE)
    }

    async fn read_config_file(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).await.map_err(|e| {
            Error::ConfigurationMissing(format!("cannot read {}: {}", path.display(), e))
        })
    }

    pub async fn load_export_config(&self) -> Result<ExportConfig> {
        let contents = self.read_config_file(&self.export_config_path()).await?;
        ExportConfig::parse(&contents)
    }

    /// 資格情報を読み込み、JIRA接続設定を組み立てる
    pub async fn load_jira_config(&self) -> Result<JiraConfig> {
        let contents = self.read_config_file(&self.credentials_path()).await?;
        let file = CredentialsFile::parse(&contents)?;

        let auth = match file.source {
            CredentialSource::OAuth {
                access_token,
                access_token_secret,
                consumer_key,
                private_key_file,
            } => {
                let key_path = self.config_dir.join(&private_key_file);
                let private_key_pem = fs::read_to_string(&key_path).await.map_err(|e| {
                    Error::Credential(format!(
                        "cannot read private key file {}: {}",
                        key_path.display(),
                        e
                    ))
                })?;
                let credentials = OAuthCredentials {
                    access_token,
                    access_token_secret,
                    consumer_key,
                    private_key_pem,
                };
                Auth::OAuth(OAuthSigner::new(&credentials)?)
            }
            CredentialSource::PersonalAccessToken(token) => Auth::Bearer { token },
        };

        JiraConfig::new(file.base_url, auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_rule::Projection;
    use tempfile::TempDir;

    const EXPORT_CONFIG: &str = r#"
[issue_field_config_section]
# <jira_internal_field_name>=<display_field_name>,<field_type>,<output_type>,<access_key>
summary=Issue Summary,single,plain,
priority=Priority,single,json,name
components=Component/s,multi,json,name
labels=Labels,multi,plain,
customfield_40=Si,cascade,json,value

[jql_section]
jql=issuekey in (DUM-1,DUM-32)
"#;

    const CREDENTIALS: &str = r#"
[oauth_token_config]
oauth_token=token
oauth_token_secret=secret
consumer_key=jira-export
user_private_key_file_name=oauth.pem

[server_info]
jira_base_url=https://jira.example.com
"#;

    #[test]
    fn test_parse_export_config() {
        let config = ExportConfig::parse(EXPORT_CONFIG).unwrap();

        assert_eq!(config.jql, "issuekey in (DUM-1,DUM-32)");
        assert_eq!(
            config.rules.internal_names(),
            vec!["summary", "priority", "components", "labels", "customfield_40"]
        );
        assert_eq!(
            config.rules.get("customfield_40").unwrap().projection,
            Projection::Cascade { key: "value".to_string() }
        );
        assert_eq!(config.options, ExportOptions::default());
    }

    #[test]
    fn test_parse_export_config_legacy_section_and_case() {
        let contents = "[issue_field_config]\nCustomField_13=xyz,multi,json,value\n[jql_section]\njql=project = DUM\n";

        let config = ExportConfig::parse(contents).unwrap();

        // キーの大文字小文字は保持される
        assert_eq!(config.rules.internal_names(), vec!["CustomField_13"]);
    }

    #[test]
    fn test_parse_export_options() {
        let contents = format!(
            "{}\n[export]\npage_size=100\nstrict=true\nheader=yes\noutput_file=out/export.csv\nconsole=false\n",
            EXPORT_CONFIG
        );

        let options = ExportConfig::parse(&contents).unwrap().options;

        assert_eq!(options.page_size, 100);
        assert_eq!(options.policy, ProjectionPolicy::Strict);
        assert!(options.header);
        assert!(!options.console);
        assert_eq!(options.output_file, Some(PathBuf::from("out/export.csv")));
    }

    #[test]
    fn test_parse_export_options_errors() {
        for extra in ["page_size=0", "page_size=many", "strict=maybe", "console=false"] {
            let contents = format!("{}\n[export]\n{}\n", EXPORT_CONFIG, extra);
            let result = ExportConfig::parse(&contents);
            assert!(
                matches!(result, Err(Error::InvalidConfiguration(_))),
                "expected error for {}",
                extra
            );
        }
    }

    #[test]
    fn test_parse_export_config_missing_sections() {
        let no_fields = ExportConfig::parse("[jql_section]\njql=project = DUM\n");
        assert!(matches!(no_fields, Err(Error::ConfigurationMissing(_))));

        let no_jql = ExportConfig::parse("[issue_field_config_section]\nsummary=Summary,single,plain,\n");
        match no_jql.unwrap_err() {
            Error::ConfigurationMissing(msg) => assert!(msg.contains("jql")),
            other => panic!("Expected ConfigurationMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_export_config_bad_rule() {
        let contents = "[issue_field_config_section]\npriority=Priority,single,json\n[jql_section]\njql=project = DUM\n";
        let result = ExportConfig::parse(contents);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_parse_credentials_file() {
        let file = CredentialsFile::parse(CREDENTIALS).unwrap();

        assert_eq!(file.base_url, "https://jira.example.com");
        assert_eq!(
            file.source,
            CredentialSource::OAuth {
                access_token: "token".to_string(),
                access_token_secret: "secret".to_string(),
                consumer_key: "jira-export".to_string(),
                private_key_file: "oauth.pem".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_credentials_file_with_personal_access_token() {
        let contents = "[pat_config]\npersonal_access_token=pat\n[server_info]\njira_base_url=https://jira.example.com\n";

        let file = CredentialsFile::parse(contents).unwrap();

        assert_eq!(file.source, CredentialSource::PersonalAccessToken("pat".to_string()));
    }

    #[test]
    fn test_parse_credentials_file_errors() {
        let incomplete = CREDENTIALS.replace("consumer_key=jira-export", "");
        match CredentialsFile::parse(&incomplete).unwrap_err() {
            Error::Credential(msg) => assert!(msg.contains("consumer_key")),
            other => panic!("Expected Credential error, got {:?}", other),
        }

        let no_token = "[server_info]\njira_base_url=https://jira.example.com\n";
        assert!(matches!(CredentialsFile::parse(no_token), Err(Error::Credential(_))));

        let no_server = CREDENTIALS.replace("jira_base_url=https://jira.example.com", "");
        assert!(matches!(
            CredentialsFile::parse(&no_server),
            Err(Error::ConfigurationMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_directory() {
        // Given: PATを使う設定ディレクトリ
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CREDENTIALS_FILE),
            "[pat_config]\npersonal_access_token=pat\n[server_info]\njira_base_url=https://jira.example.com/\n",
        )
        .unwrap();
        std::fs::write(temp_dir.path().join(EXPORT_CONFIG_FILE), EXPORT_CONFIG).unwrap();
        let store = FileConfigStore::new(temp_dir.path());

        // When: 両方の設定を読み込む
        let jira_config = store.load_jira_config().await.unwrap();
        let export_config = store.load_export_config().await.unwrap();

        // Then: 正しく読み込まれる
        assert_eq!(jira_config.base_url, "https://jira.example.com");
        assert!(matches!(jira_config.auth, Auth::Bearer { .. }));
        assert_eq!(export_config.rules.len(), 5);
    }

    #[tokio::test]
    async fn test_missing_private_key_is_credential_error() {
        // Given: 秘密鍵ファイルがない設定ディレクトリ
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CREDENTIALS_FILE), CREDENTIALS).unwrap();
        let store = FileConfigStore::new(temp_dir.path());

        // When: 接続設定を読み込む
        let result = store.load_jira_config().await;

        // Then: 資格情報エラー
        match result.unwrap_err() {
            Error::Credential(msg) => assert!(msg.contains("oauth.pem")),
            other => panic!("Expected Credential error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_export_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileConfigStore::new(temp_dir.path());

        let result = store.load_export_config().await;

        assert!(matches!(result, Err(Error::ConfigurationMissing(_))));
    }
}
