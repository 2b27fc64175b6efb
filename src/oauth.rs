//! OAuth 1.0a（RSA-SHA1）のリクエスト署名
//!
//! JIRA Server / Data Center のアプリケーションリンクで発行された
//! アクセストークンと秘密鍵を使い、リクエストごとに `Authorization` ヘッダーを作る。

use std::fmt;

use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha1::{Digest, Sha1};
use url::Url;

use crate::error::{Error, Result};

pub const SIGNATURE_METHOD: &str = "RSA-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// 委任アクセス用の資格情報
#[derive(Clone)]
pub struct OAuthCredentials {
    pub access_token: String,
    pub access_token_secret: String,
    pub consumer_key: String,
    /// PEM形式の秘密鍵（PKCS#8 または PKCS#1）
    pub private_key_pem: String,
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .field("consumer_key", &self.consumer_key)
            .field("private_key_pem", &"<redacted>")
            .finish()
    }
}

/// 署名に使う一時値（nonce と timestamp）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce {
    pub nonce: String,
    pub timestamp: i64,
}

impl Nonce {
    pub fn generate() -> Self {
        Self {
            nonce: uuid::Uuid::new_v4().simple().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Clone)]
pub struct OAuthSigner {
    consumer_key: String,
    access_token: String,
    key: RsaPrivateKey,
}

impl fmt::Debug for OAuthSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthSigner")
            .field("consumer_key", &self.consumer_key)
            .finish_non_exhaustive()
    }
}

impl OAuthSigner {
    pub fn new(credentials: &OAuthCredentials) -> Result<Self> {
        if credentials.access_token.trim().is_empty() {
            return Err(Error::Credential("oauth_token is empty".to_string()));
        }
        if credentials.consumer_key.trim().is_empty() {
            return Err(Error::Credential("consumer_key is empty".to_string()));
        }

        let pem = credentials.private_key_pem.trim();
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| Error::Credential(format!("private key is not a valid RSA PEM key: {}", e)))?;

        Ok(Self {
            consumer_key: credentials.consumer_key.clone(),
            access_token: credentials.access_token.clone(),
            key,
        })
    }

    /// `Authorization` ヘッダーの値を作る
    pub fn authorization(&self, method: &str, url: &str) -> Result<String> {
        self.authorization_with(method, url, &Nonce::generate())
    }

    pub fn authorization_with(&self, method: &str, url: &str, nonce: &Nonce) -> Result<String> {
        let mut params = self.protocol_params(nonce);
        let base = signature_base_string(method, url, &params)?;
        let signature = self.sign(&base)?;
        params.push(("oauth_signature".to_string(), signature));

        let header = params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {}", header))
    }

    fn protocol_params(&self, nonce: &Nonce) -> Vec<(String, String)> {
        vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.nonce.clone()),
            ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp".to_string(), nonce.timestamp.to_string()),
            ("oauth_token".to_string(), self.access_token.clone()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ]
    }

    fn sign(&self, base: &str) -> Result<String> {
        let digest = Sha1::digest(base.as_bytes());
        let signature = self
            .key
            .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
            .map_err(|e| Error::Credential(format!("failed to sign request: {}", e)))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(signature))
    }
}

/// RFC 3986 の非予約文字以外をすべてエンコードする
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// 署名ベース文字列（RFC 5849 3.4.1）
///
/// クエリパラメータは署名対象に含め、URLからは取り除く。
pub fn signature_base_string(
    method: &str,
    url: &str,
    oauth_params: &[(String, String)],
) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|e| Error::InvalidConfiguration(format!("invalid request URL '{}': {}", url, e)))?;

    let mut params: Vec<(String, String)> = oauth_params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    params.extend(
        parsed
            .query_pairs()
            .map(|(k, v)| (encode(&k), encode(&v))),
    );
    params.sort();

    let normalized_params = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_url = parsed;
    base_url.set_query(None);
    base_url.set_fragment(None);

    Ok(format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(base_url.as_str()),
        encode(&normalized_params)
    ))
}
