use std::{
    net::{AddrParseError, SocketAddr},
    path::{Path, PathBuf},
};

use ulid::Ulid;

use crate::settings::{DEFAULT_BASE_URL, DEFAULT_BIND_ADDR, PUBLIC_DIR_NAME};

use super::web_app::RESERVED_PATH_CHARS;

pub const BIND_ADDR_KEY: &str = "ZETHUS_BIND_ADDR";
pub const BASE_URL_KEY: &str = "ZETHUS_BASE_URL";
pub const TOKEN_KEY: &str = "ZETHUS_TOKEN";
pub const STATIC_ROOT_KEY: &str = "ZETHUS_STATIC_ROOT";
pub const ALLOW_ORIGINS_KEY: &str = "ZETHUS_ALLOW_ORIGINS";

/// プロセス起動時に一度だけ読む設定.
#[derive(Clone, Debug)]
pub struct Env {
    pub bind_addr: SocketAddr,
    pub base_url: String,
    /// サーバートークン. このトークンを提示したリクエストが認証済みになる.
    pub token: String,
    /// 環境変数で与えられず、起動時に生成されたトークンかどうか
    pub token_generated: bool,
    pub static_root: PathBuf,
    /// CORSで許可するorigin. 空ならクロスオリジンのリクエストは許可しない.
    pub allow_origins: Vec<String>,
}

#[derive(Debug)]
pub enum EnvError {
    InvalidBindAddr(String, AddrParseError),
    /// ルーターのパス構文と衝突する文字を含む
    InvalidBaseUrl(String, char),
}

impl std::fmt::Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvError::InvalidBindAddr(value, e) => {
                write!(f, "{BIND_ADDR_KEY} must be a socket address, got {value:?}: {e}")
            }
            EnvError::InvalidBaseUrl(value, c) => {
                write!(f, "{BASE_URL_KEY} must not contain {c:?}, got {value:?}")
            }
        }
    }
}

impl std::error::Error for EnvError {}

impl Env {
    pub fn new() -> Result<Env, EnvError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 環境変数の引き方を差し替えられるようにしたもの.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Env, EnvError> {
        let bind_addr = lookup(BIND_ADDR_KEY).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse()
            .map_err(|e| EnvError::InvalidBindAddr(bind_addr.clone(), e))?;

        let base_url = lookup(BASE_URL_KEY).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if let Some(c) = base_url.chars().find(|c| RESERVED_PATH_CHARS.contains(c)) {
            return Err(EnvError::InvalidBaseUrl(base_url, c));
        }

        let (token, token_generated) = match lookup(TOKEN_KEY).filter(|t| !t.is_empty()) {
            Some(token) => (token, false),
            None => (Ulid::new().to_string(), true),
        };

        let static_root = lookup(STATIC_ROOT_KEY)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_static_root);

        let allow_origins = lookup(ALLOW_ORIGINS_KEY)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Env {
            bind_addr,
            base_url,
            token,
            token_generated,
            static_root,
            allow_origins,
        })
    }
}

/// クレートのディレクトリ直下の `zethus` ディレクトリ
pub fn default_static_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(PUBLIC_DIR_NAME)
}
