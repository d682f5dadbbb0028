use std::collections::HashMap;

use axum::{
    async_trait, extract,
    http::{header, request::Parts, HeaderMap, Uri},
};
use axum_extra::extract::CookieJar;
use ulid::Ulid;

use crate::settings::{SESSION_ID_KEY, TOKEN_QUERY_KEY};

use super::system::{AppError, AuthenticatedUser};

/// セッション
#[derive(Clone, Debug)]
pub struct Session {
    pub session_id: Ulid,
    pub user: AuthenticatedUser,
}

// ハンドラの引数で指定できるようにするための処理
#[async_trait]
impl<S> extract::FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<super::ReqScopedState>()
            .and_then(|state| state.session.clone())
            .ok_or(AppError::Forbidden(None))
    }
}

/// リクエストから資格情報を取り出す.
///
/// `Authorization: token <t>` (`Bearer` も可), クエリの `token`, セッションクッキーの順に見る.
pub fn find_credential(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_authorization)
    {
        return Some(token.to_string());
    }

    if let Ok(extract::Query(query)) = extract::Query::<HashMap<String, String>>::try_from_uri(uri) {
        if let Some(token) = query.get(TOKEN_QUERY_KEY).filter(|t| !t.is_empty()) {
            return Some(token.clone());
        }
    }

    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_ID_KEY)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_authorization(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();

    let known = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    (known && !token.is_empty()).then_some(token)
}

/// sessionを探す
pub fn find_session(credential: &str, server_token: &str) -> Option<Session> {
    if server_token.is_empty() || !constant_time_eq(credential.as_bytes(), server_token.as_bytes())
    {
        return None;
    }

    Some(Session {
        session_id: Ulid::new(),
        user: AuthenticatedUser {
            id: "token".to_string(),
            name: "anonymous".to_string(),
        },
    })
}

/// 一致する位置によって処理時間が変わらない比較. 長さの違いは隠さない.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
