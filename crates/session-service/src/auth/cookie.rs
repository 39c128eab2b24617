//! Session cookie building and credential extraction.
//!
//! A bearer `Authorization` header wins over the cookie when both are sent.

use crate::config::CookieSettings;
use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use common::jwt::SESSION_TTL_SECONDS;

/// Where a presented credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Bearer,
    Cookie,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Bearer => "bearer",
            CredentialSource::Cookie => "cookie",
        }
    }
}

/// `Set-Cookie` value carrying a freshly issued session token.
///
/// # Errors
///
/// Fails only if the token holds bytes that are not valid in a header.
pub fn session_cookie(
    settings: &CookieSettings,
    token: &str,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    HeaderValue::from_str(&render(settings, token, SESSION_TTL_SECONDS))
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
///
/// # Errors
///
/// Fails only if the configured cookie name is not header-safe.
pub fn clear_session_cookie(
    settings: &CookieSettings,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    HeaderValue::from_str(&render(settings, "", 0))
}

fn render(settings: &CookieSettings, value: &str, max_age: i64) -> String {
    let mut cookie = format!(
        "{}={value}; Path=/; HttpOnly; SameSite={}; Max-Age={max_age}",
        settings.name,
        settings.same_site.as_str()
    );
    if settings.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Pick the credential for this request: bearer header first, then cookie.
pub fn extract_credential(
    headers: &HeaderMap,
    cookie_name: &str,
) -> Option<(String, CredentialSource)> {
    if let Some(token) = bearer_token(headers) {
        return Some((token, CredentialSource::Bearer));
    }
    cookie_value(headers, cookie_name).map(|token| (token, CredentialSource::Cookie))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Value of the named cookie across every `Cookie` header.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, val)| key.trim() == name && !val.trim().is_empty())
        .map(|(_, val)| val.trim().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::SameSite;

    fn settings() -> CookieSettings {
        CookieSettings::default()
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(&settings(), "abc.def.ghi").unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "nb_auth=abc.def.ghi; Path=/; HttpOnly; SameSite=Lax; Max-Age=604800"
        );
    }

    #[test]
    fn test_secure_and_same_site_follow_settings() {
        let settings = CookieSettings {
            name: "sess".to_string(),
            secure: true,
            same_site: SameSite::None,
        };
        let cookie = session_cookie(&settings, "t").unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "sess=t; Path=/; HttpOnly; SameSite=None; Max-Age=604800; Secure"
        );
    }

    #[test]
    fn test_clear_cookie() {
        let cookie = clear_session_cookie(&settings()).unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "nb_auth=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
    }

    #[test]
    fn test_bearer_takes_precedence() {
        let h = headers(&[
            ("authorization", "Bearer from-header"),
            ("cookie", "nb_auth=from-cookie"),
        ]);
        assert_eq!(
            extract_credential(&h, "nb_auth"),
            Some(("from-header".to_string(), CredentialSource::Bearer))
        );
    }

    #[test]
    fn test_cookie_used_without_header() {
        let h = headers(&[("cookie", "theme=dark; nb_auth=tok; other=1")]);
        assert_eq!(
            extract_credential(&h, "nb_auth"),
            Some(("tok".to_string(), CredentialSource::Cookie))
        );
    }

    #[test]
    fn test_cookie_across_multiple_headers() {
        let h = headers(&[("cookie", "a=1"), ("cookie", "nb_auth=second")]);
        assert_eq!(
            extract_credential(&h, "nb_auth").map(|(t, _)| t),
            Some("second".to_string())
        );
    }

    #[test]
    fn test_empty_values_count_as_absent() {
        let h = headers(&[("authorization", "Bearer   "), ("cookie", "nb_auth=tok")]);
        assert_eq!(
            extract_credential(&h, "nb_auth").map(|(_, s)| s),
            Some(CredentialSource::Cookie)
        );

        let h = headers(&[("cookie", "nb_auth=")]);
        assert_eq!(extract_credential(&h, "nb_auth"), None);
    }

    #[test]
    fn test_non_bearer_scheme_falls_back_to_cookie() {
        let h = headers(&[("authorization", "Basic dXNlcjpwYXNz")]);
        assert_eq!(extract_credential(&h, "nb_auth"), None);
    }

    #[test]
    fn test_cookie_name_must_match_exactly() {
        let h = headers(&[("cookie", "nb_auth_old=stale")]);
        assert_eq!(extract_credential(&h, "nb_auth"), None);
    }
}
