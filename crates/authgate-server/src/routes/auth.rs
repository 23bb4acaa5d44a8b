//! The `/auth` endpoint
//!
//! Responses:
//! - 400 `Missing 'groups' parameter` when `groups` is given more than once
//! - 401 with a Basic challenge when credentials are absent or rejected
//! - 500 `Internal server error` when the directory could not be consulted
//! - 200 with an empty body when the request may pass

use authgate_auth::Verdict;
use authgate_core::metrics as names;
use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use metrics::counter;
use tracing::debug;

use crate::server::AppState;

const GROUPS_PARAM: &str = "groups";

/// Credentials from an `Authorization: Basic ...` header
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub user: String,
    pub pass: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

impl BasicCredentials {
    /// `None` when the header is missing or malformed
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("Basic") {
            return None;
        }

        let decoded = BASE64.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, pass) = decoded.split_once(':')?;

        Some(Self {
            user: user.to_string(),
            pass: pass.to_string(),
        })
    }
}

/// Extra groups requested through the query string.
///
/// `None` when `groups` appears more than once. A single occurrence is split
/// on `,` as is, so `groups=` asks for the group named `""`.
pub fn requested_groups(query: Option<&str>) -> Option<Vec<String>> {
    let query = query.unwrap_or_default();
    let mut values = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == GROUPS_PARAM)
        .map(|(_, value)| value.into_owned());

    let Some(value) = values.next() else {
        return Some(Vec::new());
    };
    if values.next().is_some() {
        return None;
    }

    Some(
        value
            .split(',')
            .map(str::to_string)
            .collect(),
    )
}

/// ANY /auth
pub async fn authenticate(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let Some(extra_groups) = requested_groups(query.as_deref()) else {
        debug!("rejecting request with repeated '{}' parameter", GROUPS_PARAM);
        return (StatusCode::BAD_REQUEST, "Missing 'groups' parameter").into_response();
    };

    let Some(credentials) = BasicCredentials::from_headers(&headers) else {
        debug!("request without Basic credentials");
        return challenge(&state);
    };

    let verdict = state
        .authenticator
        .authenticate(&credentials.user, &credentials.pass, &extra_groups)
        .await;

    counter!(names::AUTH_VERDICTS_TOTAL, "verdict" => verdict.as_str()).increment(1);
    debug!(user = %credentials.user, groups = ?extra_groups, verdict = %verdict, "authentication finished");

    match verdict {
        Verdict::Success => StatusCode::OK.into_response(),
        Verdict::Failed => challenge(&state),
        Verdict::Error => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

fn challenge(state: &AppState) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, state.challenge.clone())],
        "Unauthorized",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::router;
    use async_trait::async_trait;
    use authgate_auth::Authenticator;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        user: String,
        pass: String,
        extra_groups: Vec<String>,
    }

    struct MockAuthenticator {
        verdict: Verdict,
        calls: Mutex<Vec<Call>>,
    }

    impl MockAuthenticator {
        fn new(verdict: Verdict) -> Arc<Self> {
            Arc::new(Self {
                verdict,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Authenticator for MockAuthenticator {
        async fn authenticate(&self, user: &str, pass: &str, extra_groups: &[String]) -> Verdict {
            self.calls.lock().unwrap().push(Call {
                user: user.to_string(),
                pass: pass.to_string(),
                extra_groups: extra_groups.to_vec(),
            });
            self.verdict
        }
    }

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{}:{}", user, pass)))
    }

    async fn send(
        auther: Arc<MockAuthenticator>,
        realm: &str,
        uri: &str,
        authorization: Option<String>,
    ) -> (StatusCode, HeaderMap, String) {
        let state = AppState::new(auther, realm).unwrap();

        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }

        let response = router(state)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_authenticator_error() {
        let auther = MockAuthenticator::new(Verdict::Error);
        let (status, headers, body) = send(
            auther.clone(),
            "realm",
            "/auth?groups=g1,g2",
            Some(basic("username", "passwd")),
        )
        .await;

        assert_eq!(
            auther.calls(),
            vec![Call {
                user: "username".to_string(),
                pass: "passwd".to_string(),
                extra_groups: vec!["g1".to_string(), "g2".to_string()],
            }]
        );
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Internal server error");
        assert!(headers.get(header::WWW_AUTHENTICATE).is_none());
    }

    #[tokio::test]
    async fn test_bad_groups_parameter() {
        let auther = MockAuthenticator::new(Verdict::Error);
        let (status, _headers, body) =
            send(auther.clone(), "realm", "/auth?groups=a&groups=b", None).await;

        assert!(auther.calls().is_empty());
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Missing 'groups' parameter");
    }

    #[tokio::test]
    async fn test_bad_groups_parameter_wins_over_credentials() {
        let auther = MockAuthenticator::new(Verdict::Success);
        let (status, _headers, _body) = send(
            auther.clone(),
            "realm",
            "/auth?groups=a&groups=b",
            Some(basic("testuser", "testpasswd")),
        )
        .await;

        assert!(auther.calls().is_empty());
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_auth() {
        let auther = MockAuthenticator::new(Verdict::Error);
        let (status, headers, body) = send(auther.clone(), "test-realm", "/auth", None).await;

        assert!(auther.calls().is_empty());
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Unauthorized");
        assert_eq!(headers.get_all(header::WWW_AUTHENTICATE).iter().count(), 1);
        assert_eq!(
            headers.get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"test-realm\""
        );
    }

    #[tokio::test]
    async fn test_malformed_auth_is_treated_as_missing() {
        let auther = MockAuthenticator::new(Verdict::Success);

        for value in [
            "Basic not-base64!",
            "Bearer abc",
            "Basic dXNlcm5hbWU=",
            // 0xff ':' 'a', not UTF-8
            "Basic /zph",
        ] {
            let (status, headers, _body) =
                send(auther.clone(), "test-realm", "/auth", Some(value.to_string())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(headers.get(header::WWW_AUTHENTICATE).is_some());
        }
        assert!(auther.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unsuccessful_auth() {
        let auther = MockAuthenticator::new(Verdict::Failed);
        let (status, headers, body) = send(
            auther.clone(),
            "test-realm",
            "/auth?groups=addgrp",
            Some(basic("testuser", "testpasswd")),
        )
        .await;

        let calls = auther.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].user, "testuser");
        assert_eq!(calls[0].pass, "testpasswd");
        assert_eq!(calls[0].extra_groups, vec!["addgrp".to_string()]);

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Unauthorized");
        assert_eq!(headers.get_all(header::WWW_AUTHENTICATE).iter().count(), 1);
        assert_eq!(
            headers.get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"test-realm\""
        );
    }

    #[tokio::test]
    async fn test_successful_auth() {
        let auther = MockAuthenticator::new(Verdict::Success);
        let (status, headers, body) = send(
            auther.clone(),
            "test-realm",
            "/auth?groups=addgrp",
            Some(basic("testuser", "testpasswd")),
        )
        .await;

        let calls = auther.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].user, "testuser");
        assert_eq!(calls[0].pass, "testpasswd");
        assert_eq!(calls[0].extra_groups, vec!["addgrp".to_string()]);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "");
        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn test_password_may_contain_colons() {
        let auther = MockAuthenticator::new(Verdict::Success);
        let (status, _headers, _body) =
            send(auther.clone(), "realm", "/auth", Some(basic("user", "pa:ss"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(auther.calls()[0].pass, "pa:ss");
        assert!(auther.calls()[0].extra_groups.is_empty());
    }

    #[tokio::test]
    async fn test_empty_groups_value_still_reaches_authenticator() {
        let auther = MockAuthenticator::new(Verdict::Failed);
        let (status, _headers, _body) = send(
            auther.clone(),
            "realm",
            "/auth?groups=",
            Some(basic("testuser", "testpasswd")),
        )
        .await;

        assert_eq!(auther.calls()[0].extra_groups, vec![String::new()]);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_requested_groups() {
        assert_eq!(requested_groups(None), Some(vec![]));
        assert_eq!(requested_groups(Some("")), Some(vec![]));
        assert_eq!(requested_groups(Some("other=1")), Some(vec![]));
        assert_eq!(requested_groups(Some("groups=")), Some(vec![String::new()]));
        assert_eq!(
            requested_groups(Some("groups=,")),
            Some(vec![String::new(), String::new()])
        );
        assert_eq!(
            requested_groups(Some("groups=a,,b")),
            Some(vec!["a".to_string(), String::new(), "b".to_string()])
        );
        assert_eq!(
            requested_groups(Some("groups=b,a&x=1")),
            Some(vec!["b".to_string(), "a".to_string()])
        );
        assert_eq!(
            requested_groups(Some("groups=a%2Cb")),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(requested_groups(Some("groups=a&groups=b")), None);
        assert_eq!(requested_groups(Some("groups=a&groups=a")), None);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = BasicCredentials {
            user: "alice".to_string(),
            pass: "secret".to_string(),
        };
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("secret"));
    }
}
