use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "content-type, x-request-id";
const EXPOSED_HEADERS: &str = "x-request-id";
const PREFLIGHT_MAX_AGE_SECONDS: &str = "600";

/// Origins allowed to call the API from a browser. `*` in the list allows any origin.
#[derive(Clone, Debug)]
pub struct CorsPolicy {
    allow_any_origin: bool,
    allowed_origins: Arc<[String]>,
}

impl CorsPolicy {
    pub fn from_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allow_any_origin = false;
        let mut allowed_origins = Vec::new();
        for origin in origins {
            let origin = origin.as_ref().trim().trim_end_matches('/');
            if origin == "*" {
                allow_any_origin = true;
            } else if !origin.is_empty() {
                allowed_origins.push(origin.to_string());
            }
        }

        Self {
            allow_any_origin,
            allowed_origins: allowed_origins.into(),
        }
    }

    pub fn allow_any() -> Self {
        Self::from_origins(["*"])
    }

    fn allow_origin_value(&self, origin: Option<&str>) -> Option<HeaderValue> {
        if self.allow_any_origin {
            return Some(HeaderValue::from_static("*"));
        }

        let origin = origin?;
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == origin)
            .then(|| HeaderValue::from_str(origin).ok())
            .flatten()
    }
}

pub(super) async fn cors_middleware(
    State(policy): State<CorsPolicy>,
    req: Request,
    next: Next,
) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let allow_origin = policy.allow_origin_value(origin.as_deref());

    let is_preflight = req.method() == Method::OPTIONS
        && req
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
    if is_preflight {
        let mut response = (StatusCode::NO_CONTENT, Body::empty()).into_response();
        if let Some(allow_origin) = allow_origin {
            let headers = response.headers_mut();
            apply_origin_headers(headers, allow_origin, policy.allow_any_origin);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            );
            headers.insert(
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECONDS),
            );
        }
        return response;
    }

    let mut response = next.run(req).await;
    if let Some(allow_origin) = allow_origin {
        let headers = response.headers_mut();
        apply_origin_headers(headers, allow_origin, policy.allow_any_origin);
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSED_HEADERS),
        );
    }
    response
}

fn apply_origin_headers(headers: &mut HeaderMap, allow_origin: HeaderValue, allow_any: bool) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
    if !allow_any {
        headers.append(header::VARY, HeaderValue::from_static("origin"));
    }
}
