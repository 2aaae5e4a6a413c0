//! HTTP 요청 metrics middleware.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{
    normalize_path, record_http_duration, record_http_request, record_http_response,
};

/// HTTP 메트릭을 수집하는 미들웨어 레이어.
///
/// - `http_requests_total`: 총 요청 수 (method, path 라벨)
/// - `http_responses_total`: 총 응답 수 (method, path, status 라벨)
/// - `http_request_duration_seconds`: 요청 처리 시간 히스토그램
///
/// 요청 제한에 걸린 429 응답도 집계되도록 rate limit 레이어 바깥에 둡니다.
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    record_http_request(&method, &path);

    let response = next.run(request).await;

    record_http_response(&method, &path, response.status().as_u16());
    record_http_duration(&method, &path, start.elapsed().as_secs_f64());

    response
}
