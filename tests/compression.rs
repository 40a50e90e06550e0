use bytes::Bytes;
use http::header::{
    ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, VARY,
};
use http::{HeaderMap, Request, Response, StatusCode};
use http_body::{Body, Frame};
use http_body_util::{BodyExt, Full};
use http_buffered_compression::{
    AdvertiseEncoding, Algorithm, BoxError, CompressionError, CompressionLayer,
    EligibilityList, EligibilityRule,
};
use std::convert::Infallible;
use std::io::{self, Read};
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, ServiceExt, service_fn};

/// Runs one request through a layer wrapping a handler that answers with
/// `body` and the given response headers.
async fn run(
    layer: CompressionLayer,
    accept_encoding: Option<&'static str>,
    response_headers: &'static [(&'static str, &'static str)],
    body: &'static [u8],
) -> (HeaderMap, Bytes) {
    let (_, headers, body) =
        run_with_status(layer, accept_encoding, StatusCode::OK, response_headers, body).await;
    (headers, body)
}

/// Like [`run`], with the handler answering with `status`.
async fn run_with_status(
    layer: CompressionLayer,
    accept_encoding: Option<&'static str>,
    status: StatusCode,
    response_headers: &'static [(&'static str, &'static str)],
    body: &'static [u8],
) -> (StatusCode, HeaderMap, Bytes) {
    let handler = service_fn(move |_req: Request<()>| async move {
        let mut response = Response::builder().status(status);
        for (name, value) in response_headers {
            response = response.header(*name, *value);
        }
        Ok::<_, Infallible>(response.body(Full::new(Bytes::from_static(body))).unwrap())
    });

    let mut request = Request::builder();
    if let Some(value) = accept_encoding {
        request = request.header(ACCEPT_ENCODING, value);
    }
    let request = request.body(()).unwrap();

    let response = layer.layer(handler).oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let body = body.collect().await.unwrap().to_bytes();
    (parts.status, parts.headers, body)
}

fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::new();
    flate2::read::GzDecoder::new(data)
        .read_to_end(&mut decoded)
        .unwrap();
    decoded
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .map(|v| v.to_str().unwrap().parse().unwrap())
}

#[tokio::test]
async fn passthrough_without_accept_encoding() {
    let (headers, body) = run(
        CompressionLayer::new(),
        None,
        &[("content-type", "text/plain"), ("content-length", "11")],
        b"hello world",
    )
    .await;

    assert_eq!(&body[..], b"hello world");
    assert!(headers.get(CONTENT_ENCODING).is_none());
    assert!(headers.get(VARY).is_none());
    assert_eq!(content_length(&headers), Some(11));
}

#[tokio::test]
async fn passthrough_for_unsupported_encoding() {
    let (headers, body) = run(
        CompressionLayer::new(),
        Some("identity"),
        &[("content-type", "text/plain")],
        b"hello world",
    )
    .await;

    assert_eq!(&body[..], b"hello world");
    assert!(headers.get(CONTENT_ENCODING).is_none());
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn gzip_text_plain() {
    let (headers, body) = run(
        CompressionLayer::new(),
        Some("gzip"),
        &[("content-type", "text/plain"), ("content-length", "11")],
        b"hello world",
    )
    .await;

    assert_eq!(headers.get(CONTENT_ENCODING).unwrap(), "gzip");
    assert_eq!(headers.get(VARY).unwrap(), "accept-encoding");
    assert_eq!(content_length(&headers), Some(body.len()));
    assert_ne!(body.len(), 11);
    assert_eq!(gunzip(&body), b"hello world");
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn first_supported_token_is_used() {
    let (headers, body) = run(
        CompressionLayer::new(),
        Some("br, gzip, deflate"),
        &[("content-type", "application/json")],
        br#"{"message":"hello"}"#,
    )
    .await;

    assert_eq!(headers.get(CONTENT_ENCODING).unwrap(), "gzip");
    assert_eq!(gunzip(&body), br#"{"message":"hello"}"#);
}

#[tokio::test]
#[cfg(feature = "deflate")]
async fn deflate_text_html() {
    let html = b"<html><body><p>hello</p><p>hello</p><p>hello</p></body></html>";
    let (headers, body) = run(
        CompressionLayer::new(),
        Some("deflate"),
        &[("content-type", "text/html; charset=utf-8")],
        html,
    )
    .await;

    assert_eq!(headers.get(CONTENT_ENCODING).unwrap(), "deflate");
    assert_eq!(content_length(&headers), Some(body.len()));

    let mut decoded = Vec::new();
    flate2::read::DeflateDecoder::new(&body[..])
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, html);
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn ineligible_content_type_is_untouched() {
    let (headers, body) = run(
        CompressionLayer::new(),
        Some("gzip"),
        &[("content-type", "image/png"), ("content-length", "8")],
        b"PNG data",
    )
    .await;

    assert_eq!(&body[..], b"PNG data");
    assert!(headers.get(CONTENT_ENCODING).is_none());
    assert_eq!(content_length(&headers), Some(8));
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn advertise_on_negotiation_keeps_header_for_ineligible_body() {
    // Compatibility mode: the encoding is announced before the content type
    // is known, so an ineligible body goes out raw but labelled gzip.
    let layer = CompressionLayer::new().advertise_encoding(AdvertiseEncoding::OnNegotiation);
    let (headers, body) = run(
        layer,
        Some("gzip"),
        &[("content-type", "image/png")],
        b"PNG data",
    )
    .await;

    assert_eq!(&body[..], b"PNG data");
    assert_eq!(headers.get(CONTENT_ENCODING).unwrap(), "gzip");
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn advertise_on_negotiation_compresses_eligible_body() {
    let layer = CompressionLayer::new().advertise_encoding(AdvertiseEncoding::OnNegotiation);
    let (headers, body) = run(
        layer,
        Some("gzip"),
        &[("content-type", "text/css")],
        b"a{color:red}",
    )
    .await;

    assert_eq!(
        headers.get_all(CONTENT_ENCODING).iter().collect::<Vec<_>>(),
        vec!["gzip"]
    );
    assert_eq!(content_length(&headers), Some(body.len()));
    assert_eq!(gunzip(&body), b"a{color:red}");
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn missing_content_type_is_untouched() {
    let (headers, body) = run(CompressionLayer::new(), Some("gzip"), &[], b"hello world").await;

    assert_eq!(&body[..], b"hello world");
    assert!(headers.get(CONTENT_ENCODING).is_none());
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn already_encoded_response_is_untouched() {
    let (headers, body) = run(
        CompressionLayer::new(),
        Some("gzip"),
        &[("content-type", "text/plain"), ("content-encoding", "br")],
        b"opaque",
    )
    .await;

    assert_eq!(&body[..], b"opaque");
    assert_eq!(headers.get(CONTENT_ENCODING).unwrap(), "br");
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn empty_body_is_compressed() {
    let (headers, body) = run(
        CompressionLayer::new(),
        Some("gzip"),
        &[("content-type", "text/plain")],
        b"",
    )
    .await;

    assert_eq!(headers.get(CONTENT_ENCODING).unwrap(), "gzip");
    assert!(!body.is_empty());
    assert_eq!(content_length(&headers), Some(body.len()));
    assert!(gunzip(&body).is_empty());
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn min_size_skips_small_bodies() {
    let layer = CompressionLayer::new().min_size(64);
    let (headers, body) = run(layer, Some("gzip"), &[("content-type", "text/plain")], b"tiny")
        .await;

    assert_eq!(&body[..], b"tiny");
    assert!(headers.get(CONTENT_ENCODING).is_none());
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn custom_compressible_types() {
    let layer = CompressionLayer::new().compressible_types(["image/svg+xml"]);

    let (headers, body) = run(
        layer.clone(),
        Some("gzip"),
        &[("content-type", "image/svg+xml")],
        b"<svg></svg>",
    )
    .await;
    assert_eq!(headers.get(CONTENT_ENCODING).unwrap(), "gzip");
    assert_eq!(gunzip(&body), b"<svg></svg>");

    // The default text rule no longer applies
    let (headers, body) = run(layer, Some("gzip"), &[("content-type", "text/plain")], b"plain")
        .await;
    assert!(headers.get(CONTENT_ENCODING).is_none());
    assert_eq!(&body[..], b"plain");
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn custom_rules_can_deny() {
    let layer = CompressionLayer::new().eligibility(EligibilityList::new(vec![
        EligibilityRule::deny("text/event-stream"),
        EligibilityRule::allow("text/*"),
    ]));

    let (headers, _) = run(
        layer.clone(),
        Some("gzip"),
        &[("content-type", "text/event-stream")],
        b"data: x\n\n",
    )
    .await;
    assert!(headers.get(CONTENT_ENCODING).is_none());

    let (headers, _) = run(layer, Some("gzip"), &[("content-type", "text/plain")], b"x").await;
    assert_eq!(headers.get(CONTENT_ENCODING).unwrap(), "gzip");
}

#[tokio::test]
#[cfg(all(feature = "gzip", feature = "deflate"))]
async fn restricted_algorithms() {
    let layer = CompressionLayer::new().algorithms([Algorithm::Deflate]);
    let (headers, _) = run(
        layer,
        Some("gzip, deflate"),
        &[("content-type", "text/plain")],
        b"x",
    )
    .await;

    assert_eq!(headers.get(CONTENT_ENCODING).unwrap(), "deflate");
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn handler_error_propagates() {
    let handler = service_fn(|_req: Request<()>| async {
        Err::<Response<Full<Bytes>>, _>(io::Error::new(io::ErrorKind::BrokenPipe, "handler failed"))
    });

    let request = Request::builder()
        .header(ACCEPT_ENCODING, "gzip")
        .body(())
        .unwrap();
    let Err(err) = CompressionLayer::new().layer(handler).oneshot(request).await else {
        panic!("expected the handler error");
    };
    let err: BoxError = err;

    let err = err.downcast::<io::Error>().unwrap();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
}

/// Yields one data frame, then fails.
struct FailingBody {
    sent: bool,
}

impl Body for FailingBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if self.sent {
            Poll::Ready(Some(Err(io::Error::other("connection reset"))))
        } else {
            self.sent = true;
            Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(b"partial")))))
        }
    }
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn body_error_fails_request() {
    let handler = service_fn(|_req: Request<()>| async {
        Ok::<_, Infallible>(
            Response::builder()
                .header(CONTENT_TYPE, "text/plain")
                .body(FailingBody { sent: false })
                .unwrap(),
        )
    });

    let request = Request::builder()
        .header(ACCEPT_ENCODING, "gzip")
        .body(())
        .unwrap();
    let Err(err) = CompressionLayer::new().layer(handler).oneshot(request).await else {
        panic!("expected the body error");
    };

    let err = err.downcast::<CompressionError>().unwrap();
    assert!(matches!(*err, CompressionError::Body(_)));
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn bodiless_statuses_are_untouched() {
    for status in [StatusCode::NO_CONTENT, StatusCode::NOT_MODIFIED] {
        let (returned, headers, body) = run_with_status(
            CompressionLayer::new(),
            Some("gzip"),
            status,
            &[("content-type", "text/html")],
            b"",
        )
        .await;

        assert_eq!(returned, status);
        assert!(body.is_empty(), "{status} gained a body");
        assert!(headers.get(CONTENT_ENCODING).is_none());
        assert!(headers.get(CONTENT_LENGTH).is_none());
    }
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn bodiless_status_is_not_advertised() {
    let layer = CompressionLayer::new().advertise_encoding(AdvertiseEncoding::OnNegotiation);
    let (_, headers, body) = run_with_status(
        layer,
        Some("gzip"),
        StatusCode::NOT_MODIFIED,
        &[("content-type", "text/html")],
        b"",
    )
    .await;

    assert!(body.is_empty());
    assert!(headers.get(CONTENT_ENCODING).is_none());
}

#[tokio::test]
#[cfg(feature = "gzip")]
async fn range_response_is_untouched() {
    let (status, headers, body) = run_with_status(
        CompressionLayer::new(),
        Some("gzip"),
        StatusCode::PARTIAL_CONTENT,
        &[
            ("content-type", "text/plain"),
            ("content-range", "bytes 0-4/100"),
            ("content-length", "5"),
        ],
        b"hello",
    )
    .await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(&body[..], b"hello");
    assert!(headers.get(CONTENT_ENCODING).is_none());
    assert_eq!(headers.get(CONTENT_RANGE).unwrap(), "bytes 0-4/100");
    assert_eq!(content_length(&headers), Some(5));
}
