use crate::body::CompressionBody;
use crate::codec::Algorithm;
use crate::error::{BoxError, CompressionError};
use crate::layer::{AdvertiseEncoding, Settings};
use http::response::Parts;
use http::{HeaderMap, HeaderValue, Response, StatusCode, header};
use http_body::Body;
use http_body_util::{BodyExt, Collected, combinators::Collect};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use tracing::debug;

pin_project! {
    /// Future for compression service responses.
    ///
    /// Resolves once the inner response is available and, when it is to be
    /// compressed, once its body has been buffered and encoded.
    pub struct ResponseFuture<F, B>
    where
        B: Body,
    {
        #[pin]
        state: State<F, B>,
        algorithm: Algorithm,
        settings: Arc<Settings>,
    }
}

pin_project! {
    #[project = StateProj]
    enum State<F, B>
    where
        B: Body,
    {
        /// Waiting for the inner service.
        Inner {
            #[pin]
            future: F,
        },
        /// Reading the whole inner body into memory.
        Buffering {
            #[pin]
            collect: Collect<B>,
            parts: Parts,
        },
        Done,
    }
}

impl<F, B> ResponseFuture<F, B>
where
    B: Body,
{
    pub(crate) fn new(inner: F, algorithm: Algorithm, settings: Arc<Settings>) -> Self {
        Self {
            state: State::Inner { future: inner },
            algorithm,
            settings,
        }
    }
}

impl<F, B, E> Future for ResponseFuture<F, B>
where
    F: Future<Output = Result<Response<B>, E>>,
    E: Into<BoxError>,
    B: Body,
    B::Error: Into<BoxError>,
{
    type Output = Result<Response<CompressionBody<B>>, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        loop {
            match this.state.as_mut().project() {
                StateProj::Inner { future } => {
                    let response = match ready!(future.poll(cx)) {
                        Ok(response) => response,
                        Err(e) => return Poll::Ready(Err(e.into())),
                    };

                    let (mut parts, body) = response.into_parts();
                    let buffer = should_buffer(
                        parts.status,
                        &mut parts.headers,
                        *this.algorithm,
                        this.settings,
                    );
                    if buffer {
                        this.state.set(State::Buffering {
                            collect: body.collect(),
                            parts,
                        });
                    } else {
                        this.state.set(State::Done);
                        return Poll::Ready(Ok(Response::from_parts(
                            parts,
                            CompressionBody::passthrough(body),
                        )));
                    }
                }
                StateProj::Buffering { collect, parts } => {
                    let collected = match ready!(collect.poll(cx)) {
                        Ok(collected) => collected,
                        Err(e) => {
                            this.state.set(State::Done);
                            return Poll::Ready(Err(CompressionError::Body(e.into()).into()));
                        }
                    };

                    let parts = std::mem::replace(parts, Response::new(()).into_parts().0);
                    this.state.set(State::Done);

                    let response =
                        compress_response(parts, collected, *this.algorithm, this.settings);
                    return Poll::Ready(response.map_err(Into::into));
                }
                StateProj::Done => panic!("ResponseFuture polled after completion"),
            }
        }
    }
}

/// Decides from the response status and headers whether the body should be
/// buffered for compression.
fn should_buffer(
    status: StatusCode,
    headers: &mut HeaderMap,
    algorithm: Algorithm,
    settings: &Settings,
) -> bool {
    let Some(encoding) = algorithm.content_encoding() else {
        return false;
    };

    if is_bodiless_status(status) {
        debug!(%status, "response has no body, skipping compression");
        return false;
    }

    if has_content_encoding(headers) {
        debug!("response is already encoded, skipping compression");
        return false;
    }

    if has_content_range(headers) {
        debug!("range response, skipping compression");
        return false;
    }

    if settings.advertise == AdvertiseEncoding::OnNegotiation {
        headers.insert(
            header::CONTENT_ENCODING,
            HeaderValue::from_static(encoding),
        );
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !settings.negotiator.is_eligible(content_type) {
        debug!(content_type, "content type is not compressible, skipping compression");
        return false;
    }

    true
}

/// Checks for statuses that never carry a body (1xx, 204, 304).
fn is_bodiless_status(status: StatusCode) -> bool {
    status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

/// Checks if Content-Encoding header is already present.
fn has_content_encoding(headers: &HeaderMap) -> bool {
    headers.contains_key(header::CONTENT_ENCODING)
}

/// Checks if Content-Range header is present (range response).
fn has_content_range(headers: &HeaderMap) -> bool {
    headers.contains_key(header::CONTENT_RANGE)
}

/// Compresses a fully buffered body and rewrites the response headers.
fn compress_response<B, D>(
    mut parts: Parts,
    collected: Collected<D>,
    algorithm: Algorithm,
    settings: &Settings,
) -> Result<Response<CompressionBody<B>>, CompressionError>
where
    D: bytes::Buf,
{
    let trailers = collected.trailers().cloned();
    let captured = collected.to_bytes();

    let encoding = match algorithm.content_encoding() {
        Some(encoding) if captured.len() >= settings.min_size => encoding,
        _ => {
            debug!(size = captured.len(), "response body too small, skipping compression");
            return Ok(Response::from_parts(
                parts,
                CompressionBody::buffered(captured, trailers),
            ));
        }
    };

    let compressed = algorithm.compress(&captured)?;
    debug!(
        algorithm = encoding,
        original = captured.len(),
        compressed = compressed.len(),
        "compressed response body"
    );

    parts.headers.insert(
        header::CONTENT_ENCODING,
        HeaderValue::from_static(encoding),
    );

    // The buffered body is sent with an exact length
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(compressed.len()));
    parts.headers.remove(header::TRANSFER_ENCODING);

    // Ranges of the compressed representation are not supported
    parts.headers.remove(header::ACCEPT_RANGES);

    add_vary_accept_encoding(&mut parts.headers);

    Ok(Response::from_parts(
        parts,
        CompressionBody::buffered(compressed, trailers),
    ))
}

/// Adds Accept-Encoding to the Vary header if not already present.
fn add_vary_accept_encoding(headers: &mut HeaderMap) {
    for vary in headers.get_all(header::VARY) {
        if let Ok(vary_str) = vary.to_str() {
            let covered = vary_str.split(',').any(|v| {
                let v = v.trim();
                v == "*" || v.eq_ignore_ascii_case("accept-encoding")
            });
            if covered {
                return;
            }
        }
    }

    headers.append(
        header::VARY,
        HeaderValue::from_static("accept-encoding"),
    );
}
