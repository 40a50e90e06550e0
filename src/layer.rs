use crate::codec::{Algorithm, AlgorithmTable};
use crate::eligibility::EligibilityList;
use crate::negotiate::Negotiator;
use crate::service::CompressionService;
use std::sync::Arc;
use tower::Layer;

/// When the `Content-Encoding` header is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdvertiseEncoding {
    /// Only once the body has actually been compressed.
    #[default]
    OnCompression,
    /// As soon as an algorithm is negotiated, before the response content
    /// type has been checked.
    ///
    /// Responses later found ineligible are sent uncompressed while still
    /// carrying `Content-Encoding`. Only useful for clients that depend on
    /// that behavior.
    OnNegotiation,
}

/// Configuration shared by every service and request of one layer.
#[derive(Debug, Clone, Default)]
pub(crate) struct Settings {
    pub(crate) negotiator: Negotiator,
    pub(crate) min_size: usize,
    pub(crate) advertise: AdvertiseEncoding,
}

/// A Tower layer that buffers and compresses HTTP response bodies.
///
/// This layer wraps services and compresses eligible response bodies
/// based on the client's Accept-Encoding header.
#[derive(Debug, Clone, Default)]
pub struct CompressionLayer {
    settings: Arc<Settings>,
}

impl CompressionLayer {
    /// Creates a new compression layer with default settings.
    ///
    /// Every compiled-in algorithm is supported, the default content-type
    /// rules apply and there is no minimum size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the algorithms that may be negotiated.
    pub fn algorithms<I>(mut self, algorithms: I) -> Self
    where
        I: IntoIterator<Item = Algorithm>,
    {
        let settings = Arc::make_mut(&mut self.settings);
        settings.negotiator = Negotiator::new(
            AlgorithmTable::new(algorithms),
            settings.negotiator.eligibility().clone(),
        );
        self
    }

    /// Replaces the content-type rules with patterns that are all
    /// compressible.
    pub fn compressible_types<I, P>(self, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.eligibility(EligibilityList::from_patterns(patterns))
    }

    /// Replaces the content-type rules.
    pub fn eligibility(mut self, eligibility: EligibilityList) -> Self {
        let settings = Arc::make_mut(&mut self.settings);
        let algorithms = settings.negotiator.algorithms().clone();
        settings.negotiator = Negotiator::new(algorithms, eligibility);
        self
    }

    /// Sets the minimum buffered body size required for compression.
    ///
    /// Smaller bodies are sent as they were buffered.
    pub fn min_size(mut self, size: usize) -> Self {
        Arc::make_mut(&mut self.settings).min_size = size;
        self
    }

    /// Sets when the `Content-Encoding` header is written.
    pub fn advertise_encoding(mut self, advertise: AdvertiseEncoding) -> Self {
        Arc::make_mut(&mut self.settings).advertise = advertise;
        self
    }

    /// Returns the negotiator used by services built from this layer.
    pub fn negotiator(&self) -> &Negotiator {
        &self.settings.negotiator
    }
}

impl<S> Layer<S> for CompressionLayer {
    type Service = CompressionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CompressionService::new(inner, self.settings.clone())
    }
}
