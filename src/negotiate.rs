use crate::codec::{Algorithm, AlgorithmTable};
use crate::eligibility::EligibilityList;
use http::HeaderMap;
use http::header::ACCEPT_ENCODING;

/// Decides which algorithm a request gets and which responses may use it.
///
/// A negotiator is built once and shared, read-only, by every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Negotiator {
    algorithms: AlgorithmTable,
    eligibility: EligibilityList,
}

impl Negotiator {
    /// Creates a negotiator from an algorithm table and an eligibility list.
    pub fn new(algorithms: AlgorithmTable, eligibility: EligibilityList) -> Self {
        Self {
            algorithms,
            eligibility,
        }
    }

    /// Returns the supported algorithm table.
    pub fn algorithms(&self) -> &AlgorithmTable {
        &self.algorithms
    }

    /// Returns the content-type eligibility list.
    pub fn eligibility(&self) -> &EligibilityList {
        &self.eligibility
    }

    /// Selects the algorithm for a request from its `Accept-Encoding` headers.
    ///
    /// The first listed token present in the table wins; quality values are
    /// not compared, but a token refused with `q=0` is skipped. Falls back to
    /// [`Algorithm::None`] when the header is absent or nothing matches.
    pub fn select_algorithm(&self, headers: &HeaderMap) -> Algorithm {
        let algorithm = headers
            .get_all(ACCEPT_ENCODING)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(parse_token)
            .find_map(|token| self.algorithms.get(&token))
            .unwrap_or_else(|| self.algorithms.fallback());

        tracing::trace!(?algorithm, "negotiated response compression");
        algorithm
    }

    /// Checks whether a response `Content-Type` may be compressed.
    pub fn is_eligible(&self, content_type: &str) -> bool {
        let eligible = self.eligibility.is_eligible(content_type);
        tracing::trace!(content_type, eligible, "checked content type");
        eligible
    }
}

/// Parses one `Accept-Encoding` entry such as `gzip` or `br;q=0.8`.
///
/// Returns the lowercase token, or `None` for empty entries and entries
/// refused with a zero quality.
fn parse_token(entry: &str) -> Option<String> {
    let mut parts = entry.split(';');
    let token = parts.next().unwrap_or("").trim();
    if token.is_empty() {
        return None;
    }

    let refused = parts.any(|param| {
        let param = param.trim();
        let Some((name, value)) = param.split_once('=') else {
            return false;
        };
        name.trim().eq_ignore_ascii_case("q")
            && value.trim().parse::<f32>().is_ok_and(|q| q == 0.0)
    });
    if refused {
        return None;
    }

    Some(token.to_ascii_lowercase())
}
