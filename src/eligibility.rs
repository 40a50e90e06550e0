/// A content-type pattern and whether matching responses may be compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityRule {
    pattern: String,
    eligible: bool,
}

impl EligibilityRule {
    /// Creates a rule.
    ///
    /// A pattern without `*` matches a content type exactly (ignoring ASCII
    /// case). A pattern containing `*` is a flat glob over the whole
    /// `type/subtype` string: each `*` matches any run of characters,
    /// including `/`.
    pub fn new(pattern: impl Into<String>, eligible: bool) -> Self {
        Self {
            pattern: pattern.into(),
            eligible,
        }
    }

    /// Creates a rule marking matching content types as compressible.
    pub fn allow(pattern: impl Into<String>) -> Self {
        Self::new(pattern, true)
    }

    /// Creates a rule marking matching content types as not compressible.
    pub fn deny(pattern: impl Into<String>) -> Self {
        Self::new(pattern, false)
    }

    /// Returns the pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns whether matching content types are compressible.
    pub fn eligible(&self) -> bool {
        self.eligible
    }

    /// Checks whether a bare content type (no parameters) matches this rule.
    pub fn matches(&self, content_type: &str) -> bool {
        if self.pattern.contains('*') {
            glob_match(self.pattern.as_bytes(), content_type.as_bytes())
        } else {
            self.pattern.eq_ignore_ascii_case(content_type)
        }
    }
}

/// Ordered content-type rules; the first matching rule decides.
///
/// Content types matching no rule are not compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityList {
    rules: Vec<EligibilityRule>,
}

impl EligibilityList {
    /// Creates a list from rules, evaluated in the given order.
    pub fn new(rules: Vec<EligibilityRule>) -> Self {
        Self { rules }
    }

    /// Creates a list in which every pattern is compressible.
    ///
    /// No deny fallback is appended; content types matching none of the
    /// patterns are still not compressed.
    pub fn from_patterns<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self::new(patterns.into_iter().map(EligibilityRule::allow).collect())
    }

    /// Returns the rules in evaluation order.
    pub fn rules(&self) -> &[EligibilityRule] {
        &self.rules
    }

    /// Checks whether a `Content-Type` header value may be compressed.
    ///
    /// Parameters after the first `;` are ignored.
    pub fn is_eligible(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim();

        self.rules
            .iter()
            .find(|rule| rule.matches(essence))
            .is_some_and(EligibilityRule::eligible)
    }
}

impl Default for EligibilityList {
    fn default() -> Self {
        Self::new(vec![
            EligibilityRule::allow("text/*"),
            EligibilityRule::allow("message/*"),
            EligibilityRule::allow("application/javascript"),
            EligibilityRule::allow("application/json"),
            EligibilityRule::deny("*/*"),
        ])
    }
}

/// ASCII case-insensitive glob where `*` matches any run of bytes.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen and the text position it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p].eq_ignore_ascii_case(&text[t]) {
            p += 1;
            t += 1;
        } else if let Some((star, tried)) = backtrack {
            p = star + 1;
            t = tried + 1;
            backtrack = Some((star, tried + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}
