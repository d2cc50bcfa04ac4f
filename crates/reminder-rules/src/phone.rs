//! Phone normalization to E.164-ish form for one country dial code.

/// Canonicalizes raw phone cells. Defaults to Turkey (`+90`, 10-digit national numbers).
#[derive(Debug, Clone)]
pub struct PhoneNormalizer {
    country_code: String,
    national_len: usize,
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new("90")
    }
}

impl PhoneNormalizer {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into().trim_start_matches('+').to_string(),
            national_len: 10,
        }
    }

    /// Length of a national number written without trunk prefix or country code.
    pub fn with_national_len(mut self, len: usize) -> Self {
        self.national_len = len;
        self
    }

    /// First matching rule wins:
    /// 1. digits start with the country code → `+digits`
    /// 2. digits start with the trunk `0` → drop it, prepend `+<cc>`
    /// 3. exactly a national number → prepend `+<cc>`
    /// 4. input already starts with `+` → unchanged
    /// 5. otherwise → `+digits`
    ///
    /// No validation beyond that; see [`is_dispatchable`].
    pub fn normalize(&self, raw: &str) -> String {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        let cc = self.country_code.as_str();

        if !cc.is_empty() && digits.starts_with(cc) {
            return format!("+{digits}");
        }
        if let Some(national) = digits.strip_prefix('0') {
            return format!("+{cc}{national}");
        }
        if digits.len() == self.national_len {
            return format!("+{cc}{digits}");
        }
        if raw.starts_with('+') {
            return raw.to_string();
        }
        format!("+{digits}")
    }
}

/// Sanity check applied after normalization, before anything is sent.
pub fn is_dispatchable(normalized: &str, min_len: usize) -> bool {
    normalized.chars().count() >= min_len
}
