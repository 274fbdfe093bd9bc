//! Request preferences for the REST endpoint

/// Count options for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountOption {
    /// Exact count
    Exact,
}

impl CountOption {
    /// Convert the option to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CountOption::Exact => "exact",
        }
    }
}

/// Options for returning data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOption {
    /// Return representation (the data)
    Representation,
}

impl ReturnOption {
    /// Convert the option to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnOption::Representation => "representation",
        }
    }
}

/// Builds a `Prefer` header value
pub(crate) fn prefer(returning: Option<ReturnOption>, count: Option<CountOption>) -> String {
    let mut parts = Vec::new();
    if let Some(returning) = returning {
        parts.push(format!("return={}", returning.as_str()));
    }
    if let Some(count) = count {
        parts.push(format!("count={}", count.as_str()));
    }
    parts.join(",")
}

/// Total from a `Content-Range` header such as `0-24/57` or `*/0`
pub(crate) fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.trim().parse().ok()
}
