use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Verlusttopf a realized gain or loss is booked into
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Shares and equity ETFs (Aktien-Verlusttopf)
    #[default]
    Stock,
    /// Derivatives, certificates, bonds and everything else (sonstiger Verlusttopf)
    Other,
}

impl Bucket {
    pub const ALL: [Bucket; 2] = [Bucket::Stock, Bucket::Other];

    pub fn display(&self) -> &'static str {
        match self {
            Bucket::Stock => "stock",
            Bucket::Other => "other",
        }
    }

    /// German label used in the printed summary
    pub fn label(&self) -> &'static str {
        match self {
            Bucket::Stock => "Aktien-Verlusttopf",
            Bucket::Other => "Sonstiger Verlusttopf",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Instrument type tags booked into the `other` bucket.
///
/// Unknown tags fall back to `stock`. New broker taxonomies must be added here
/// (or passed via [`Classifier::with_other_tags`]) instead of changing that fallback,
/// otherwise historical derivative-like instruments get reclassified as equities.
pub const OTHER_TAGS: &[&str] = &[
    "derivative",
    "derivatives",
    "warrant",
    "option",
    "future",
    "knockout",
    "etc",
    "etn",
    "certificate",
    "bond",
    "cfd",
];

/// Classify with the built-in tag table.
pub fn classify(instrument_type: Option<&str>) -> Bucket {
    match instrument_type.map(str::trim) {
        Some(tag) if is_other_tag(OTHER_TAGS.iter().copied(), tag) => Bucket::Other,
        _ => Bucket::Stock,
    }
}

fn is_other_tag<'a>(mut tags: impl Iterator<Item = &'a str>, tag: &str) -> bool {
    !tag.is_empty() && tags.any(|t| t.eq_ignore_ascii_case(tag))
}

/// Tag table extended with user supplied tags
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    extra: Vec<String>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_other_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Classifier { extra }
    }

    pub fn classify(&self, instrument_type: Option<&str>) -> Bucket {
        if classify(instrument_type) == Bucket::Other {
            return Bucket::Other;
        }
        match instrument_type.map(str::trim) {
            Some(tag) if is_other_tag(self.extra.iter().map(String::as_str), tag) => Bucket::Other,
            _ => Bucket::Stock,
        }
    }
}
