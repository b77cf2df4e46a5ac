//! Message filters and their IMAP SEARCH form

use crate::arguments::Arguments;
use crate::error::OperationError;
use chrono::NaiveDate;

/// Criteria for enumerating or searching messages. Fields combine with
/// AND; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    /// Raw IMAP search criteria, passed through as-is.
    pub raw: Option<String>,
    /// IMAP semantics: SINCE >= date.
    pub since: Option<NaiveDate>,
    /// IMAP semantics: BEFORE < date.
    pub before: Option<NaiveDate>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub seen: Option<bool>,
    pub flagged: Option<bool>,
    pub answered: Option<bool>,
    /// `HEADER <name> <value>` terms.
    pub headers: Vec<(String, String)>,
}

impl ItemFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Pass `criteria` through untouched (`ALL`, `UNSEEN`, ...).
    #[must_use]
    pub fn raw(criteria: impl Into<String>) -> Self {
        Self {
            raw: Some(criteria.into()),
            ..Self::default()
        }
    }

    /// Raw criteria supplied by a caller. Line breaks would end the
    /// SEARCH command early, so they are refused.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `criteria` contains CR or LF.
    pub fn caller_criteria(criteria: &str) -> Result<Self, OperationError> {
        if criteria.contains(['\r', '\n']) {
            return Err(OperationError::Validation(
                "\"criteria\" must not contain line breaks.".into(),
            ));
        }
        Ok(Self::raw(criteria))
    }

    #[must_use]
    pub fn since(date: NaiveDate) -> Self {
        Self {
            since: Some(date),
            ..Self::default()
        }
    }

    /// Build a filter from `advanced_search` parameters: `from`, `to`,
    /// `subject`, `body`, `since`, `before`, `seen`, `flagged`,
    /// `answered`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unparseable dates or booleans.
    pub fn from_search_params(params: &Arguments) -> Result<Self, OperationError> {
        let flag = |key: &str| -> Result<Option<bool>, OperationError> {
            if params.contains(key) {
                params.bool_or(key, false).map(Some)
            } else {
                Ok(None)
            }
        };
        Ok(Self {
            raw: None,
            since: params.date("since")?,
            before: params.date("before")?,
            from: params.string("from")?,
            to: params.string("to")?,
            subject: params.string("subject")?,
            body: params.string("body")?,
            seen: flag("seen")?,
            flagged: flag("flagged")?,
            answered: flag("answered")?,
            headers: Vec::new(),
        })
    }

    /// Render as an IMAP SEARCH key list.
    #[must_use]
    pub fn to_imap_query(&self) -> String {
        let mut terms: Vec<String> = Vec::new();

        if let Some(raw) = self.raw.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            terms.push(raw.replace(['\r', '\n'], " "));
        }
        if let Some(since) = self.since {
            terms.push(format!("SINCE {}", since.format("%-d-%b-%Y")));
        }
        if let Some(before) = self.before {
            terms.push(format!("BEFORE {}", before.format("%-d-%b-%Y")));
        }
        for (key, value) in [
            ("FROM", &self.from),
            ("TO", &self.to),
            ("SUBJECT", &self.subject),
            ("BODY", &self.body),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                terms.push(format!("{key} {}", quote(value)));
            }
        }
        for (yes, no, value) in [
            ("SEEN", "UNSEEN", self.seen),
            ("FLAGGED", "UNFLAGGED", self.flagged),
            ("ANSWERED", "UNANSWERED", self.answered),
        ] {
            if let Some(set) = value {
                terms.push(if set { yes } else { no }.to_string());
            }
        }
        for (name, value) in &self.headers {
            terms.push(format!("HEADER {} {}", quote(name), quote(value)));
        }

        if terms.is_empty() {
            "ALL".to_string()
        } else {
            terms.join(" ")
        }
    }
}

/// Quote a search string; CR and LF cannot appear in a quoted string.
fn quote(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect();
    format!(
        "\"{}\"",
        cleaned.replace('\\', "\\\\").replace('"', "\\\"")
    )
}
