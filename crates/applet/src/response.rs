//! Response parser and validator for the generator wire contract.
//!
//! The generator is asked for ordered, delimited sections followed by the raw
//! artifact markup:
//!
//! ```text
//! ===NAME===          (create-from-description only)
//! <app name>
//! ===END_NAME===
//! ===ICON===          (create-from-description only)
//! <single glyph>
//! ===END_ICON===
//! ===DESCRIPTION===
//! <free text>
//! ===END_DESCRIPTION===
//! <artifact markup>
//! ```
//!
//! Parsing is a cursor walk over the sections in order. Each section is a
//! strict begin/end pair; once the description's end marker is consumed the
//! remainder is the artifact and is never searched for markers again, so
//! marker-like text inside the artifact cannot be mistaken for structure.
//! Markers are matched ASCII case-insensitively.
//!
//! When the description markers are missing entirely the whole remaining text
//! is taken as the artifact and a description is synthesised, so a generator
//! that ignores the contract still yields a usable result. A broken description
//! section is skipped the same way when markup follows it: an unterminated one
//! resumes at the first document-start token, a lone end marker resumes right
//! after itself.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    ArtifactIdentity, GenerationRequest, MalformedReason, OperationKind, ParseError, ParsedResult,
};

/// Prefix inserted when the artifact does not begin with a document-start token.
pub const CANONICAL_DOCUMENT_START: &str = "<!DOCTYPE html>\n";

const DOCUMENT_END: &str = "</html>";

const DOCUMENT_START_NEEDLES: [&str; 2] = ["<!doctype", "<html"];

static LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("static regex"));
static TRAILING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n?```\s*$").expect("static regex"));

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// A delimited section of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Name,
    Icon,
    Description,
}

impl Section {
    /// Canonical tag written between the `===` fences.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Name => "NAME",
            Self::Icon => "ICON",
            Self::Description => "DESCRIPTION",
        }
    }

    // Older prompts asked for APP_NAME / APP_ICON; generators still emit them.
    fn accepted_tags(self) -> &'static [&'static str] {
        match self {
            Self::Name => &["name", "app_name"],
            Self::Icon => &["icon", "app_icon"],
            Self::Description => &["description"],
        }
    }

    /// The begin marker, e.g. `===DESCRIPTION===`.
    pub fn begin_marker(self) -> String {
        format!("==={}===", self.tag())
    }

    /// The end marker, e.g. `===END_DESCRIPTION===`.
    pub fn end_marker(self) -> String {
        format!("===END_{}===", self.tag())
    }

    fn begin_needles(self) -> Vec<String> {
        self.accepted_tags()
            .iter()
            .map(|t| format!("==={t}==="))
            .collect()
    }

    fn end_needles(self) -> Vec<String> {
        self.accepted_tags()
            .iter()
            .map(|t| format!("===end_{t}==="))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// What the parser needs to know about the operation that produced the text.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub kind: OperationKind,
    pub identity: &'a ArtifactIdentity,
    /// Whether NAME and ICON sections precede the description.
    pub expects_identity_sections: bool,
}

impl<'a> ParseContext<'a> {
    /// The context matching `request`.
    pub fn for_request(request: &'a GenerationRequest) -> Self {
        Self {
            kind: request.kind(),
            identity: request.identity(),
            expects_identity_sections: request.expects_identity_sections(),
        }
    }

    fn fallback_description(&self, name: Option<&str>) -> String {
        let id = self.identity.as_str();
        match (self.kind, name) {
            (OperationKind::Create, Some(name)) => format!("{name} app"),
            (OperationKind::Create, None) => format!("{id} app with core functionality."),
            (OperationKind::Enhance, _) => format!("Enhanced {id} app with additional features."),
            (OperationKind::Fix, _) => format!("{id} app with reported issues fixed."),
            (OperationKind::Customize, _) => format!("{id} app modified per user command."),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Extracts a [`ParsedResult`] from raw generator text.
///
/// # Errors
///
/// - [`ParseError::Malformed`] when a NAME or ICON section is unterminated or
///   unopened, a broken description section is not followed by usable markup,
///   or no artifact text remains.
/// - [`ParseError::Incomplete`] when the artifact opens a document without
///   closing it.
pub fn parse(raw: &str, ctx: &ParseContext<'_>) -> Result<ParsedResult, ParseError> {
    let mut scanner = Scanner::new(raw);

    // NAME and ICON may only appear ahead of the description section.
    let identity_limit = scanner
        .find(&Section::Description.begin_needles(), 0, raw.len())
        .map_or(raw.len(), |(start, _)| start);

    let (name, icon) = if ctx.expects_identity_sections {
        let name = scanner.take(Section::Name, identity_limit)?;
        let icon = scanner.take(Section::Icon, identity_limit)?;
        (name, icon.map(first_token))
    } else {
        (None, None)
    };

    let description = scanner.take_or_skip(Section::Description, raw.len())?;
    let had_description = description.is_some();
    let description = description
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| ctx.fallback_description(name.as_deref()));

    let artifact = strip_fences(scanner.rest());
    if artifact.is_empty() {
        return Err(ParseError::Malformed {
            section: "ARTIFACT".to_string(),
            reason: MalformedReason::EmptyArtifact,
        });
    }
    validate_complete(&artifact)?;

    tracing::debug!(
        identity = %ctx.identity,
        kind = %ctx.kind,
        delimited = had_description,
        artifact_bytes = artifact.len(),
        "parsed generator response"
    );

    Ok(ParsedResult {
        description,
        artifact: ensure_document_start(artifact),
        name,
        icon,
    })
}

/// Checks the completeness invariant: a document that is opened is closed.
///
/// # Errors
///
/// [`ParseError::Incomplete`] when `artifact` contains `<!doctype` or `<html`
/// but no `</html>`.
pub fn validate_complete(artifact: &str) -> Result<(), ParseError> {
    let lower = artifact.to_ascii_lowercase();
    let opens = lower.contains("<!doctype") || lower.contains("<html");
    if opens && !lower.contains(DOCUMENT_END) {
        return Err(ParseError::Incomplete);
    }
    Ok(())
}

/// Removes a leading and trailing markdown code fence, then trims.
pub fn strip_fences(text: &str) -> String {
    let text = LEADING_FENCE.replace(text, "");
    let text = TRAILING_FENCE.replace(&text, "");
    text.trim().to_string()
}

fn ensure_document_start(artifact: String) -> String {
    let head = artifact
        .get(..5)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if artifact.starts_with("<!") || head == "<html" {
        artifact
    } else {
        format!("{CANONICAL_DOCUMENT_START}{artifact}")
    }
}

fn first_token(icon: String) -> String {
    icon.split_whitespace().next().unwrap_or_default().to_string()
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Cursor over the raw text with an ASCII-lowercased shadow for marker search.
///
/// ASCII lowercasing never changes byte lengths, so offsets found in the
/// shadow are valid char boundaries in the original.
struct Scanner<'a> {
    raw: &'a str,
    lower: String,
    cursor: usize,
}

impl<'a> Scanner<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            lower: raw.to_ascii_lowercase(),
            cursor: 0,
        }
    }

    /// Earliest occurrence of any needle within `from..to`, as
    /// `(marker_start, marker_end)`.
    fn find<S: AsRef<str>>(
        &self,
        needles: &[S],
        from: usize,
        to: usize,
    ) -> Option<(usize, usize)> {
        let hay = self.lower.get(from..to)?;
        needles
            .iter()
            .filter_map(|n| {
                let n: &str = n.as_ref();
                hay.find(n).map(|i| (from + i, from + i + n.len()))
            })
            .min_by_key(|(start, _)| *start)
    }

    /// Consumes `section` if its begin marker appears before `limit`.
    fn take(&mut self, section: Section, limit: usize) -> Result<Option<String>, ParseError> {
        let malformed = |reason| ParseError::Malformed {
            section: section.tag().to_string(),
            reason,
        };

        let Some((_, content_start)) = self.find(&section.begin_needles(), self.cursor, limit)
        else {
            if self.find(&section.end_needles(), self.cursor, limit).is_some() {
                return Err(malformed(MalformedReason::UnopenedSection));
            }
            return Ok(None);
        };

        let (content_end, after) = self
            .find(&section.end_needles(), content_start, limit)
            .ok_or_else(|| malformed(MalformedReason::UnterminatedSection))?;

        self.cursor = after;
        let content = self.raw[content_start..content_end].trim();
        Ok(if content.is_empty() && section != Section::Description {
            None
        } else {
            Some(content.to_string())
        })
    }

    /// Like [`Scanner::take`], but steps over a broken section when markup
    /// follows it. The section content is dropped in that case.
    fn take_or_skip(
        &mut self,
        section: Section,
        limit: usize,
    ) -> Result<Option<String>, ParseError> {
        let err = match self.take(section, limit) {
            Ok(content) => return Ok(content),
            Err(err) => err,
        };

        let resume_at = match &err {
            ParseError::Malformed {
                reason: MalformedReason::UnterminatedSection,
                ..
            } => self
                .find(&section.begin_needles(), self.cursor, limit)
                .and_then(|(_, content_start)| {
                    self.find(&DOCUMENT_START_NEEDLES, content_start, limit)
                })
                .map(|(start, _)| start),
            ParseError::Malformed {
                reason: MalformedReason::UnopenedSection,
                ..
            } => self
                .find(&section.end_needles(), self.cursor, limit)
                .map(|(_, after)| after)
                .filter(|&after| !self.raw[after..limit].trim().is_empty()),
            _ => None,
        };

        let Some(resume_at) = resume_at else {
            return Err(err);
        };
        tracing::debug!(section = section.tag(), error = %err, "skipping broken section");
        self.cursor = resume_at;
        Ok(None)
    }

    fn rest(&self) -> &'a str {
        &self.raw[self.cursor..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "<!DOCTYPE html>\n<html><body><p>hi</p></body></html>";

    fn ctx(kind: OperationKind, id: &ArtifactIdentity) -> ParseContext<'_> {
        ParseContext {
            kind,
            identity: id,
            expects_identity_sections: false,
        }
    }

    fn id() -> ArtifactIdentity {
        ArtifactIdentity::new("calc-1").unwrap()
    }

    #[test]
    fn well_formed_output_splits_exactly() {
        let id = id();
        let raw = format!("===DESCRIPTION===\n  A calculator.  \n===END_DESCRIPTION===\n\n{DOC}\n");
        let parsed = parse(&raw, &ctx(OperationKind::Enhance, &id)).unwrap();
        assert_eq!(parsed.description, "A calculator.");
        assert_eq!(parsed.artifact, DOC);
        assert!(!parsed.artifact.contains("==="));
        assert_eq!(parsed.name, None);
    }

    #[test]
    fn markers_are_case_insensitive_and_preamble_is_ignored() {
        let id = id();
        let raw = format!("Sure! Here it is.\n===description===\nNotes app.\n===End_Description===\n{DOC}");
        let parsed = parse(&raw, &ctx(OperationKind::Customize, &id)).unwrap();
        assert_eq!(parsed.description, "Notes app.");
        assert_eq!(parsed.artifact, DOC);
    }

    #[test]
    fn marker_text_inside_artifact_is_left_alone() {
        let id = id();
        let artifact = "<html><body>===END_DESCRIPTION=== ===DESCRIPTION===</body></html>";
        let raw = format!("===DESCRIPTION===\nd\n===END_DESCRIPTION===\n{artifact}");
        let parsed = parse(&raw, &ctx(OperationKind::Fix, &id)).unwrap();
        assert_eq!(parsed.description, "d");
        assert_eq!(parsed.artifact, artifact);
    }

    #[test]
    fn identity_sections_are_extracted_in_order() {
        let id = id();
        let raw = format!(
            "===NAME===\nTip Splitter\n===END_NAME===\n===ICON===\n💸 money with wings\n===END_ICON===\n===DESCRIPTION===\nSplits bills.\n===END_DESCRIPTION===\n{DOC}"
        );
        let parsed = parse(
            &raw,
            &ParseContext {
                expects_identity_sections: true,
                ..ctx(OperationKind::Create, &id)
            },
        )
        .unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Tip Splitter"));
        assert_eq!(parsed.icon.as_deref(), Some("💸"));
        assert_eq!(parsed.description, "Splits bills.");
        assert_eq!(parsed.artifact, DOC);
    }

    #[test]
    fn legacy_identity_tags_are_accepted() {
        let id = id();
        let raw = format!(
            "===APP_NAME===\nWeather Now\n===END_APP_NAME===\n===APP_ICON===\n☀️\n===END_APP_ICON===\n===DESCRIPTION===\nForecast.\n===END_DESCRIPTION===\n{DOC}"
        );
        let parsed = parse(
            &raw,
            &ParseContext {
                expects_identity_sections: true,
                ..ctx(OperationKind::Create, &id)
            },
        )
        .unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Weather Now"));
        assert_eq!(parsed.icon.as_deref(), Some("☀️"));
    }

    #[test]
    fn missing_markers_fall_back_to_whole_text() {
        let id = id();
        let parsed = parse(DOC, &ctx(OperationKind::Enhance, &id)).unwrap();
        assert_eq!(parsed.artifact, DOC);
        assert_eq!(parsed.description, "Enhanced calc-1 app with additional features.");
    }

    #[test]
    fn fallback_never_yields_empty_artifact() {
        let id = id();
        for kind in [
            OperationKind::Create,
            OperationKind::Enhance,
            OperationKind::Fix,
            OperationKind::Customize,
        ] {
            let parsed = parse("just some words", &ctx(kind, &id)).unwrap();
            assert_eq!(parsed.artifact, "<!DOCTYPE html>\njust some words");
            assert!(!parsed.description.is_empty());
        }
    }

    #[test]
    fn completeness_is_checked_before_prefixing() {
        let id = id();
        let parsed = parse("just some words", &ctx(OperationKind::Enhance, &id)).unwrap();
        assert!(parsed.artifact.starts_with(CANONICAL_DOCUMENT_START));
        assert!(!parsed.artifact.contains(DOCUMENT_END));
    }

    #[test]
    fn fences_are_stripped() {
        let id = id();
        let raw = format!("===DESCRIPTION===\nd\n===END_DESCRIPTION===\n```html\n{DOC}\n```\n");
        let parsed = parse(&raw, &ctx(OperationKind::Enhance, &id)).unwrap();
        assert_eq!(parsed.artifact, DOC);

        let bare = format!("```\n{DOC}```");
        assert_eq!(parse(&bare, &ctx(OperationKind::Fix, &id)).unwrap().artifact, DOC);
    }

    #[test]
    fn fragment_gets_canonical_document_start() {
        let id = id();
        let raw = "===DESCRIPTION===\nd\n===END_DESCRIPTION===\n<div>hello</div>";
        let parsed = parse(raw, &ctx(OperationKind::Enhance, &id)).unwrap();
        assert_eq!(parsed.artifact, "<!DOCTYPE html>\n<div>hello</div>");
    }

    #[test]
    fn opened_document_without_close_is_incomplete() {
        let id = id();
        let raw = "===DESCRIPTION===\nd\n===END_DESCRIPTION===\n<!DOCTYPE html>\n<html><body>cut";
        assert_eq!(
            parse(raw, &ctx(OperationKind::Enhance, &id)),
            Err(ParseError::Incomplete)
        );
        assert_eq!(
            parse("<HTML><body>cut", &ctx(OperationKind::Fix, &id)),
            Err(ParseError::Incomplete)
        );
    }

    #[test]
    fn unterminated_description_resumes_at_document_start() {
        let id = id();
        let raw = format!("===DESCRIPTION===\nA calculator.\n{DOC}");
        let parsed = parse(&raw, &ctx(OperationKind::Enhance, &id)).unwrap();
        assert_eq!(parsed.artifact, DOC);
        assert_eq!(parsed.description, "Enhanced calc-1 app with additional features.");

        let lower = "===DESCRIPTION===\nd\n<html><body>ok</body></html>";
        let parsed = parse(lower, &ctx(OperationKind::Fix, &id)).unwrap();
        assert_eq!(parsed.artifact, "<html><body>ok</body></html>");
    }

    #[test]
    fn unterminated_description_without_markup_is_malformed() {
        let id = id();
        let raw = "===DESCRIPTION===\nd\n<div>no document here</div>";
        assert_eq!(
            parse(raw, &ctx(OperationKind::Enhance, &id)),
            Err(ParseError::Malformed {
                section: "DESCRIPTION".into(),
                reason: MalformedReason::UnterminatedSection,
            })
        );
    }

    #[test]
    fn lone_description_end_marker_resumes_after_itself() {
        let id = id();
        let raw = format!("Here you go\n===END_DESCRIPTION===\n{DOC}");
        let parsed = parse(&raw, &ctx(OperationKind::Customize, &id)).unwrap();
        assert_eq!(parsed.artifact, DOC);
        assert_eq!(parsed.description, "calc-1 app modified per user command.");
    }

    #[test]
    fn lone_description_end_marker_with_nothing_after_is_malformed() {
        let id = id();
        let raw = "d\n===END_DESCRIPTION===\n  \n";
        assert!(matches!(
            parse(raw, &ctx(OperationKind::Enhance, &id)),
            Err(ParseError::Malformed {
                reason: MalformedReason::UnopenedSection,
                ..
            })
        ));
    }

    #[test]
    fn name_end_marker_after_description_is_not_consumed() {
        let id = id();
        let raw = format!("===NAME===\nX\n===DESCRIPTION===\nd\n===END_DESCRIPTION===\n===END_NAME==={DOC}");
        let err = parse(
            &raw,
            &ParseContext {
                expects_identity_sections: true,
                ..ctx(OperationKind::Create, &id)
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            ParseError::Malformed {
                section: "NAME".into(),
                reason: MalformedReason::UnterminatedSection,
            }
        );
    }

    #[test]
    fn empty_artifact_after_description_is_malformed() {
        let id = id();
        let raw = "===DESCRIPTION===\nd\n===END_DESCRIPTION===\n  \n```\n```";
        assert!(matches!(
            parse(raw, &ctx(OperationKind::Enhance, &id)),
            Err(ParseError::Malformed {
                reason: MalformedReason::EmptyArtifact,
                ..
            })
        ));
    }

    #[test]
    fn empty_description_section_is_synthesised() {
        let id = id();
        let raw = format!("===DESCRIPTION===\n\n===END_DESCRIPTION===\n{DOC}");
        let parsed = parse(&raw, &ctx(OperationKind::Customize, &id)).unwrap();
        assert_eq!(parsed.description, "calc-1 app modified per user command.");
    }

    #[test]
    fn created_name_seeds_fallback_description() {
        let id = id();
        let raw = format!("===NAME===\nPomodoro\n===END_NAME===\n{DOC}");
        let parsed = parse(
            &raw,
            &ParseContext {
                expects_identity_sections: true,
                ..ctx(OperationKind::Create, &id)
            },
        )
        .unwrap();
        assert_eq!(parsed.description, "Pomodoro app");
        assert_eq!(parsed.artifact, DOC);
    }
}
