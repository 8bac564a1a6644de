//! Tag derivation from processor summaries.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

const MAX_TAGS: usize = 8;
const GENERAL: &str = "일반";

static TAG_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(?:^|\n)\s*(?:카테고리|분류|Category|Tags?)\s*[:：]\s*(.+)\s*$").unwrap()
});
static TAG_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,|/·•>]+").unwrap());

static KEYWORD_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        ("법률|심사보고|의결|위원회|법안|국회", "법률/행정"),
        ("농림|축산|수산|해양|어업|농업", "농림축수산"),
        ("예산|비용|원가|금액|억원|조원|회계|기금", "재정/예산"),
        ("프로젝트|시스템|플랫폼|ai|ocr|모델|데이터", "IT/프로젝트"),
        ("안전|품질|인증|규정|정책", "정책/규정"),
        ("보고서|요약|결론|결과", "보고/결과"),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(&format!("(?i){pattern}")).unwrap(), label))
    .collect()
});

/// Tags declared on the last `Category:`/`분류:`/`Tags:` line of `summary`.
///
/// Surrounding brackets are stripped, values split on `, | / · • >`, and the
/// result deduplicated in order and capped at eight.
#[must_use]
pub fn parse_tag_line(summary: &str) -> Vec<String> {
    let Some(caps) = TAG_LINE_RE.captures_iter(summary).last() else {
        return Vec::new();
    };
    let rhs = caps.get(1).map_or("", |m| m.as_str()).trim();
    let rhs = rhs
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')'])
        .trim();

    let mut seen = HashSet::new();
    TAG_SPLIT_RE
        .split(rhs)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter(|part| seen.insert(*part))
        .take(MAX_TAGS)
        .map(String::from)
        .collect()
}

/// Keyword-based labels for `text`, `일반` when nothing matches.
#[must_use]
pub fn categorize(text: &str) -> Vec<String> {
    let labels: Vec<String> = KEYWORD_RULES
        .iter()
        .filter(|(re, _)| re.is_match(text))
        .map(|(_, label)| (*label).to_owned())
        .collect();
    if labels.is_empty() {
        vec![GENERAL.to_owned()]
    } else {
        labels
    }
}

/// Declared tags when the summary has them, else keyword labels over the
/// summary, or over the raw response when the summary is empty.
#[must_use]
pub fn derive_tags(summary: &str, raw: &serde_json::Value) -> Vec<String> {
    let declared = parse_tag_line(summary);
    if !declared.is_empty() {
        return declared;
    }
    if summary.is_empty() {
        categorize(&raw.to_string())
    } else {
        categorize(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_korean_category_line() {
        assert_eq!(parse_tag_line("요약입니다.\n카테고리: 예산, 행정"), ["예산", "행정"]);
    }

    #[test]
    fn last_matching_line_wins() {
        let summary = "Tags: first\nbody text\nCategory: [alpha | beta / gamma]";
        assert_eq!(parse_tag_line(summary), ["alpha", "beta", "gamma"]);
    }

    #[test]
    fn fullwidth_colon_and_mixed_separators() {
        assert_eq!(parse_tag_line("분류：농업·수산 > 정책"), ["농업", "수산", "정책"]);
    }

    #[test]
    fn dedups_and_caps_at_eight() {
        let summary = "tags: a, b, a, c, d, e, f, g, h, i, j";
        assert_eq!(
            parse_tag_line(summary),
            ["a", "b", "c", "d", "e", "f", "g", "h"]
        );
    }

    #[test]
    fn no_tag_line_yields_nothing() {
        assert!(parse_tag_line("").is_empty());
        assert!(parse_tag_line("category without colon").is_empty());
    }

    #[test]
    fn categorize_matches_rules_in_order() {
        assert_eq!(
            categorize("국회 예산 심사보고서"),
            ["법률/행정", "재정/예산", "보고/결과"]
        );
        assert_eq!(categorize("New OCR pipeline"), ["IT/프로젝트"]);
        assert_eq!(categorize("nothing relevant"), ["일반"]);
    }

    #[test]
    fn derive_prefers_declared_tags() {
        let raw = serde_json::json!({"llmSummary": "x"});
        assert_eq!(derive_tags("카테고리: 예산, 행정", &raw), ["예산", "행정"]);
        assert_eq!(derive_tags("해양 수산 동향", &raw), ["농림축수산"]);
    }

    #[test]
    fn derive_falls_back_to_raw_response() {
        let raw = serde_json::json!({"outDir": "/data/시스템/42"});
        assert_eq!(derive_tags("", &raw), ["IT/프로젝트"]);
    }

    proptest! {
        #[test]
        fn parse_never_panics(s in "\\PC{0,200}") {
            let _ = parse_tag_line(&s);
        }

        #[test]
        fn parsed_tags_are_bounded_and_clean(s in "\\PC{0,200}") {
            let tags = parse_tag_line(&format!("Category: {s}"));
            prop_assert!(tags.len() <= MAX_TAGS);
            let unique: HashSet<_> = tags.iter().collect();
            prop_assert_eq!(unique.len(), tags.len());
            for tag in &tags {
                prop_assert!(!tag.is_empty());
                prop_assert_eq!(tag.trim(), tag.as_str());
            }
        }

        #[test]
        fn categorize_is_never_empty(s in "\\PC{0,200}") {
            prop_assert!(!categorize(&s).is_empty());
        }
    }
}
