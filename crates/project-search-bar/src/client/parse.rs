//! Parsers for arXiv Atom feeds and OAI-PMH `ListRecords` responses.
//!
//! Both formats are small, fixed vocabularies, so they are read with
//! anchored regular expressions rather than a full XML parser.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::latex::collapse_whitespace;
use crate::models::{ArxivId, ArxivMetadata};

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static ENTRY: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)<entry\b[^>]*>(.*?)</entry>"));
static ENTRY_ID: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)<id>(.*?)</id>"));
static TITLE: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)<title\b[^>]*>(.*?)</title>"));
static SUMMARY: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)<summary\b[^>]*>(.*?)</summary>"));
static AUTHOR_NAME: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?s)<author\b[^>]*>\s*<name>(.*?)</name>"));
static PRIMARY_CATEGORY: LazyLock<Regex> =
    LazyLock::new(|| re(r#"<arxiv:primary_category\b[^>]*\bterm="([^"]+)""#));
static CATEGORY: LazyLock<Regex> = LazyLock::new(|| re(r#"<category\b[^>]*\bterm="([^"]+)""#));
static PUBLISHED: LazyLock<Regex> = LazyLock::new(|| re(r"<published>([^<]+)</published>"));
static UPDATED: LazyLock<Regex> = LazyLock::new(|| re(r"<updated>([^<]+)</updated>"));
static DOI: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)<arxiv:doi\b[^>]*>(.*?)</arxiv:doi>"));
static JOURNAL_REF: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?s)<arxiv:journal_ref\b[^>]*>(.*?)</arxiv:journal_ref>"));

static RECORD: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)<record\b[^>]*>(.*?)</record>"));
static HEADER: LazyLock<Regex> = LazyLock::new(|| re(r"(?s)<header\b([^>]*)>(.*?)</header>"));
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| re(r"<identifier>([^<]+)</identifier>"));
static RESUMPTION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?s)<resumptionToken\b[^>]*?(?:/>|>(.*?)</resumptionToken>)"));
static NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| re(r"&#(x[0-9a-fA-F]+|[0-9]+);"));
static VERSION: LazyLock<Regex> = LazyLock::new(|| re(r"v\d+$"));

/// One page of OAI-PMH `ListRecords`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OaiPage {
    /// Identifiers of live (non-deleted) records, in feed order.
    pub ids: Vec<ArxivId>,
    /// Token for the next page; `None` when the list is complete.
    pub resumption_token: Option<String>,
}

/// Parse an arXiv Atom feed into metadata records.
///
/// Error entries (arXiv reports bad ids as a feed entry) are skipped.
#[must_use]
pub fn parse_atom(xml: &str) -> Vec<ArxivMetadata> {
    ENTRY
        .captures_iter(xml)
        .filter_map(|caps| parse_entry(&caps[1]))
        .collect()
}

fn parse_entry(entry: &str) -> Option<ArxivMetadata> {
    let raw_id = first(&ENTRY_ID, entry)?;
    if raw_id.contains("/api/errors") {
        return None;
    }
    let arxiv_id = atom_id(&raw_id);
    if arxiv_id.is_empty() {
        return None;
    }

    let mut categories: Vec<String> = Vec::new();
    if let Some(primary) = PRIMARY_CATEGORY.captures(entry) {
        categories.push(primary[1].to_string());
    }
    for caps in CATEGORY.captures_iter(entry) {
        if !categories.iter().any(|c| c == &caps[1]) {
            categories.push(caps[1].to_string());
        }
    }

    Some(ArxivMetadata {
        arxiv_id,
        title: first(&TITLE, entry).unwrap_or_default(),
        summary: first(&SUMMARY, entry).unwrap_or_default(),
        authors: AUTHOR_NAME.captures_iter(entry).map(|c| clean(&c[1])).filter(|a| !a.is_empty()).collect(),
        categories,
        published: first(&PUBLISHED, entry).as_deref().and_then(parse_date),
        updated: first(&UPDATED, entry).as_deref().and_then(parse_date),
        doi: first(&DOI, entry).filter(|d| !d.is_empty()),
        journal_ref: first(&JOURNAL_REF, entry).filter(|j| !j.is_empty()),
    })
}

/// `http://arxiv.org/abs/math/0601001v2` becomes `math/0601001`.
fn atom_id(raw: &str) -> String {
    let id = raw.rsplit_once("/abs/").map_or(raw, |(_, id)| id).trim();
    VERSION.replace(id, "").into_owned()
}

/// Parse a `ListRecords` response. Anything that is not an OAI-PMH document
/// yields an empty page.
#[must_use]
pub fn parse_list_records(xml: &str) -> OaiPage {
    if !xml.contains("<OAI-PMH") {
        return OaiPage::default();
    }

    let ids = RECORD
        .captures_iter(xml)
        .filter_map(|record| {
            let header = HEADER.captures(&record[1])?;
            if header[1].contains("status=\"deleted\"") {
                return None;
            }
            let identifier = IDENTIFIER.captures(&header[2])?;
            let id = identifier[1].trim();
            let id = id.strip_prefix("oai:arXiv.org:").unwrap_or(id);
            (!id.is_empty()).then(|| ArxivId::new(id))
        })
        .collect();

    let resumption_token = RESUMPTION_TOKEN
        .captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape_xml(m.as_str().trim()))
        .filter(|t| !t.is_empty());

    OaiPage { ids, resumption_token }
}

fn first(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern.captures(haystack).map(|caps| clean(&caps[1]))
}

fn clean(raw: &str) -> String {
    collapse_whitespace(&unescape_xml(raw))
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.get(..10)?, "%Y-%m-%d").ok()
}

/// Decode the predefined XML entities and numeric character references.
#[must_use]
pub fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let numeric = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value.and_then(char::from_u32).map_or_else(|| caps[0].to_string(), String::from)
    });
    numeric
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: id_list=2101.00001</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2101.00001v2</id>
    <updated>2021-02-03T10:00:00Z</updated>
    <published>2021-01-01T18:00:00Z</published>
    <title>Zeros of the Riemann
      zeta function &amp; friends</title>
    <summary>  We prove that &lt;many&gt; zeros
  lie on the line.
</summary>
    <author><name>Ada Lovelace</name></author>
    <author>
      <name>G. H. Hardy</name>
      <arxiv:affiliation>Cambridge</arxiv:affiliation>
    </author>
    <arxiv:doi xmlns:arxiv="http://arxiv.org/schemas/atom">10.1000/zeta</arxiv:doi>
    <arxiv:journal_ref xmlns:arxiv="http://arxiv.org/schemas/atom">Ann. Math. 1 (2021)</arxiv:journal_ref>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="math.NT" scheme="http://arxiv.org/schemas/atom"/>
    <category term="math.NT" scheme="http://arxiv.org/schemas/atom"/>
    <category term="math.CV" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/math/0601001v1</id>
    <published>2006-01-01T00:00:00Z</published>
    <title>Old style</title>
    <summary>Short.</summary>
    <author><name>Emmy Noether</name></author>
    <category term="math.AG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_entry() {
        let records = parse_atom(ATOM);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.arxiv_id, "2101.00001");
        assert_eq!(first.title, "Zeros of the Riemann zeta function & friends");
        assert_eq!(first.summary, "We prove that <many> zeros lie on the line.");
        assert_eq!(first.authors, vec!["Ada Lovelace", "G. H. Hardy"]);
        assert_eq!(first.categories, vec!["math.NT", "math.CV"]);
        assert_eq!(first.published, NaiveDate::from_ymd_opt(2021, 1, 1));
        assert_eq!(first.updated, NaiveDate::from_ymd_opt(2021, 2, 3));
        assert_eq!(first.doi.as_deref(), Some("10.1000/zeta"));
        assert_eq!(first.journal_ref.as_deref(), Some("Ann. Math. 1 (2021)"));

        assert_eq!(records[1].arxiv_id, "math/0601001");
        assert_eq!(records[1].doi, None);
    }

    #[test]
    fn test_parse_atom_skips_error_entries() {
        let xml = r"<feed><entry><id>http://arxiv.org/api/errors#incorrect_id_format_for_x</id>
            <title>Error</title><summary>incorrect id format for x</summary></entry></feed>";
        assert!(parse_atom(xml).is_empty());
        assert!(parse_atom("not xml at all").is_empty());
    }

    const OAI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <ListRecords>
    <record><header><identifier>oai:arXiv.org:2101.00001</identifier><datestamp>2021-01-05</datestamp></header>
      <metadata><arXiv><id>2101.00001</id></arXiv></metadata></record>
    <record><header status="deleted"><identifier>oai:arXiv.org:2101.00002</identifier></header></record>
    <record><header><identifier>oai:arXiv.org:math/0601001</identifier></header></record>
    <resumptionToken cursor="0" completeListSize="3">6961|1001&amp;x</resumptionToken>
  </ListRecords>
</OAI-PMH>"#;

    #[test]
    fn test_parse_list_records() {
        let page = parse_list_records(OAI);
        assert_eq!(page.ids, vec![ArxivId::new("2101.00001"), ArxivId::new("math/0601001")]);
        assert_eq!(page.resumption_token.as_deref(), Some("6961|1001&x"));
    }

    #[test]
    fn test_last_page_has_no_token() {
        let xml = OAI.replace(
            r#"<resumptionToken cursor="0" completeListSize="3">6961|1001&amp;x</resumptionToken>"#,
            r#"<resumptionToken cursor="1000" completeListSize="3"/>"#,
        );
        assert_eq!(parse_list_records(&xml).resumption_token, None);
    }

    #[test]
    fn test_non_xml_is_empty_page() {
        assert_eq!(parse_list_records("<html>busy</html>"), OaiPage::default());
        assert_eq!(parse_list_records(""), OaiPage::default());
    }

    #[test]
    fn test_unescape_numeric_entities() {
        assert_eq!(unescape_xml("Erd&#337;s &#x2013; P&#243;lya"), "Erdős – Pólya");
        assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
    }
}
