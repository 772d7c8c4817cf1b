//! Sibling DSL parsers
//!
//! A component may ship with up to four companion texts: SQL queries, HTTP
//! endpoint specs, a localization table and head metadata. Each has a small
//! line-oriented grammar of its own and does not go through the lexer.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::diagnostics::CompileError;
use crate::manifest::{ApiEndpoint, ComponentManifest, HeadMetadata, SqlQuery};

lazy_static! {
    static ref LABEL_RE: Regex = Regex::new(r"(?i)--\s*label:\s*(\w+)").unwrap();
    static ref HTTP_LINE_RE: Regex =
        Regex::new(r"(?i)^(GET|POST|PUT|DELETE|PATCH)\s+(.+)$").unwrap();
    static ref QUOTED_RE: Regex = Regex::new(r#"^["'](.*)["']$"#).unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiblingSources {
    pub sql: Option<String>,
    pub api: Option<String>,
    pub lang: Option<String>,
    pub head: Option<String>,
}

impl SiblingSources {
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        serde_json::from_str(json).map_err(CompileError::InvalidSiblings)
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_none() && self.api.is_none() && self.lang.is_none() && self.head.is_none()
    }
}

/// Parse every present sibling text into the matching manifest fields.
pub fn apply_siblings(manifest: &mut ComponentManifest, siblings: &SiblingSources) {
    if let Some(sql) = siblings.sql.as_deref() {
        manifest.sql_queries.extend(parse_sql_queries(sql));
    }
    if let Some(api) = siblings.api.as_deref() {
        manifest.api_endpoints.extend(parse_api_endpoints(api));
    }
    if let Some(lang) = siblings.lang.as_deref() {
        for (key, locales) in parse_localization(lang) {
            manifest.localization.entry(key).or_default().extend(locales);
        }
    }
    if let Some(head) = siblings.head.as_deref() {
        parse_head_into(head, &mut manifest.head);
    }
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn strip_quotes(value: &str) -> String {
    QUOTED_RE.replace(value.trim(), "$1").trim().to_string()
}

/// Split `key: value` on the first colon.
fn split_pair(text: &str) -> (&str, &str) {
    match text.split_once(':') {
        Some((k, v)) => (k.trim(), v.trim()),
        None => (text.trim(), ""),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SQL
// ═══════════════════════════════════════════════════════════════════════════════

/// `-- label: NAME` starts a query; every following line belongs to it.
pub fn parse_sql_queries(source: &str) -> Vec<SqlQuery> {
    fn flush(queries: &mut Vec<SqlQuery>, label: Option<String>, body: &str) {
        if let Some(label) = label {
            let statement = body.trim();
            if !statement.is_empty() {
                queries.push(SqlQuery {
                    label,
                    statement: statement.to_string(),
                });
            }
        }
    }

    let mut queries = Vec::new();
    let mut label: Option<String> = None;
    let mut body = String::new();

    for line in source.lines() {
        if let Some(caps) = LABEL_RE.captures(line) {
            flush(&mut queries, label.take(), &body);
            label = Some(caps[1].to_string());
            body.clear();
        } else if label.is_some() {
            body.push_str(line);
            body.push('\n');
        }
    }
    flush(&mut queries, label, &body);

    queries
}

// ═══════════════════════════════════════════════════════════════════════════════
// API
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiBlock {
    Headers,
    Query,
    Mock,
}

pub fn parse_api_endpoints(source: &str) -> Vec<ApiEndpoint> {
    let mut endpoints = Vec::new();
    let mut current: Option<ApiEndpoint> = None;
    let mut block: Option<ApiBlock> = None;

    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(caps) = LABEL_RE.captures(line) {
            endpoints.extend(current.take());
            current = Some(ApiEndpoint::new(&caps[1]));
            block = None;
            continue;
        }
        let Some(endpoint) = current.as_mut() else {
            continue;
        };

        let opened = match trimmed {
            t if t.starts_with("headers:") => Some(ApiBlock::Headers),
            t if t.starts_with("query:") => Some(ApiBlock::Query),
            t if t.starts_with("mock:") => Some(ApiBlock::Mock),
            _ => None,
        };
        if let Some(opened) = opened {
            if opened == ApiBlock::Mock {
                endpoint.mock.clear();
            }
            block = Some(opened);
            continue;
        }

        if indent_of(line) > 0 {
            match block {
                Some(ApiBlock::Mock) => {
                    endpoint.mock.push_str(trimmed);
                    endpoint.mock.push('\n');
                }
                Some(ApiBlock::Headers) | Some(ApiBlock::Query) => {
                    if let Some((key, value)) = trimmed.split_once(':') {
                        let target = if block == Some(ApiBlock::Headers) {
                            &mut endpoint.headers
                        } else {
                            &mut endpoint.query
                        };
                        target.insert(key.trim().to_string(), value.trim().to_string());
                    }
                }
                None => {}
            }
        } else if let Some(caps) = HTTP_LINE_RE.captures(trimmed) {
            endpoint.method = caps[1].to_uppercase();
            endpoint.path = caps[2].trim().to_string();
            block = None;
        }
    }
    endpoints.extend(current);

    endpoints
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Top-level lines name a key; indented `locale: text` lines translate it.
pub fn parse_localization(source: &str) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut table: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (key, value) = split_pair(trimmed);
        if indent_of(line) == 0 {
            table.entry(key.to_string()).or_default();
            current = Some(key.to_string());
        } else if let Some(entry) = current.as_ref().and_then(|k| table.get_mut(k)) {
            entry.insert(key.to_string(), strip_quotes(value));
        }
    }

    table
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEAD METADATA
// ═══════════════════════════════════════════════════════════════════════════════

/// Incremental head-metadata reader shared by the sibling text and the
/// in-source `head:` block.
#[derive(Debug, Default)]
pub struct HeadReader {
    section: Option<String>,
}

impl HeadReader {
    /// Feed one trimmed line. `nested` marks lines indented under a section.
    pub fn feed(&mut self, head: &mut HeadMetadata, text: &str, nested: bool) {
        let (key, value) = split_pair(text);
        if key.is_empty() {
            return;
        }
        if !nested {
            if value.is_empty() {
                head.sections.entry(key.to_string()).or_default();
                self.section = Some(key.to_string());
            } else {
                head.fields.insert(key.to_string(), strip_quotes(value));
                self.section = None;
            }
            return;
        }
        match self.section.as_ref() {
            Some(section) => {
                head.sections
                    .entry(section.clone())
                    .or_default()
                    .insert(key.to_string(), strip_quotes(value));
            }
            None => {
                head.fields.insert(key.to_string(), strip_quotes(value));
            }
        }
    }
}

pub fn parse_head_into(source: &str, head: &mut HeadMetadata) {
    let mut reader = HeadReader::default();
    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            continue;
        }
        reader.feed(head, trimmed, indent_of(line) > 0);
    }
}

pub fn parse_head(source: &str) -> HeadMetadata {
    let mut head = HeadMetadata::default();
    parse_head_into(source, &mut head);
    head
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_labels_split_queries() {
        let sql = "-- label: latestPosts\nSELECT * FROM posts\nORDER BY id DESC;\n\n-- label: byId\nSELECT * FROM posts WHERE id = :id;\n-- label: empty\n";
        let queries = parse_sql_queries(sql);
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].label, "latestPosts");
        assert_eq!(queries[0].statement, "SELECT * FROM posts\nORDER BY id DESC;");
        assert_eq!(queries[1].label, "byId");
    }

    #[test]
    fn test_sql_without_label_is_ignored() {
        assert!(parse_sql_queries("SELECT 1;").is_empty());
    }

    #[test]
    fn test_api_endpoint_blocks() {
        let api = "-- label: createPost\nPOST /api/posts\nheaders:\n    Authorization: Bearer $token\nquery:\n    draft: true\nmock:\n    { \"id\": 1 }\n-- label: ping\n";
        let endpoints = parse_api_endpoints(api);
        assert_eq!(endpoints.len(), 2);
        let create = &endpoints[0];
        assert_eq!(create.method, "POST");
        assert_eq!(create.path, "/api/posts");
        assert_eq!(
            create.headers.get("Authorization").map(String::as_str),
            Some("Bearer $token")
        );
        assert_eq!(create.query.get("draft").map(String::as_str), Some("true"));
        assert_eq!(create.mock, "{ \"id\": 1 }\n");
        assert_eq!(endpoints[1].method, "GET");
        assert_eq!(endpoints[1].path, "/");
    }

    #[test]
    fn test_localization_table() {
        let lang = "# greetings\nwelcome:\n    en: \"Welcome\"\n    fr: 'Bienvenue'\nbye:\n    en: See you: soon\n";
        let table = parse_localization(lang);
        assert_eq!(table["welcome"]["en"], "Welcome");
        assert_eq!(table["welcome"]["fr"], "Bienvenue");
        assert_eq!(table["bye"]["en"], "See you: soon");
    }

    #[test]
    fn test_head_fields_and_sections() {
        let head = parse_head("title: \"My Blog\"\nog:\n    type: website\n    image: /cover.png\ndescription: Posts");
        assert_eq!(head.title(), Some("My Blog"));
        assert_eq!(head.fields["description"], "Posts");
        assert_eq!(head.sections["og"]["image"], "/cover.png");
    }

    #[test]
    fn test_apply_siblings_merges_everything() {
        let mut manifest = ComponentManifest::default();
        let siblings = SiblingSources {
            sql: Some("-- label: all\nSELECT 1;".into()),
            api: None,
            lang: Some("hi:\n    en: Hi".into()),
            head: Some("title: Home".into()),
        };
        apply_siblings(&mut manifest, &siblings);
        assert_eq!(manifest.sql_queries.len(), 1);
        assert!(manifest.api_endpoints.is_empty());
        assert_eq!(manifest.localization["hi"]["en"], "Hi");
        assert_eq!(manifest.head.title(), Some("Home"));
    }

    #[test]
    fn test_siblings_from_json() {
        let s = SiblingSources::from_json(r#"{"sql":"-- label: a\nSELECT 1;"}"#).unwrap();
        assert!(s.sql.is_some());
        assert!(s.api.is_none());
        assert!(!s.is_empty());
    }
}
