//! Scopus search API entries (`search-results.entry[]`, COMPLETE view)
//!
//! Most values arrive as strings, including counts and flags. Authors
//! reference affiliations by `afid`, resolved against the entry's own
//! `affiliation[]` list.

use std::str::FromStr;

use celes::Country;
use rustc_hash::FxHashMap;
use serde_json::Value;

use super::{AffiliationEntry, AuthorshipEntry, WorkSource, non_empty, set_summary};
use crate::error::Substructure;
use crate::extract::{FieldKind, FieldSpec, FlatAttributes, Scalar};
use crate::flatten::{
    Flattened, ListField, flatten_to_rows, flatten_to_string, join_unique, str_at,
};
use crate::tables::{AuthorRow, InstitutionRow};

use FieldKind::*;

/// Separator Scopus uses inside `authkeywords`
const KEYWORD_SEPARATOR: &str = " | ";

/// Scopus country spellings that differ from the ISO 3166 short names
const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("United States", "US"),
    ("United Kingdom", "GB"),
    ("South Korea", "KR"),
    ("Russian Federation", "RU"),
    ("Taiwan", "TW"),
    ("Viet Nam", "VN"),
    ("Iran", "IR"),
    ("Hong Kong", "HK"),
    ("Netherlands", "NL"),
    ("Czech Republic", "CZ"),
    ("Turkey", "TR"),
];

static FIELDS: &[FieldSpec] = &[
    FieldSpec::new("work_id", &["eid"], Str),
    FieldSpec::new("work_id", &["dc:identifier"], Str),
    FieldSpec::new("raw_doi", &["prism:doi"], Str),
    FieldSpec::new("title", &["dc:title"], Str),
    FieldSpec::new("display_name", &["dc:title"], Str),
    FieldSpec::new("publication_year", &["prism:coverDate"], YearOf),
    FieldSpec::new("publication_date", &["prism:coverDate"], Date),
    FieldSpec::new("type", &["subtypeDescription"], Str),
    FieldSpec::new("type", &["subtype"], Str),
    FieldSpec::new("cited_by_count", &["citedby-count"], Int),
    FieldSpec::new("primary_location_is_oa", &["openaccessFlag"], Bool),
    FieldSpec::new("source_id", &["source-id"], Str),
    FieldSpec::new("source_name", &["prism:publicationName"], Str),
    FieldSpec::new("source_issn_l", &["prism:issn"], Str),
    FieldSpec::new("source_issn_l", &["prism:eIssn"], Str),
    FieldSpec::new("source_type", &["prism:aggregationType"], Str),
    FieldSpec::new("biblio_volume", &["prism:volume"], Str),
    FieldSpec::new("biblio_issue", &["prism:issueIdentifier"], Str),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Scopus;

impl WorkSource for Scopus {
    fn name(&self) -> &'static str {
        "scopus"
    }

    fn doi_path(&self) -> &'static [&'static str] {
        &["prism:doi"]
    }

    fn fields(&self) -> &'static [FieldSpec] {
        FIELDS
    }

    fn summarize(&self, record: &Value, attrs: &mut FlatAttributes) {
        if let Some((first, last)) = str_at(record, &["prism:pageRange"]).and_then(page_range) {
            attrs.set("biblio_first_page", Scalar::Str(first.to_string()));
            if let Some(last) = last {
                attrs.set("biblio_last_page", Scalar::Str(last.to_string()));
            }
        }
        if let Some(url) = scopus_link(record) {
            attrs.set("landing_page_url", Scalar::Str(url.to_string()));
        }

        let authors = ListField::at(record, &["author"]);
        set_summary(
            attrs,
            "author_names",
            flatten_to_string(authors.items(), |a| str_at(a, &["authname"])),
        );
        set_summary(
            attrs,
            "author_orcids",
            flatten_to_string(authors.items(), |a| str_at(a, &["orcid"])),
        );
        let affiliations = ListField::at(record, &["affiliation"]);
        set_summary(
            attrs,
            "institution_names",
            flatten_to_string(affiliations.items(), |a| str_at(a, &["affilname"])),
        );
        set_summary(
            attrs,
            "institution_countries",
            flatten_to_string(affiliations.items(), |a| {
                str_at(a, &["affiliation-country"])
            }),
        );
        if let Some(keywords) = str_at(record, &["authkeywords"]) {
            set_summary(
                attrs,
                "keyword_names",
                join_unique(keywords.split(KEYWORD_SEPARATOR)),
            );
        }
        set_summary(attrs, "funder_names", text_values(record, "fund-sponsor"));
        set_summary(attrs, "award_ids", text_values(record, "fund-no"));
    }

    fn malformed_lists(&self, record: &Value) -> Vec<Substructure> {
        if ListField::at(record, &["affiliation"]).is_malformed() {
            vec![Substructure::Institutions]
        } else {
            Vec::new()
        }
    }

    fn authorships(&self, record: &Value) -> Flattened<AuthorshipEntry> {
        let affiliation_field = ListField::at(record, &["affiliation"]);
        let affiliations: FxHashMap<&str, &Value> = affiliation_field
            .items()
            .iter()
            .filter_map(|aff| Some((str_at(aff, &["afid"])?, aff)))
            .collect();

        let authors = ListField::at(record, &["author"]);
        // Non-object items yield no row and take no position
        let count = authors.items().iter().filter(|a| a.is_object()).count();
        let mut index = 0;
        flatten_to_rows(&authors, |item| {
            index += 1;
            let author_id = str_at(item, &["authid"])?;
            let seq = str_at(item, &["@seq"])
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(index);
            let name = non_empty(str_at(item, &["authname"]));

            let mut malformed = Vec::new();
            let afids = ListField::at(item, &["afid"]);
            if afids.is_malformed() {
                malformed.push(Substructure::Affiliations);
            }
            let mut skipped_items = 0;
            let mut institutions = Vec::new();
            for afid in afids.items() {
                let Some(id) = str_at(afid, &["$"]).or_else(|| afid.as_str()) else {
                    skipped_items += 1;
                    continue;
                };
                let affiliation = affiliations.get(id).copied();
                institutions.push(AffiliationEntry {
                    institution: InstitutionRow {
                        institution_id: id.to_string(),
                        display_name: affiliation
                            .and_then(|a| non_empty(str_at(a, &["affilname"]))),
                        ror: None,
                        country_code: None,
                        institution_type: None,
                    },
                    raw_affiliation_string: affiliation.and_then(raw_affiliation),
                });
            }

            let mut countries = Vec::new();
            for aff in institutions
                .iter()
                .filter_map(|a| affiliations.get(a.institution.institution_id.as_str()))
            {
                let Some(name) = str_at(aff, &["affiliation-country"]) else {
                    continue;
                };
                match country_code(name) {
                    Some(code) => countries.push(code.to_string()),
                    None => {
                        log::trace!("Unrecognized affiliation country {name:?}");
                        skipped_items += 1;
                    }
                }
            }
            countries.sort_unstable();
            countries.dedup();

            Some(AuthorshipEntry {
                author: AuthorRow {
                    author_id: author_id.to_string(),
                    display_name: name.clone(),
                    orcid: non_empty(str_at(item, &["orcid"])),
                },
                position: Some(position(seq, count).to_string()),
                is_corresponding: None,
                raw_author_name: name,
                institutions,
                countries,
                malformed,
                skipped_items,
            })
        })
    }
}

/// ISO 3166-1 alpha-2 code of a Scopus country name
fn country_code(name: &str) -> Option<&'static str> {
    let name = name.trim();
    if let Some((_, code)) = COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
    {
        return Some(*code);
    }
    Country::from_str(name)
        .or_else(|_| Country::from_str(&name.replace(' ', "")))
        .ok()
        .map(|c| c.alpha2)
}

/// `first` / `middle` / `last` from a 1-based sequence number
fn position(seq: usize, count: usize) -> &'static str {
    if seq <= 1 {
        "first"
    } else if seq >= count {
        "last"
    } else {
        "middle"
    }
}

/// `"123-130"` → (`123`, `Some(130)`); a single page has no last page
fn page_range(range: &str) -> Option<(&str, Option<&str>)> {
    let mut parts = range.splitn(2, '-').map(str::trim);
    let first = parts.next().filter(|p| !p.is_empty())?;
    let last = parts.next().filter(|p| !p.is_empty());
    Some((first, last))
}

/// `link[]` entry with `@ref == "scopus"`
fn scopus_link(record: &Value) -> Option<&str> {
    record
        .get("link")?
        .as_array()?
        .iter()
        .find(|l| str_at(l, &["@ref"]) == Some("scopus"))
        .and_then(|l| l.get("@href"))
        .and_then(Value::as_str)
}

/// Name, city and country of an affiliation, `", "`-joined
fn raw_affiliation(affiliation: &Value) -> Option<String> {
    let parts: Vec<&str> = ["affilname", "affiliation-city", "affiliation-country"]
        .iter()
        .filter_map(|key| str_at(affiliation, &[*key]))
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// A string or list-of-strings field; Scopus writes `"undefined"` for gaps
fn text_values(record: &Value, key: &str) -> String {
    let values: Vec<&str> = match record.get(key) {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    join_unique(values.into_iter().filter(|v| !v.eq_ignore_ascii_case("undefined")))
}
