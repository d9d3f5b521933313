//! OpenAlex work objects
//!
//! Identifiers arrive as URLs (`https://openalex.org/A5023888391`) and are
//! stored by their last segment.

use std::collections::BTreeSet;

use serde_json::Value;

use super::{
    AffiliationEntry, AuthorshipEntry, GrantEntry, WorkSource, YearCount, non_empty, set_summary,
};
use crate::error::Substructure;
use crate::extract::{Fallback, FieldKind, FieldSpec, FlatAttributes, short_id};
use crate::flatten::{
    Flattened, ListField, flatten_to_rows, flatten_to_string, join_unique, str_at,
};
use crate::tables::{AuthorRow, FunderRow, InstitutionRow};

use FieldKind::*;

static FIELDS: &[FieldSpec] = &[
    FieldSpec::new("work_id", &["id"], ShortId),
    FieldSpec::new("raw_doi", &["doi"], Str),
    FieldSpec::new("title", &["title"], Str),
    FieldSpec::new("display_name", &["display_name"], Str),
    FieldSpec::new("publication_year", &["publication_year"], Int),
    FieldSpec::new("publication_date", &["publication_date"], Date),
    FieldSpec::new("language", &["language"], Str),
    FieldSpec::new("type", &["type"], Str),
    FieldSpec::new("cited_by_count", &["cited_by_count"], Int),
    FieldSpec::new("fwci", &["fwci"], Float),
    FieldSpec::new("is_retracted", &["is_retracted"], Bool),
    FieldSpec::new("updated_date", &["updated_date"], Timestamp),
    FieldSpec::new("created_date", &["created_date"], Date),
    // primary_location
    FieldSpec::new("primary_location_is_oa", &["primary_location", "is_oa"], Bool),
    FieldSpec::new("landing_page_url", &["primary_location", "landing_page_url"], Str),
    FieldSpec::new("source_id", &["primary_location", "source", "id"], ShortId),
    FieldSpec::new("source_name", &["primary_location", "source", "display_name"], Str),
    FieldSpec::new("source_issn_l", &["primary_location", "source", "issn_l"], Str),
    FieldSpec::new("source_is_oa", &["primary_location", "source", "is_oa"], Bool),
    FieldSpec::new(
        "source_is_indexed_in_scopus",
        &["primary_location", "source", "is_indexed_in_scopus"],
        Bool,
    ),
    FieldSpec::new(
        "source_host_org_name",
        &["primary_location", "source", "host_organization_name"],
        Str,
    ),
    FieldSpec::new(
        "source_host_org_lineage_names",
        &["primary_location", "source", "host_organization_lineage_names"],
        Json,
    ),
    FieldSpec::new("source_type", &["primary_location", "source", "type"], Str),
    // biblio
    FieldSpec::new("biblio_volume", &["biblio", "volume"], Str),
    FieldSpec::new("biblio_issue", &["biblio", "issue"], Str),
    FieldSpec::new("biblio_first_page", &["biblio", "first_page"], Str),
    FieldSpec::new("biblio_last_page", &["biblio", "last_page"], Str),
    // primary_topic
    FieldSpec::new("primary_topic_id", &["primary_topic", "id"], ShortId),
    FieldSpec::new("primary_topic_name", &["primary_topic", "display_name"], Str),
    FieldSpec::new("primary_topic_score", &["primary_topic", "score"], Float),
    FieldSpec::new(
        "primary_topic_subfield_name",
        &["primary_topic", "subfield", "display_name"],
        Str,
    ),
    FieldSpec::new(
        "primary_topic_field_name",
        &["primary_topic", "field", "display_name"],
        Str,
    ),
    FieldSpec::new(
        "primary_topic_domain_name",
        &["primary_topic", "domain", "display_name"],
        Str,
    ),
    FieldSpec::new("cnp_value", &["citation_normalized_percentile", "value"], Float),
    FieldSpec::new(
        "cnp_is_top_1_percent",
        &["citation_normalized_percentile", "is_in_top_1_percent"],
        Bool,
    ),
    FieldSpec::new(
        "cnp_is_top_10_percent",
        &["citation_normalized_percentile", "is_in_top_10_percent"],
        Bool,
    ),
    FieldSpec::new("cbpy_min", &["cited_by_percentile_year", "min"], Int),
    FieldSpec::new("cbpy_max", &["cited_by_percentile_year", "max"], Int),
    FieldSpec::new("open_access_status", &["open_access", "oa_status"], Str)
        .or(Fallback::Str("unknown")),
];

/// OpenAlex `works` entity
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAlex;

impl WorkSource for OpenAlex {
    fn name(&self) -> &'static str {
        "openalex"
    }

    fn doi_path(&self) -> &'static [&'static str] {
        &["doi"]
    }

    fn fields(&self) -> &'static [FieldSpec] {
        FIELDS
    }

    fn summarize(&self, record: &Value, attrs: &mut FlatAttributes) {
        let authorships = ListField::at(record, &["authorships"]);
        let authorships = authorships.items();
        let institutions: Vec<Value> = authorships
            .iter()
            .flat_map(|a| ListField::at(a, &["institutions"]).items().to_vec())
            .collect();

        set_summary(
            attrs,
            "author_names",
            flatten_to_string(authorships, |a| str_at(a, &["author", "display_name"])),
        );
        set_summary(
            attrs,
            "author_orcids",
            flatten_to_string(authorships, |a| str_at(a, &["author", "orcid"])),
        );
        set_summary(
            attrs,
            "institution_names",
            flatten_to_string(&institutions, |i| str_at(i, &["display_name"])),
        );
        set_summary(
            attrs,
            "institution_countries",
            flatten_to_string(&institutions, |i| str_at(i, &["country_code"])),
        );

        let corresponding = ListField::at(record, &["corresponding_author_ids"]);
        set_summary(
            attrs,
            "corresponding_author_ids",
            join_unique(
                corresponding
                    .items()
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(short_id),
            ),
        );

        let topics = ListField::at(record, &["topics"]);
        set_summary(
            attrs,
            "topic_names",
            flatten_to_string(topics.items(), |t| str_at(t, &["display_name"])),
        );
        let concepts = ListField::at(record, &["concepts"]);
        set_summary(
            attrs,
            "concept_names_level0",
            flatten_to_string(concepts.items(), |c| {
                let level = lookup_int(c, "level")?;
                (level == 0).then(|| str_at(c, &["display_name"])).flatten()
            }),
        );
        let keywords = ListField::at(record, &["keywords"]);
        set_summary(
            attrs,
            "keyword_names",
            flatten_to_string(keywords.items(), |k| str_at(k, &["display_name"])),
        );

        let grants = ListField::at(record, &["grants"]);
        set_summary(
            attrs,
            "funder_names",
            flatten_to_string(grants.items(), |g| str_at(g, &["funder_display_name"])),
        );
        set_summary(
            attrs,
            "award_ids",
            flatten_to_string(grants.items(), |g| str_at(g, &["award_id"])),
        );
        let sdgs = ListField::at(record, &["sustainable_development_goals"]);
        set_summary(
            attrs,
            "sdg_names",
            flatten_to_string(sdgs.items(), |s| str_at(s, &["display_name"])),
        );
    }

    fn authorships(&self, record: &Value) -> Flattened<AuthorshipEntry> {
        flatten_to_rows(&ListField::at(record, &["authorships"]), authorship_entry)
    }

    fn grants(&self, record: &Value) -> Flattened<GrantEntry> {
        flatten_to_rows(&ListField::at(record, &["grants"]), |g| {
            let funder_id = str_at(g, &["funder"]).and_then(short_id)?;
            Some(GrantEntry {
                funder: FunderRow {
                    funder_id: funder_id.to_string(),
                    display_name: non_empty(str_at(g, &["funder_display_name"])),
                },
                award_id: non_empty(str_at(g, &["award_id"])),
            })
        })
    }

    fn counts_by_year(&self, record: &Value) -> Flattened<YearCount> {
        flatten_to_rows(&ListField::at(record, &["counts_by_year"]), |c| {
            let year = i32::try_from(lookup_int(c, "year")?).ok()?;
            let cited_by_count = lookup_int(c, "cited_by_count")?;
            Some(YearCount {
                year,
                cited_by_count,
            })
        })
    }
}

fn lookup_int(item: &Value, key: &str) -> Option<i64> {
    item.get(key).map(|v| Int.coerce(v)).and_then(|s| s.as_int())
}

fn authorship_entry(item: &Value) -> Option<AuthorshipEntry> {
    let author_id = str_at(item, &["author", "id"]).and_then(short_id)?;
    let mut malformed = Vec::new();
    let mut skipped_items = 0;

    let institutions_field = ListField::at(item, &["institutions"]);
    let institutions = flatten_to_rows(&institutions_field, |inst| {
        let institution_id = str_at(inst, &["id"]).and_then(short_id)?;
        Some(InstitutionRow {
            institution_id: institution_id.to_string(),
            display_name: non_empty(str_at(inst, &["display_name"])),
            ror: non_empty(str_at(inst, &["ror"])),
            country_code: non_empty(str_at(inst, &["country_code"])),
            institution_type: non_empty(str_at(inst, &["type"])),
        })
    });
    if institutions.malformed {
        malformed.push(Substructure::Institutions);
    }
    skipped_items += institutions.skipped_items;

    let raw_text = RawAffiliations::read(item, &mut malformed);
    let institutions = institutions
        .rows
        .into_iter()
        .map(|institution| AffiliationEntry {
            raw_affiliation_string: raw_text.for_institution(&institution.institution_id),
            institution,
        })
        .collect::<Vec<_>>();

    let mut countries = BTreeSet::new();
    let countries_field = ListField::at(item, &["countries"]);
    if countries_field.is_malformed() {
        malformed.push(Substructure::Countries);
    }
    for code in countries_field.items() {
        match code.as_str().map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => {
                countries.insert(code.to_string());
            }
            None => skipped_items += 1,
        }
    }
    countries.extend(
        institutions
            .iter()
            .filter_map(|a| a.institution.country_code.clone()),
    );

    Some(AuthorshipEntry {
        author: AuthorRow {
            author_id: author_id.to_string(),
            display_name: non_empty(str_at(item, &["author", "display_name"])),
            orcid: non_empty(str_at(item, &["author", "orcid"])),
        },
        position: non_empty(str_at(item, &["author_position"])),
        is_corresponding: item.get("is_corresponding").and_then(Value::as_bool),
        raw_author_name: non_empty(str_at(item, &["raw_author_name"])),
        institutions,
        countries: countries.into_iter().collect(),
        malformed,
        skipped_items,
    })
}

/// Raw affiliation text of one authorship
enum RawAffiliations {
    /// `affiliations[]`: (raw string, institution short ids)
    Linked(Vec<(String, Vec<String>)>),
    /// `raw_affiliation_strings` joined, used for every institution
    Unlinked(Option<String>),
}

impl RawAffiliations {
    fn read(item: &Value, malformed: &mut Vec<Substructure>) -> Self {
        let affiliations = ListField::at(item, &["affiliations"]);
        if affiliations.is_malformed() {
            malformed.push(Substructure::Affiliations);
        }
        if !affiliations.items().is_empty() {
            let linked = affiliations
                .items()
                .iter()
                .filter_map(|aff| {
                    let text = str_at(aff, &["raw_affiliation_string"])?;
                    let ids = ListField::at(aff, &["institution_ids"])
                        .items()
                        .iter()
                        .filter_map(Value::as_str)
                        .filter_map(short_id)
                        .map(str::to_string)
                        .collect();
                    Some((text.to_string(), ids))
                })
                .collect();
            return Self::Linked(linked);
        }

        let strings = ListField::at(item, &["raw_affiliation_strings"]);
        if strings.is_malformed() {
            malformed.push(Substructure::Affiliations);
        }
        let joined = strings
            .items()
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        Self::Unlinked((!joined.is_empty()).then_some(joined))
    }

    fn for_institution(&self, institution_id: &str) -> Option<String> {
        match self {
            Self::Unlinked(joined) => joined.clone(),
            Self::Linked(entries) => {
                let mut seen = BTreeSet::new();
                let matched: Vec<&str> = entries
                    .iter()
                    .filter(|(_, ids)| ids.iter().any(|id| id == institution_id))
                    .map(|(text, _)| text.as_str())
                    .filter(|text| seen.insert(*text))
                    .collect();
                (!matched.is_empty()).then(|| matched.join(", "))
            }
        }
    }
}
