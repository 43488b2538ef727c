//! Country and discipline classification.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use conftrack_shared::Catalog;

/// Country names (and common forms) found in location strings.
const COUNTRY_KEYWORDS: &[(&str, &str)] = &[
    ("United Kingdom", "UK"),
    ("United States", "USA"),
    ("Australia", "Australia"),
    ("Canada", "Canada"),
    ("China", "China"),
    ("Japan", "Japan"),
    ("Germany", "Germany"),
    ("France", "France"),
    ("Italy", "Italy"),
    ("Spain", "Spain"),
    ("India", "India"),
    ("Singapore", "Singapore"),
    ("South Korea", "South Korea"),
    ("Korea", "South Korea"),
    ("Brazil", "Brazil"),
    ("Switzerland", "Switzerland"),
    ("Netherlands", "Netherlands"),
    ("Sweden", "Sweden"),
    ("Denmark", "Denmark"),
    ("Finland", "Finland"),
    ("Norway", "Norway"),
    ("Ireland", "Ireland"),
    ("Portugal", "Portugal"),
    ("Greece", "Greece"),
    ("Israel", "Israel"),
    ("UAE", "UAE"),
    ("Saudi Arabia", "Saudi Arabia"),
    ("Turkey", "Turkey"),
    ("Indonesia", "Indonesia"),
    ("Thailand", "Thailand"),
    ("Taiwan", "Taiwan"),
    ("Vietnam", "Vietnam"),
    ("New Zealand", "New Zealand"),
    ("Czech Republic", "Czech Republic"),
    ("Poland", "Poland"),
    ("Hungary", "Hungary"),
    ("Austria", "Austria"),
    ("Belgium", "Belgium"),
    ("Mexico", "Mexico"),
    ("Chile", "Chile"),
    ("Iceland", "Iceland"),
];

/// Cities frequently listed without a country.
const CITIES: &[(&str, &str)] = &[
    ("London", "UK"),
    ("Oxford", "UK"),
    ("Cambridge", "UK"),
    ("Edinburgh", "UK"),
    ("Manchester", "UK"),
    ("Durham", "UK"),
    ("Warwick", "UK"),
    ("Bristol", "UK"),
    ("Lancaster", "UK"),
    ("Paris", "France"),
    ("Lyon", "France"),
    ("Toulouse", "France"),
    ("Berlin", "Germany"),
    ("Frankfurt", "Germany"),
    ("Munich", "Germany"),
    ("Mannheim", "Germany"),
    ("Rome", "Italy"),
    ("Milan", "Italy"),
    ("Venice", "Italy"),
    ("Florence", "Italy"),
    ("Bologna", "Italy"),
    ("Madrid", "Spain"),
    ("Barcelona", "Spain"),
    ("Amsterdam", "Netherlands"),
    ("Rotterdam", "Netherlands"),
    ("Tilburg", "Netherlands"),
    ("Maastricht", "Netherlands"),
    ("Zurich", "Switzerland"),
    ("Geneva", "Switzerland"),
    ("Lausanne", "Switzerland"),
    ("Lugano", "Switzerland"),
    ("Brussels", "Belgium"),
    ("Leuven", "Belgium"),
    ("Copenhagen", "Denmark"),
    ("Lisbon", "Portugal"),
    ("Athens", "Greece"),
    ("Stockholm", "Sweden"),
    ("Helsinki", "Finland"),
    ("Dublin", "Ireland"),
    ("Oslo", "Norway"),
    ("Vienna", "Austria"),
    ("Prague", "Czech Republic"),
    ("Warsaw", "Poland"),
    ("Budapest", "Hungary"),
    ("Beijing", "China"),
    ("Shanghai", "China"),
    ("Shenzhen", "China"),
    ("Hong Kong", "Hong Kong"),
    ("Tokyo", "Japan"),
    ("Seoul", "South Korea"),
    ("Sydney", "Australia"),
    ("Melbourne", "Australia"),
    ("Brisbane", "Australia"),
    ("Mumbai", "India"),
    ("Bangalore", "India"),
    ("Taipei", "Taiwan"),
    ("Bangkok", "Thailand"),
    ("Toronto", "Canada"),
    ("Vancouver", "Canada"),
    ("Montreal", "Canada"),
    ("Banff", "Canada"),
    ("Dubai", "UAE"),
    ("Reykjavik", "Iceland"),
    ("Tel Aviv", "Israel"),
    ("Hanoi", "Vietnam"),
];

static US_STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:AL|AK|AZ|AR|CA|CO|CT|DE|FL|GA|HI|ID|IL|IN|IA|KS|KY|LA|ME|MD|MA|MI|MN|MS|MO|MT|NE|NV|NH|NJ|NM|NY|NC|ND|OH|OK|OR|PA|RI|SC|SD|TN|TX|UT|VT|VA|WA|WV|WI|WY|DC)\b",
    )
    .expect("valid regex")
});

static VIRTUAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:virtual|online|zoom|remote)\b").expect("valid regex"));

/// Country for a free-text location: `"Virtual"` for online events,
/// `"Unknown"` when nothing matches.
pub fn detect_country(location: &str) -> String {
    let loc = location.trim();
    if loc.is_empty() {
        return "Unknown".into();
    }
    let lower = loc.to_lowercase();

    if let Some(country) = lookup(&lower, COUNTRY_KEYWORDS).or_else(|| lookup(&lower, CITIES)) {
        return country;
    }
    if US_STATE_RE.is_match(loc) {
        return "USA".into();
    }
    if VIRTUAL_RE.is_match(loc) {
        return "Virtual".into();
    }
    "Unknown".into()
}

fn lookup(lower: &str, table: &[(&str, &str)]) -> Option<String> {
    table
        .iter()
        .find(|(key, _)| contains_word(lower, &key.to_lowercase()))
        .map(|(_, country)| country.to_string())
}

/// `needle` occurs in `haystack` bounded by non-alphanumerics.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, m)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + m.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Discipline tags from source categories and the event name; the fallback
/// tag when nothing applies.
pub fn detect_disciplines(categories: &[String], name: &str, fallback: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for category in categories {
        let cat = category.to_lowercase();
        match cat.as_str() {
            "fin" | "acct" | "econ" => {
                tags.insert(cat.clone());
            }
            _ => {}
        }
        if cat.contains("finance") {
            tags.insert("fin".to_string());
        }
        if cat.contains("accounting") {
            tags.insert("acct".to_string());
        }
        if cat.contains("econ") {
            tags.insert("econ".to_string());
        }
    }

    let nm = name.to_lowercase();
    if nm.contains("accounting") || nm.contains("auditing") {
        tags.insert("acct".to_string());
    }
    if ["economics", "economic", "macroeconom", "econometric"]
        .iter()
        .any(|w| nm.contains(w))
    {
        tags.insert("econ".to_string());
    }
    if nm.contains("finance") || nm.contains("financial") {
        tags.insert("fin".to_string());
    }

    if tags.is_empty() {
        tags.insert(fallback.to_string());
    }
    tags
}

/// Give every record without a discipline the fallback tag. Returns how
/// many records changed.
pub fn ensure_disciplines(catalog: &mut Catalog, fallback: &str) -> usize {
    let mut changed = 0;
    for record in catalog.records_mut() {
        record.discipline.retain(|d| !d.trim().is_empty());
        if record.discipline.is_empty() {
            record.discipline.insert(fallback.to_string());
            changed += 1;
        }
    }
    changed
}
