//! Path-macro engine: classify and expand time placeholders in source-path
//! templates.
//!
//! A template claims a time granularity through `{date}`, `{hour}`,
//! `{minute}`, `{second}` or `{timestamp}` placeholders (case-insensitive;
//! the pre-escaped `%7Bname%7D` form is accepted as well). The time macros
//! form a containment lattice: every granularity requires all coarser levels
//! to be present, so expansion always produces unambiguous paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::{NoExpand, Regex};

const DAILY_BIT: u8 = 0x1;
const HOURLY_BIT: u8 = 0x2;
const MINUTELY_BIT: u8 = 0x4;
const SECONDLY_BIT: u8 = 0x8;
const TIMESTAMP_BIT: u8 = 0x10;

const DAILY_MASK: u8 = DAILY_BIT;
const HOURLY_MASK: u8 = DAILY_BIT | HOURLY_BIT;
const MINUTELY_MASK: u8 = HOURLY_MASK | MINUTELY_BIT;
const SECONDLY_MASK: u8 = MINUTELY_MASK | SECONDLY_BIT;

/// Time-granularity classification of a path template.
///
/// Valid templates are prefix-complete: `Hourly` requires `{date}` and
/// `{hour}` both present, `Minutely` adds `{minute}`, `Secondly` adds
/// `{second}`. `Timestamp` stands alone. Every other placeholder
/// combination is `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternMacro {
    /// No valid time decomposition.
    Invalid,
    /// `{date}` only.
    Daily,
    /// `{date}` + `{hour}`.
    Hourly,
    /// `{date}` + `{hour}` + `{minute}`.
    Minutely,
    /// `{date}` + `{hour}` + `{minute}` + `{second}`.
    Secondly,
    /// `{timestamp}` only.
    Timestamp,
}

impl PatternMacro {
    /// Seconds covered by one unit of this granularity.
    ///
    /// `Timestamp` and `Invalid` have no unit and return 0.
    pub fn granularity_seconds(self) -> u64 {
        match self {
            PatternMacro::Daily => 86_400,
            PatternMacro::Hourly => 3_600,
            PatternMacro::Minutely => 60,
            PatternMacro::Secondly => 1,
            PatternMacro::Timestamp | PatternMacro::Invalid => 0,
        }
    }

    // Depth in the containment lattice; coarser levels substitute first.
    fn rank(self) -> u8 {
        match self {
            PatternMacro::Daily => 1,
            PatternMacro::Hourly => 2,
            PatternMacro::Minutely => 3,
            PatternMacro::Secondly => 4,
            PatternMacro::Timestamp | PatternMacro::Invalid => 0,
        }
    }
}

const V_DATE: &str = "date";
const V_HOUR: &str = "hour";
const V_MINUTE: &str = "minute";
const V_SECOND: &str = "second";
const V_TIMESTAMP: &str = "timestamp";

const ALL_TIME_MACROS: [PatternMacro; 4] = [
    PatternMacro::Daily,
    PatternMacro::Hourly,
    PatternMacro::Minutely,
    PatternMacro::Secondly,
];

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:\{(\w+)\}|%7B(\w+)%7D)").expect("valid placeholder pattern")
    })
}

fn macro_bit(name: &str) -> u8 {
    match name {
        V_DATE => DAILY_BIT,
        V_HOUR => HOURLY_BIT,
        V_MINUTE => MINUTELY_BIT,
        V_SECOND => SECONDLY_BIT,
        V_TIMESTAMP => TIMESTAMP_BIT,
        _ => 0,
    }
}

fn macro_name(m: PatternMacro) -> &'static str {
    match m {
        PatternMacro::Daily => V_DATE,
        PatternMacro::Hourly => V_HOUR,
        PatternMacro::Minutely => V_MINUTE,
        PatternMacro::Secondly => V_SECOND,
        PatternMacro::Timestamp => V_TIMESTAMP,
        PatternMacro::Invalid => "",
    }
}

fn macro_regex(m: PatternMacro) -> &'static Regex {
    static REGEXES: OnceLock<HashMap<&'static str, Regex>> = OnceLock::new();
    let map = REGEXES.get_or_init(|| {
        [V_DATE, V_HOUR, V_MINUTE, V_SECOND, V_TIMESTAMP]
            .into_iter()
            .map(|name| {
                let re = Regex::new(&format!(r"(?i)(?:\{{{name}\}}|%7B{name}%7D)"))
                    .expect("valid macro pattern");
                (name, re)
            })
            .collect()
    });
    map.get(macro_name(m)).expect("known macro name")
}

/// Classify the time placeholders of a template.
///
/// All placeholder occurrences are scanned, names are lowercased, and the
/// observed macro flags are OR-ed together. Only exact lattice combinations
/// classify; anything else (for example `{hour}` without `{date}`, or
/// `{date}` mixed with `{timestamp}`) is [`PatternMacro::Invalid`].
pub fn extract(template: &str) -> PatternMacro {
    let mut code = 0_u8;
    for caps in placeholder_pattern().captures_iter(template) {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        code |= macro_bit(&name);
    }

    match code {
        TIMESTAMP_BIT => PatternMacro::Timestamp,
        DAILY_MASK => PatternMacro::Daily,
        HOURLY_MASK => PatternMacro::Hourly,
        MINUTELY_MASK => PatternMacro::Minutely,
        SECONDLY_MASK => PatternMacro::Secondly,
        _ => PatternMacro::Invalid,
    }
}

/// True if the template mentions any recognized time placeholder at all.
///
/// Distinguishes a plain path (no time macros, expandable as-is) from a
/// template that names time macros but fails the lattice check.
pub fn contains_time_macro(template: &str) -> bool {
    placeholder_pattern().captures_iter(template).any(|caps| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        macro_bit(&name) != 0
    })
}

/// Render the substitution value of one macro at the given watermark.
pub fn render(m: PatternMacro, watermark: i64) -> String {
    let fmt = match m {
        PatternMacro::Timestamp => return watermark.to_string(),
        PatternMacro::Daily => "%Y-%m-%d",
        PatternMacro::Hourly => "%H",
        PatternMacro::Minutely => "%M",
        PatternMacro::Secondly => "%S",
        PatternMacro::Invalid => return String::new(),
    };
    match DateTime::<Utc>::from_timestamp(watermark, 0) {
        Some(dt) => dt.format(fmt).to_string(),
        None => String::new(),
    }
}

fn replace_time_macro(m: PatternMacro, template: &str, watermark: i64) -> String {
    macro_regex(m)
        .replace_all(template, NoExpand(&render(m, watermark)))
        .into_owned()
}

/// Materialize a template against a watermark.
///
/// `Invalid` templates pass through unchanged. `Timestamp` substitutes only
/// `{timestamp}`. Time macros substitute every level up to the requested
/// granularity, coarsest first. Placeholders outside the requested lattice
/// are preserved literally.
pub fn materialize(m: PatternMacro, template: &str, watermark: i64) -> String {
    if m == PatternMacro::Invalid {
        return template.to_string();
    }
    if m == PatternMacro::Timestamp {
        return replace_time_macro(m, template, watermark);
    }
    let mut out = template.to_string();
    for level in ALL_TIME_MACROS {
        if level.rank() <= m.rank() {
            out = replace_time_macro(level, &out, watermark);
        }
    }
    out
}

/// Substitution values applied to one enumerated path.
pub type MacroValues = BTreeMap<String, String>;

/// Enumerate every concrete path of a template over a product of macro-value
/// axes.
///
/// Each combination of the Cartesian product is applied by keyword
/// substitution, and results are deduplicated by path with later hits
/// discarded. An empty value map yields the template itself; any empty axis
/// yields no paths.
pub fn enumerate_paths_with_macros(
    template: &str,
    values: &BTreeMap<String, Vec<String>>,
) -> HashMap<String, MacroValues> {
    let mut results = HashMap::new();
    if values.is_empty() {
        results.insert(template.to_string(), MacroValues::new());
        return results;
    }

    let mut combos: Vec<MacroValues> = vec![MacroValues::new()];
    for (name, axis) in values {
        let mut next = Vec::with_capacity(combos.len() * axis.len());
        for combo in &combos {
            for value in axis {
                let mut c = combo.clone();
                c.insert(name.clone(), value.clone());
                next.push(c);
            }
        }
        combos = next;
    }

    for combo in combos {
        let mut path = template.to_string();
        for (name, value) in &combo {
            let escaped = regex::escape(name);
            let re = Regex::new(&format!(r"(?i)(?:\{{{escaped}\}}|%7B{escaped}%7D)"))
                .expect("valid value pattern");
            path = re.replace_all(&path, NoExpand(value)).into_owned();
        }
        results.entry(path).or_insert(combo);
    }
    results
}

/// Recover a watermark from applied macro values.
///
/// Contributions are summed: `date` parsed as `%Y-%m-%d`, `hour` x 3600,
/// `minute` x 60, `second` x 1. Unknown keys and unparsable values
/// contribute nothing.
pub fn watermark(values: &MacroValues) -> i64 {
    let mut total = 0_i64;
    for (key, value) in values {
        if key.eq_ignore_ascii_case(V_DATE) {
            if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                total += d
                    .and_hms_opt(0, 0, 0)
                    .map(|t| t.and_utc().timestamp())
                    .unwrap_or(0);
            }
        } else if key.eq_ignore_ascii_case(V_HOUR) {
            total += value.parse::<i64>().unwrap_or(0) * 3_600;
        } else if key.eq_ignore_ascii_case(V_MINUTE) {
            total += value.parse::<i64>().unwrap_or(0) * 60;
        } else if key.eq_ignore_ascii_case(V_SECOND) {
            total += value.parse::<i64>().unwrap_or(0);
        }
    }
    total
}

/// Replace `%7Bname%7D` escapes back into `{name}` for each listed name.
pub fn restore_template(path: &str, names: &[String]) -> String {
    let mut out = path.to_string();
    for name in names {
        out = out.replace(&format!("%7B{name}%7D"), &format!("{{{name}}}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_classifies_lattice_combinations() {
        assert_eq!(extract("s3://b/dt={date}/h={hour}"), PatternMacro::Hourly);
        assert_eq!(extract("s3://b/dt={date}"), PatternMacro::Daily);
        assert_eq!(
            extract("p/{date}/{hour}/{minute}/{second}"),
            PatternMacro::Secondly
        );
        assert_eq!(extract("p/ts={timestamp}"), PatternMacro::Timestamp);
        assert_eq!(extract("plain/path/no/macros"), PatternMacro::Invalid);
    }

    #[test]
    fn extract_rejects_incomplete_prefixes() {
        // spec scenario: minute without its parent macros
        assert_eq!(extract("x/{minute}"), PatternMacro::Invalid);
        assert_eq!(extract("x/{hour}"), PatternMacro::Invalid);
        assert_eq!(extract("x/{date}/{minute}"), PatternMacro::Invalid);
        assert_eq!(extract("x/{date}/{timestamp}"), PatternMacro::Invalid);
    }

    #[test]
    fn extract_is_case_insensitive_and_accepts_escaped_braces() {
        assert_eq!(extract("s3://b/dt={DATE}/h={Hour}"), PatternMacro::Hourly);
        assert_eq!(extract("s3://b/dt=%7Bdate%7D"), PatternMacro::Daily);
    }

    #[test]
    fn materialize_hourly_renders_date_and_hour() {
        // 1700000000 == 2023-11-14T22:13:20Z
        let out = materialize(
            PatternMacro::Hourly,
            "s3://b/dt={date}/h={hour}",
            1_700_000_000,
        );
        assert_eq!(out, "s3://b/dt=2023-11-14/h=22");
    }

    #[test]
    fn materialize_timestamp_substitutes_decimal_seconds() {
        let out = materialize(PatternMacro::Timestamp, "p/ts={timestamp}", 1_700_000_000);
        assert_eq!(out, "p/ts=1700000000");
    }

    #[test]
    fn materialize_preserves_unmatched_placeholders() {
        let out = materialize(PatternMacro::Daily, "p/{date}/{shard}", 1_700_000_000);
        assert_eq!(out, "p/2023-11-14/{shard}");
    }

    #[test]
    fn materialize_invalid_returns_template_unchanged() {
        let t = "p/{minute}";
        assert_eq!(materialize(PatternMacro::Invalid, t, 1_700_000_000), t);
    }

    #[test]
    fn materialize_is_idempotent() {
        let t = "s3://b/dt={date}/h={hour}/x={other}";
        let once = materialize(PatternMacro::Hourly, t, 1_700_000_000);
        let twice = materialize(PatternMacro::Hourly, &once, 1_700_000_000);
        assert_eq!(once, twice);
    }

    #[test]
    fn materialized_output_has_no_recognized_placeholder_left() {
        for t in [
            "p/{date}",
            "p/{date}/{hour}",
            "p/{date}/{hour}/{minute}",
            "p/{date}/{hour}/{minute}/{second}",
            "p/{timestamp}",
        ] {
            let m = extract(t);
            assert_ne!(m, PatternMacro::Invalid);
            let out = materialize(m, t, 1_700_000_000);
            assert!(!contains_time_macro(&out), "leftover macro in {out}");
        }
    }

    #[test]
    fn enumerate_produces_the_value_product() {
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), vec!["1".to_string(), "2".to_string()]);
        values.insert("b".to_string(), vec!["x".to_string()]);
        let out = enumerate_paths_with_macros("p/{a}/{b}", &values);
        assert_eq!(out.len(), 2);
        let kv = out.get("p/1/x").expect("path present");
        assert_eq!(kv.get("a").map(String::as_str), Some("1"));
        assert_eq!(kv.get("b").map(String::as_str), Some("x"));
        assert!(out.contains_key("p/2/x"));
    }

    #[test]
    fn enumerate_with_empty_map_yields_template_itself() {
        let out = enumerate_paths_with_macros("p/literal", &BTreeMap::new());
        assert_eq!(out.len(), 1);
        assert!(out.contains_key("p/literal"));
    }

    #[test]
    fn enumerate_with_empty_axis_yields_nothing() {
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), Vec::new());
        let out = enumerate_paths_with_macros("p/{a}", &values);
        assert!(out.is_empty());
    }

    #[test]
    fn enumerate_dedups_by_resulting_path() {
        // both values of {a} collapse to the same path when {a} is absent
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), vec!["1".to_string(), "2".to_string()]);
        let out = enumerate_paths_with_macros("p/fixed", &values);
        assert_eq!(out.len(), 1);
        let kv = out.get("p/fixed").expect("path present");
        assert_eq!(kv.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn watermark_sums_axis_contributions() {
        let mut values = MacroValues::new();
        values.insert("date".to_string(), "2023-11-14".to_string());
        values.insert("hour".to_string(), "22".to_string());
        values.insert("minute".to_string(), "13".to_string());
        values.insert("second".to_string(), "20".to_string());
        assert_eq!(watermark(&values), 1_700_000_000);
    }

    #[test]
    fn granularity_seconds_follows_the_unit_table() {
        assert_eq!(PatternMacro::Daily.granularity_seconds(), 86_400);
        assert_eq!(PatternMacro::Hourly.granularity_seconds(), 3_600);
        assert_eq!(PatternMacro::Minutely.granularity_seconds(), 60);
        assert_eq!(PatternMacro::Secondly.granularity_seconds(), 1);
        assert_eq!(PatternMacro::Timestamp.granularity_seconds(), 0);
        assert_eq!(PatternMacro::Invalid.granularity_seconds(), 0);
    }

    #[test]
    fn restore_template_rebuilds_braces() {
        let restored = restore_template(
            "s3://b/dt=%7Bdate%7D/h=%7Bhour%7D",
            &["date".to_string(), "hour".to_string()],
        );
        assert_eq!(restored, "s3://b/dt={date}/h={hour}");
    }
}
