//! Built-in simple types and facet checks.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

// ─── Built-in types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
  AnySimpleType,
  String,
  NormalizedString,
  Token,
  Language,
  Name,
  NcName,
  Id,
  IdRef,
  QName,
  AnyUri,
  Boolean,
  Decimal,
  Integer,
  Long,
  Int,
  Short,
  Byte,
  NonNegativeInteger,
  PositiveInteger,
  NonPositiveInteger,
  NegativeInteger,
  UnsignedLong,
  UnsignedInt,
  UnsignedShort,
  UnsignedByte,
  Float,
  Double,
  Date,
  DateTime,
  Time,
  Base64Binary,
  HexBinary,
}

/// How a type normalises whitespace before checking the lexical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
  Preserve,
  Replace,
  Collapse,
}

impl Builtin {
  /// Look up a type by its local name in the XML Schema namespace.
  /// `anyType` is handled by the caller since it is not a simple type.
  pub fn from_name(local: &str) -> Option<Self> {
    Some(match local {
      "anySimpleType" => Self::AnySimpleType,
      "string" => Self::String,
      "normalizedString" => Self::NormalizedString,
      "token" => Self::Token,
      "language" => Self::Language,
      "Name" => Self::Name,
      "NCName" => Self::NcName,
      "ID" => Self::Id,
      "IDREF" => Self::IdRef,
      "QName" => Self::QName,
      "anyURI" => Self::AnyUri,
      "boolean" => Self::Boolean,
      "decimal" => Self::Decimal,
      "integer" => Self::Integer,
      "long" => Self::Long,
      "int" => Self::Int,
      "short" => Self::Short,
      "byte" => Self::Byte,
      "nonNegativeInteger" => Self::NonNegativeInteger,
      "positiveInteger" => Self::PositiveInteger,
      "nonPositiveInteger" => Self::NonPositiveInteger,
      "negativeInteger" => Self::NegativeInteger,
      "unsignedLong" => Self::UnsignedLong,
      "unsignedInt" => Self::UnsignedInt,
      "unsignedShort" => Self::UnsignedShort,
      "unsignedByte" => Self::UnsignedByte,
      "float" => Self::Float,
      "double" => Self::Double,
      "date" => Self::Date,
      "dateTime" => Self::DateTime,
      "time" => Self::Time,
      "base64Binary" => Self::Base64Binary,
      "hexBinary" => Self::HexBinary,
      _ => return None,
    })
  }

  pub fn white_space(self) -> WhiteSpace {
    match self {
      Self::String | Self::AnySimpleType => WhiteSpace::Preserve,
      Self::NormalizedString => WhiteSpace::Replace,
      _ => WhiteSpace::Collapse,
    }
  }

  /// Check the lexical form of an already-normalised value.
  pub fn check(self, value: &str) -> Result<(), String> {
    let ok = match self {
      Self::AnySimpleType | Self::String | Self::Token | Self::AnyUri => true,
      Self::NormalizedString => !value.contains(['\t', '\n', '\r']),
      Self::Language => is_language(value),
      Self::Name => is_name(value, true),
      Self::NcName | Self::Id | Self::IdRef => is_name(value, false),
      Self::QName => match value.split_once(':') {
        Some((p, l)) => is_name(p, false) && is_name(l, false),
        None => is_name(value, false),
      },
      Self::Boolean => matches!(value, "true" | "false" | "1" | "0"),
      Self::Decimal => is_decimal(value),
      Self::Float | Self::Double => is_float(value),
      Self::Date => parse_date(value).is_some(),
      Self::DateTime => parse_date_time(value).is_some(),
      Self::Time => parse_time(value).is_some(),
      Self::Base64Binary => is_base64(value),
      Self::HexBinary => {
        value.len() % 2 == 0 && value.bytes().all(|b| b.is_ascii_hexdigit())
      }
      integer => return check_integer(integer, value),
    };
    if ok {
      Ok(())
    } else {
      Err(format!("{value:?} is not a valid {}", self.xsd_name()))
    }
  }

  fn xsd_name(self) -> &'static str {
    match self {
      Self::AnySimpleType => "anySimpleType",
      Self::String => "string",
      Self::NormalizedString => "normalizedString",
      Self::Token => "token",
      Self::Language => "language",
      Self::Name => "Name",
      Self::NcName => "NCName",
      Self::Id => "ID",
      Self::IdRef => "IDREF",
      Self::QName => "QName",
      Self::AnyUri => "anyURI",
      Self::Boolean => "boolean",
      Self::Decimal => "decimal",
      Self::Integer => "integer",
      Self::Long => "long",
      Self::Int => "int",
      Self::Short => "short",
      Self::Byte => "byte",
      Self::NonNegativeInteger => "nonNegativeInteger",
      Self::PositiveInteger => "positiveInteger",
      Self::NonPositiveInteger => "nonPositiveInteger",
      Self::NegativeInteger => "negativeInteger",
      Self::UnsignedLong => "unsignedLong",
      Self::UnsignedInt => "unsignedInt",
      Self::UnsignedShort => "unsignedShort",
      Self::UnsignedByte => "unsignedByte",
      Self::Float => "float",
      Self::Double => "double",
      Self::Date => "date",
      Self::DateTime => "dateTime",
      Self::Time => "time",
      Self::Base64Binary => "base64Binary",
      Self::HexBinary => "hexBinary",
    }
  }
}

pub fn normalize(value: &str, ws: WhiteSpace) -> String {
  match ws {
    WhiteSpace::Preserve => value.to_owned(),
    WhiteSpace::Replace => value.replace(['\t', '\n', '\r'], " "),
    WhiteSpace::Collapse => value.split_whitespace().collect::<Vec<_>>().join(" "),
  }
}

// ─── Lexical helpers ─────────────────────────────────────────────────────────

fn is_name(value: &str, allow_colon: bool) -> bool {
  let mut chars = value.chars();
  let Some(first) = chars.next() else { return false };
  let start_ok = |c: char| c.is_alphabetic() || c == '_' || (allow_colon && c == ':');
  start_ok(first)
    && chars.all(|c| start_ok(c) || c.is_numeric() || matches!(c, '-' | '.' | '\u{B7}'))
}

fn is_language(value: &str) -> bool {
  let mut parts = value.split('-');
  let primary_ok = parts
    .next()
    .is_some_and(|p| (1..=8).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_alphabetic()));
  primary_ok
    && parts.all(|p| (1..=8).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_alphanumeric()))
}

fn strip_sign(value: &str) -> &str {
  value.strip_prefix(['+', '-']).unwrap_or(value)
}

fn is_decimal(value: &str) -> bool {
  let unsigned = strip_sign(value);
  let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
  (!int.is_empty() || !frac.is_empty())
    && int.bytes().all(|b| b.is_ascii_digit())
    && frac.bytes().all(|b| b.is_ascii_digit())
}

fn is_float(value: &str) -> bool {
  if matches!(value, "INF" | "+INF" | "-INF" | "NaN") {
    return true;
  }
  let (mantissa, exponent) = match value.split_once(['e', 'E']) {
    Some((m, e)) => (m, Some(e)),
    None => (value, None),
  };
  is_decimal(mantissa)
    && exponent.is_none_or(|e| {
      let digits = strip_sign(e);
      !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
    })
}

fn is_base64(value: &str) -> bool {
  let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
  compact.len() % 4 == 0
    && compact
      .trim_end_matches('=')
      .bytes()
      .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
    && compact.len() - compact.trim_end_matches('=').len() <= 2
}

fn check_integer(ty: Builtin, value: &str) -> Result<(), String> {
  let unsigned = strip_sign(value);
  if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
    return Err(format!("{value:?} is not a valid {}", ty.xsd_name()));
  }

  let (min, max): (Option<i128>, Option<i128>) = match ty {
    Builtin::Long => (Some(i64::MIN.into()), Some(i64::MAX.into())),
    Builtin::Int => (Some(i32::MIN.into()), Some(i32::MAX.into())),
    Builtin::Short => (Some(i16::MIN.into()), Some(i16::MAX.into())),
    Builtin::Byte => (Some(i8::MIN.into()), Some(i8::MAX.into())),
    Builtin::NonNegativeInteger => (Some(0), None),
    Builtin::PositiveInteger => (Some(1), None),
    Builtin::NonPositiveInteger => (None, Some(0)),
    Builtin::NegativeInteger => (None, Some(-1)),
    Builtin::UnsignedLong => (Some(0), Some(u64::MAX.into())),
    Builtin::UnsignedInt => (Some(0), Some(u32::MAX.into())),
    Builtin::UnsignedShort => (Some(0), Some(u16::MAX.into())),
    Builtin::UnsignedByte => (Some(0), Some(u8::MAX.into())),
    _ => (None, None),
  };

  // Arbitrarily large integers are fine when the type is unbounded.
  let Ok(n) = value.strip_prefix('+').unwrap_or(value).parse::<i128>() else {
    return if min.is_none() && max.is_none() {
      Ok(())
    } else {
      Err(format!("{value} is out of range for {}", ty.xsd_name()))
    };
  };
  if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
    return Err(format!("{value} is out of range for {}", ty.xsd_name()));
  }
  Ok(())
}

/// Drop a trailing `Z` or `±hh:mm` zone designator.
fn strip_timezone(value: &str) -> &str {
  if let Some(rest) = value.strip_suffix('Z') {
    return rest;
  }
  let bytes = value.as_bytes();
  let n = bytes.len();
  if n > 6 && matches!(bytes[n - 6], b'+' | b'-') && bytes[n - 3] == b':' {
    return &value[..n - 6];
  }
  value
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(strip_timezone(value), "%Y-%m-%d").ok()
}

pub fn parse_date_time(value: &str) -> Option<NaiveDateTime> {
  NaiveDateTime::parse_from_str(strip_timezone(value), "%Y-%m-%dT%H:%M:%S%.f").ok()
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
  NaiveTime::parse_from_str(strip_timezone(value), "%H:%M:%S%.f").ok()
}

// ─── Facets ──────────────────────────────────────────────────────────────────

/// Constraining facets of one restriction step. Empty vectors and `None`
/// mean the facet is absent. Patterns of the same step are alternatives;
/// patterns of base types are checked by their own step.
#[derive(Debug, Clone, Default)]
pub struct Facets {
  pub enumeration:   Vec<String>,
  pub patterns:      Vec<Regex>,
  pub length:        Option<usize>,
  pub min_length:    Option<usize>,
  pub max_length:    Option<usize>,
  pub min_inclusive: Option<String>,
  pub max_inclusive: Option<String>,
  pub min_exclusive: Option<String>,
  pub max_exclusive: Option<String>,
}

impl Facets {
  /// Check `value` (already normalised). `len` is the facet length of the
  /// value: characters for atomic types, items for lists.
  pub fn check(&self, value: &str, len: usize) -> Result<(), String> {
    if !self.enumeration.is_empty() && !self.enumeration.iter().any(|e| e == value) {
      return Err(format!(
        "{value:?} is not one of [{}]",
        self.enumeration.join(", ")
      ));
    }
    if !self.patterns.is_empty() && !self.patterns.iter().any(|p| p.is_match(value)) {
      let patterns: Vec<&str> = self.patterns.iter().map(Regex::as_str).collect();
      return Err(format!("{value:?} does not match pattern {}", patterns.join(" | ")));
    }
    if self.length.is_some_and(|l| len != l) {
      return Err(format!("length {len} is not {}", self.length.unwrap_or_default()));
    }
    if self.min_length.is_some_and(|l| len < l) {
      return Err(format!(
        "length {len} is below the minimum {}",
        self.min_length.unwrap_or_default()
      ));
    }
    if self.max_length.is_some_and(|l| len > l) {
      return Err(format!(
        "length {len} exceeds the maximum {}",
        self.max_length.unwrap_or_default()
      ));
    }

    let bounds = [
      (&self.min_inclusive, std::cmp::Ordering::Less, ">="),
      (&self.max_inclusive, std::cmp::Ordering::Greater, "<="),
    ];
    for (bound, reject, op) in bounds {
      if let Some(b) = bound
        && compare(value, b) == Some(reject)
      {
        return Err(format!("{value} must be {op} {b}"));
      }
    }
    if let Some(b) = &self.min_exclusive
      && compare(value, b).is_some_and(|o| o != std::cmp::Ordering::Greater)
    {
      return Err(format!("{value} must be > {b}"));
    }
    if let Some(b) = &self.max_exclusive
      && compare(value, b).is_some_and(|o| o != std::cmp::Ordering::Less)
    {
      return Err(format!("{value} must be < {b}"));
    }
    Ok(())
  }
}

/// Order two values of the same type: numerically when both are numbers,
/// otherwise as date/time values. `None` when they are not comparable.
///
/// Integers compare exactly within `i128`; other numbers go through `f64`,
/// so decimals beyond its precision may tie. Date-times that both carry an
/// offset compare as instants; otherwise the offset is ignored.
fn compare(a: &str, b: &str) -> Option<std::cmp::Ordering> {
  if let (Ok(x), Ok(y)) = (a.parse::<i128>(), b.parse::<i128>()) {
    return Some(x.cmp(&y));
  }
  if let (Ok(x), Ok(y)) = (a.parse::<f64>(), b.parse::<f64>()) {
    return x.partial_cmp(&y);
  }
  if let (Ok(x), Ok(y)) = (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
    return Some(x.cmp(&y));
  }
  if let (Some(x), Some(y)) = (parse_date_time(a), parse_date_time(b)) {
    return Some(x.cmp(&y));
  }
  if let (Some(x), Some(y)) = (parse_date(a), parse_date(b)) {
    return Some(x.cmp(&y));
  }
  if let (Some(x), Some(y)) = (parse_time(a), parse_time(b)) {
    return Some(x.cmp(&y));
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn integers_respect_ranges() {
    assert!(Builtin::Int.check("42").is_ok());
    assert!(Builtin::Int.check("+42").is_ok());
    assert!(Builtin::Byte.check("128").is_err());
    assert!(Builtin::PositiveInteger.check("0").is_err());
    assert!(Builtin::NonPositiveInteger.check("-5").is_ok());
    assert!(Builtin::Integer.check("123456789012345678901234567890123456789012").is_ok());
    assert!(Builtin::Integer.check("1.5").is_err());
    assert!(Builtin::Integer.check("").is_err());
  }

  #[test]
  fn decimals_and_floats() {
    assert!(Builtin::Decimal.check("-12.50").is_ok());
    assert!(Builtin::Decimal.check(".5").is_ok());
    assert!(Builtin::Decimal.check("1e3").is_err());
    assert!(Builtin::Double.check("1e3").is_ok());
    assert!(Builtin::Float.check("-INF").is_ok());
    assert!(Builtin::Float.check("inf").is_err());
    assert!(Builtin::Decimal.check(".").is_err());
  }

  #[test]
  fn dates_accept_timezones() {
    assert!(Builtin::Date.check("2024-02-29").is_ok());
    assert!(Builtin::Date.check("2024-02-29Z").is_ok());
    assert!(Builtin::Date.check("2024-02-29+05:30").is_ok());
    assert!(Builtin::Date.check("2023-02-29").is_err());
    assert!(Builtin::DateTime.check("2024-01-01T12:30:00.250-08:00").is_ok());
    assert!(Builtin::Time.check("25:00:00").is_err());
  }

  #[test]
  fn names_and_misc() {
    assert!(Builtin::NcName.check("line-item_2").is_ok());
    assert!(Builtin::NcName.check("2line").is_err());
    assert!(Builtin::QName.check("xs:string").is_ok());
    assert!(Builtin::Language.check("en-GB").is_ok());
    assert!(Builtin::Boolean.check("yes").is_err());
    assert!(Builtin::HexBinary.check("0aFF").is_ok());
    assert!(Builtin::Base64Binary.check("aGVsbG8=").is_ok());
    assert!(Builtin::Base64Binary.check("aGVsbG8").is_err());
  }

  #[test]
  fn collapse_normalises_whitespace() {
    assert_eq!(normalize("  a \n\t b ", WhiteSpace::Collapse), "a b");
    assert_eq!(normalize("a\tb", WhiteSpace::Replace), "a b");
  }

  #[test]
  fn facets_bound_numbers_and_lengths() {
    let facets = Facets {
      min_inclusive: Some("1".into()),
      max_exclusive: Some("10".into()),
      ..Facets::default()
    };
    assert!(facets.check("1", 1).is_ok());
    assert!(facets.check("0", 1).is_err());
    assert!(facets.check("10", 2).is_err());

    let facets = Facets { max_length: Some(3), ..Facets::default() };
    assert!(facets.check("abcd", 4).is_err());

    let facets = Facets {
      enumeration: vec!["draft".into(), "final".into()],
      ..Facets::default()
    };
    assert!(facets.check("final", 5).is_ok());
    assert!(facets.check("other", 5).is_err());
  }

  #[test]
  fn facets_compare_dates() {
    let facets = Facets {
      min_inclusive: Some("2024-01-01".into()),
      ..Facets::default()
    };
    assert!(facets.check("2024-06-01", 10).is_ok());
    assert!(facets.check("2023-12-31", 10).is_err());

    let facets = Facets {
      max_inclusive: Some("2024-01-01T12:00:00+02:00".into()),
      ..Facets::default()
    };
    assert!(facets.check("2024-01-01T09:30:00Z", 20).is_ok());
    assert!(facets.check("2024-01-01T11:00:00+00:00", 25).is_err());
  }

  #[test]
  fn large_integers_compare_exactly() {
    let facets = Facets {
      max_inclusive: Some("9007199254740993".into()),
      ..Facets::default()
    };
    assert!(facets.check("9007199254740993", 16).is_ok());
    assert!(facets.check("9007199254740994", 16).is_err());
  }

  #[test]
  fn patterns_of_one_step_are_alternatives() {
    let facets = Facets {
      patterns: vec![Regex::new("^(?:[0-9]+)$").unwrap(), Regex::new("^(?:[a-z]+)$").unwrap()],
      ..Facets::default()
    };
    assert!(facets.check("123", 3).is_ok());
    assert!(facets.check("abc", 3).is_ok());
    assert!(facets.check("abc123", 6).is_err());
  }
}
