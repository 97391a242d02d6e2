//! Realistic values chosen from a property's name or a string `format`.

use chrono::{SecondsFormat, TimeZone, Utc};
use fake::faker::address::en::{
    BuildingNumber, CityName, CountryName, PostCode, StateAbbr, StreetName,
};
use fake::faker::company::en::CompanyName;
use fake::faker::currency::en::CurrencyCode;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::lorem::en::{Paragraph, Sentence, Word};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::RngCore;

use super::random_source::RandomSource;

const DEFAULT_MIN_LENGTH: usize = 5;
const DEFAULT_MAX_LENGTH: usize = 20;
/// 2020-01-01T00:00:00Z ..= 2025-12-31T00:00:00Z
const TIMESTAMP_RANGE: (i64, i64) = (1_577_836_800, 1_767_139_200);

/// Semantic category inferred from a property name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Email,
    FirstName,
    LastName,
    Username,
    FullName,
    Phone,
    IpAddress,
    City,
    Country,
    PostalCode,
    State,
    Street,
    Company,
    Title,
    Description,
    Url,
    DateTime,
    Date,
    Identifier,
    Quantity,
    Price,
    Age,
    Year,
    Rating,
    Password,
    Currency,
    Color,
    Word,
}

/// Numeric range suggested by a category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericHint {
    pub min: f64,
    pub max: f64,
    /// Decimal places for non-integer values.
    pub decimals: Option<u32>,
}

pub fn classify(property: &str) -> Option<Category> {
    let lower = property.to_ascii_lowercase();
    let n: String = lower.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let has = |needles: &[&str]| needles.iter().any(|needle| n.contains(needle));
    let is = |names: &[&str]| names.contains(&n.as_str());

    let category = if has(&["email"]) {
        Category::Email
    } else if property.ends_with("At") || lower.ends_with("_at") || has(&["timestamp", "time"]) {
        Category::DateTime
    } else if has(&["date", "birthday"]) || is(&["dob"]) {
        Category::Date
    } else if is(&["id", "uuid", "guid"]) || property.ends_with("Id") || lower.ends_with("_id") {
        Category::Identifier
    } else if has(&["firstname", "givenname", "forename"]) {
        Category::FirstName
    } else if has(&["lastname", "surname", "familyname"]) {
        Category::LastName
    } else if has(&["username", "nickname", "login"]) {
        Category::Username
    } else if has(&["company", "organization", "organisation", "employer"]) {
        Category::Company
    } else if is(&["name", "displayname", "author", "owner", "customername", "contactname"])
        || n.ends_with("fullname")
    {
        Category::FullName
    } else if has(&["phone"]) || is(&["mobile", "tel", "fax"]) {
        Category::Phone
    } else if is(&["ip", "ipv4"]) || has(&["ipaddress"]) {
        Category::IpAddress
    } else if has(&["city", "town"]) {
        Category::City
    } else if has(&["country"]) {
        Category::Country
    } else if has(&["zip", "postcode", "postalcode"]) {
        Category::PostalCode
    } else if is(&["state", "province", "region"]) {
        Category::State
    } else if has(&["street", "address"]) {
        Category::Street
    } else if has(&["title", "headline", "subject"]) {
        Category::Title
    } else if has(&["description", "summary", "comment", "content", "notes"]) || is(&["bio", "about", "body"]) {
        Category::Description
    } else if has(&["url", "website", "homepage", "link", "avatar", "image", "photo", "picture"]) {
        Category::Url
    } else if has(&["quantity", "count", "stock"]) || is(&["qty"]) {
        Category::Quantity
    } else if has(&["price", "amount", "cost", "total", "salary", "balance", "fee"]) {
        Category::Price
    } else if is(&["age"]) || property.ends_with("Age") || lower.ends_with("_age") {
        Category::Age
    } else if n.ends_with("year") {
        Category::Year
    } else if has(&["rating", "score", "stars"]) {
        Category::Rating
    } else if has(&["password", "secret"]) {
        Category::Password
    } else if has(&["currency"]) {
        Category::Currency
    } else if has(&["color", "colour"]) {
        Category::Color
    } else if has(&["tag", "slug", "keyword", "label", "category"]) || is(&["word"]) {
        Category::Word
    } else {
        return None;
    };
    Some(category)
}

pub fn numeric_hint(category: Category) -> Option<NumericHint> {
    let hint = |min: f64, max: f64, decimals: Option<u32>| NumericHint { min, max, decimals };
    match category {
        Category::Age => Some(hint(18.0, 80.0, None)),
        Category::Price => Some(hint(1.0, 1000.0, Some(2))),
        Category::Year => Some(hint(1970.0, 2030.0, None)),
        Category::Rating => Some(hint(1.0, 5.0, Some(1))),
        Category::Quantity => Some(hint(0.0, 100.0, None)),
        Category::Identifier => Some(hint(1.0, 10_000.0, None)),
        _ => None,
    }
}

/// String value for a named property, if the name maps to a category.
pub fn string_for_property(property: &str, rng: &mut RandomSource) -> Option<String> {
    classify(property).map(|category| string_for_category(category, rng))
}

pub fn string_for_category(category: Category, rng: &mut RandomSource) -> String {
    match category {
        Category::Email => SafeEmail().fake_with_rng(rng),
        Category::FirstName => FirstName().fake_with_rng(rng),
        Category::LastName => LastName().fake_with_rng(rng),
        Category::Username => Username().fake_with_rng(rng),
        Category::FullName => Name().fake_with_rng(rng),
        Category::Phone => PhoneNumber().fake_with_rng(rng),
        Category::IpAddress => ipv4(rng),
        Category::City => CityName().fake_with_rng(rng),
        Category::Country => CountryName().fake_with_rng(rng),
        Category::PostalCode => PostCode().fake_with_rng(rng),
        Category::State => StateAbbr().fake_with_rng(rng),
        Category::Street => {
            let number: String = BuildingNumber().fake_with_rng(rng);
            let street: String = StreetName().fake_with_rng(rng);
            format!("{} {}", number, street)
        }
        Category::Company => CompanyName().fake_with_rng(rng),
        Category::Title => {
            let sentence: String = Sentence(2..6).fake_with_rng(rng);
            sentence.trim_end_matches('.').to_string()
        }
        Category::Description => Paragraph(1..3).fake_with_rng(rng),
        Category::Url => url(rng),
        Category::DateTime => date_time(rng),
        Category::Date => date(rng),
        Category::Identifier => uuid(rng),
        Category::Password => alphanumeric(rng, 16),
        Category::Currency => CurrencyCode().fake_with_rng(rng),
        Category::Color => format!("#{:06x}", rng.next_int(0, 0xFF_FFFF)),
        Category::Word => Word().fake_with_rng(rng),
        Category::Quantity | Category::Price | Category::Age | Category::Year | Category::Rating => {
            let hint = numeric_hint(category).unwrap_or(NumericHint {
                min: 0.0,
                max: 100.0,
                decimals: None,
            });
            match hint.decimals {
                Some(places) => format!(
                    "{:.*}",
                    places as usize,
                    rng.next_float(hint.min, hint.max)
                ),
                None => rng.next_int(hint.min as i64, hint.max as i64).to_string(),
            }
        }
    }
}

/// String for a known `format`, or `None` for formats without a generator.
pub fn string_for_format(format: &str, rng: &mut RandomSource) -> Option<String> {
    let value = match format {
        "uuid" | "guid" => uuid(rng),
        "email" | "idn-email" => SafeEmail().fake_with_rng(rng),
        "date-time" => date_time(rng),
        "date" => date(rng),
        "time" => time(rng),
        "uri" | "url" | "uri-reference" | "iri" => url(rng),
        "hostname" | "idn-hostname" => {
            let word: String = Word().fake_with_rng(rng);
            format!("{}.example.com", word.to_ascii_lowercase())
        }
        "ipv4" => ipv4(rng),
        "ipv6" => ipv6(rng),
        "password" => alphanumeric(rng, 16),
        _ => return None,
    };
    Some(value)
}

/// Random text honoring optional length bounds.
pub fn random_string(rng: &mut RandomSource, min: Option<usize>, max: Option<usize>) -> String {
    let low = min.unwrap_or(DEFAULT_MIN_LENGTH.min(max.unwrap_or(usize::MAX)));
    let high = max.unwrap_or(if low > DEFAULT_MAX_LENGTH {
        low + 10
    } else {
        DEFAULT_MAX_LENGTH
    });
    let high = high.max(low);
    let target = rng.next_int(low as i64, high as i64) as usize;

    let mut text = String::with_capacity(target + 12);
    while text.len() < target {
        if !text.is_empty() {
            text.push(' ');
        }
        let word: String = Word().fake_with_rng(rng);
        text.push_str(&word);
    }
    fit_length(text, Some(target), Some(target), rng)
}

/// Truncate to `max` characters and pad with letters up to `min`.
pub fn fit_length(
    value: String,
    min: Option<usize>,
    max: Option<usize>,
    rng: &mut RandomSource,
) -> String {
    let mut chars: Vec<char> = value.chars().collect();
    if let Some(max) = max {
        chars.truncate(max);
    }
    while chars.last() == Some(&' ') {
        chars.pop();
    }
    let min = min.unwrap_or(0);
    while chars.len() < min {
        chars.push((b'a' + rng.next_int(0, 25) as u8) as char);
    }
    chars.into_iter().collect()
}

pub fn uuid(rng: &mut RandomSource) -> String {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

fn timestamp(rng: &mut RandomSource) -> chrono::DateTime<Utc> {
    let secs = rng.next_int(TIMESTAMP_RANGE.0, TIMESTAMP_RANGE.1);
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn date_time(rng: &mut RandomSource) -> String {
    timestamp(rng).to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn date(rng: &mut RandomSource) -> String {
    timestamp(rng).format("%Y-%m-%d").to_string()
}

pub fn time(rng: &mut RandomSource) -> String {
    timestamp(rng).format("%H:%M:%S").to_string()
}

fn url(rng: &mut RandomSource) -> String {
    let word: String = Word().fake_with_rng(rng);
    format!(
        "https://example.com/{}/{}",
        word.to_ascii_lowercase(),
        rng.next_int(1, 9999)
    )
}

fn ipv4(rng: &mut RandomSource) -> String {
    format!(
        "{}.{}.{}.{}",
        rng.next_int(1, 223),
        rng.next_int(0, 255),
        rng.next_int(0, 255),
        rng.next_int(1, 254)
    )
}

fn ipv6(rng: &mut RandomSource) -> String {
    (0..8)
        .map(|_| format!("{:x}", rng.next_int(0, 0xFFFF)))
        .collect::<Vec<_>>()
        .join(":")
}

fn alphanumeric(rng: &mut RandomSource, len: usize) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    (0..len)
        .map(|_| CHARSET[rng.next_int(0, CHARSET.len() as i64 - 1) as usize] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_common_names() {
        assert_eq!(classify("email"), Some(Category::Email));
        assert_eq!(classify("contactEmail"), Some(Category::Email));
        assert_eq!(classify("first_name"), Some(Category::FirstName));
        assert_eq!(classify("name"), Some(Category::FullName));
        assert_eq!(classify("createdAt"), Some(Category::DateTime));
        assert_eq!(classify("updated_at"), Some(Category::DateTime));
        assert_eq!(classify("birthDate"), Some(Category::Date));
        assert_eq!(classify("userId"), Some(Category::Identifier));
        assert_eq!(classify("ipAddress"), Some(Category::IpAddress));
        assert_eq!(classify("homeAddress"), Some(Category::Street));
        assert_eq!(classify("price"), Some(Category::Price));
        assert_eq!(classify("age"), Some(Category::Age));
        assert_eq!(classify("status"), None);
        assert_eq!(classify("flag"), None);
    }

    #[test]
    fn test_format_generators() {
        let mut rng = RandomSource::seeded(10);
        let id = string_for_format("uuid", &mut rng).unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());

        let stamp = string_for_format("date-time", &mut rng).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());

        let day = string_for_format("date", &mut rng).unwrap();
        assert!(chrono::NaiveDate::parse_from_str(&day, "%Y-%m-%d").is_ok());

        let ip = string_for_format("ipv4", &mut rng).unwrap();
        assert_eq!(ip.split('.').count(), 4);

        let email = string_for_format("email", &mut rng).unwrap();
        assert!(email.contains('@'));

        assert!(string_for_format("made-up", &mut rng).is_none());
    }

    #[test]
    fn test_random_string_respects_bounds() {
        let mut rng = RandomSource::seeded(11);
        for _ in 0..100 {
            let s = random_string(&mut rng, Some(3), Some(8));
            let len = s.chars().count();
            assert!((3..=8).contains(&len), "length {} out of bounds: {:?}", len, s);
        }
        assert_eq!(random_string(&mut rng, None, Some(0)), "");
        assert!(random_string(&mut rng, Some(40), None).chars().count() >= 40);
    }

    #[test]
    fn test_seeded_fakers_are_reproducible() {
        let mut a = RandomSource::seeded(77);
        let mut b = RandomSource::seeded(77);
        assert_eq!(
            string_for_category(Category::FullName, &mut a),
            string_for_category(Category::FullName, &mut b)
        );
        assert_eq!(uuid(&mut a), uuid(&mut b));
    }

    #[test]
    fn test_fit_length_pads_and_truncates() {
        let mut rng = RandomSource::seeded(12);
        assert_eq!(fit_length("abcdef".into(), None, Some(3), &mut rng), "abc");
        assert_eq!(fit_length("ab".into(), Some(4), None, &mut rng).len(), 4);
    }
}
