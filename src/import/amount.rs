//! Number parsing for German formatted broker texts ("1.234,56 €", "0,5")

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a money text: thousands '.' dropped, ',' as decimal separator,
/// currency symbols and (non-breaking) spaces ignored.
pub fn parse_money(text: &str) -> Option<Decimal> {
    let clean: String = strip(text).replace('.', "").replace(',', ".");
    Decimal::from_str(&clean).ok().or_else(|| first_number(&clean))
}

/// Parse a share count. Unlike money, '.' is kept as the decimal separator.
pub fn parse_shares(text: &str) -> Option<Decimal> {
    let clean = strip(text).replace(',', ".");
    Decimal::from_str(&clean).ok().or_else(|| first_number(&clean))
}

/// Split a detail text like "1 × 156,60 €" into shares and price
pub fn parse_times(text: &str) -> Option<(Option<Decimal>, Option<Decimal>)> {
    let (shares, price) = text.split_once('×')?;
    Some((
        last_token(shares).and_then(parse_shares),
        first_token(price).and_then(parse_money),
    ))
}

fn strip(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\u{a0}' | '€' | '$' | ' '))
        .collect()
}

fn first_token(s: &str) -> Option<&str> {
    s.split_whitespace().next()
}

fn last_token(s: &str) -> Option<&str> {
    s.split_whitespace().last()
}

/// First signed decimal number embedded in `s`
fn first_number(s: &str) -> Option<Decimal> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let signed = start > 0 && s[..start].ends_with('-');
    let mut seen_dot = false;
    let digits: String = s[start..]
        .chars()
        .take_while(|c| {
            if *c == '.' && !seen_dot {
                seen_dot = true;
                true
            } else {
                c.is_ascii_digit()
            }
        })
        .collect();
    let digits = digits.trim_end_matches('.');
    let value = Decimal::from_str(digits).ok()?;
    Some(if signed { -value } else { value })
}
