//! Struct tag lookup following the conventional `key:"value" key2:"value2"`
//! layout.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, take_while1},
    character::complete::{char, satisfy, space0},
    combinator::{map, opt, value},
    multi::count,
    sequence::{delimited, preceded, separated_pair},
    IResult, Parser,
};

/// Returns the value stored under `key`, or `None` when the key is absent or
/// the tag is malformed before reaching it.
pub fn lookup(tag: &str, key: &str) -> Option<String> {
    let mut input = tag;
    loop {
        let (rest, _) = space0::<_, nom::error::Error<&str>>(input).ok()?;
        if rest.is_empty() {
            return None;
        }
        let (rest, (name, value)) = pair(rest).ok()?;
        if name == key {
            return Some(value);
        }
        input = rest;
    }
}

fn pair(input: &str) -> IResult<&str, (&str, String)> {
    separated_pair(tag_key, char(':'), quoted).parse(input)
}

fn tag_key(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c > ' ' && c != ':' && c != '"' && c != '\x7f').parse(input)
}

fn quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                is_not("\\\""),
                '\\',
                alt((
                    value('\\', char('\\')),
                    value('"', char('"')),
                    value('\n', char('n')),
                    value('\t', char('t')),
                    value('\r', char('r')),
                    preceded(char('u'), unicode_escape),
                )),
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )
    .parse(input)
}

fn unicode_escape(input: &str) -> IResult<&str, char> {
    let (rest, digits) = count(hex, 4).parse(input)?;
    let code = digits
        .iter()
        .fold(0u32, |acc, digit| acc * 16 + digit.to_digit(16).unwrap_or(0));
    match char::from_u32(code) {
        Some(decoded) => Ok((rest, decoded)),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        ))),
    }
}

fn hex(input: &str) -> IResult<&str, char> {
    satisfy(|c: char| c.is_ascii_hexdigit()).parse(input)
}

#[cfg(test)]
mod tests {
    use super::lookup;

    #[test]
    fn finds_each_key() {
        let tag = r#"json:"name,omitempty" unmarshalmap:"display_name""#;
        assert_eq!(lookup(tag, "json").as_deref(), Some("name,omitempty"));
        assert_eq!(lookup(tag, "unmarshalmap").as_deref(), Some("display_name"));
        assert_eq!(lookup(tag, "yaml"), None);
    }

    #[test]
    fn decodes_escapes_and_empty_values() {
        assert_eq!(lookup(r#"a:"x\"y""#, "a").as_deref(), Some("x\"y"));
        assert_eq!(lookup(r#"a:"" b:"1""#, "b").as_deref(), Some("1"));
        assert_eq!(lookup(r#"a:"""#, "a").as_deref(), Some(""));
    }

    #[test]
    fn stops_at_malformed_input() {
        assert_eq!(lookup("a:unquoted b:\"1\"", "b"), None);
    }
}
