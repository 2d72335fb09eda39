use url::Url;

use crate::error::{Error, ErrorKind, Result};

fn malformed(info: impl std::fmt::Display) -> Error {
    Error::new(
        ErrorKind::LinkFormat,
        format!("Malformed link-format payload: {info}"),
    )
}

/// A link of a `CoRE Link-Format` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    target: String,
    attributes: Vec<(String, Option<String>)>,
}

impl Link {
    /// Returns the link target, as written in the payload.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the link attributes in their original order.
    ///
    /// Attributes without a value, such as `obs`, have no value.
    #[must_use]
    pub fn attributes(&self) -> &[(String, Option<String>)] {
        &self.attributes
    }

    /// Returns the value of the first attribute with the given name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Whether an attribute with the given name is present.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|(attribute, _)| attribute == name)
    }

    /// Resolves the link target against a base URI.
    ///
    /// # Errors
    ///
    /// An error is returned when the target is not a valid URI reference.
    pub fn resolve(&self, base: &Url) -> Result<Url> {
        base.join(&self.target).map_err(|e| {
            Error::new(
                ErrorKind::LinkFormat,
                format!("Invalid link target `{}` for `{base}`: {e}", self.target),
            )
        })
    }
}

/// Parses a `CoRE Link-Format` payload.
///
/// Quoted attribute values may contain `,` and `;` and are unescaped.
///
/// # Errors
///
/// An error is returned when the payload is not `UTF-8` or a link is
/// malformed.
pub fn parse(payload: impl AsRef<[u8]>) -> Result<Vec<Link>> {
    let payload = std::str::from_utf8(payload.as_ref()).map_err(malformed)?;

    let mut links = Vec::new();
    let mut rest = payload.trim();
    while !rest.is_empty() {
        let (link, tail) = parse_link(rest)?;
        links.push(link);

        rest = tail.trim_start();
        if let Some(tail) = rest.strip_prefix(',') {
            rest = tail.trim_start();
        } else if !rest.is_empty() {
            return Err(malformed(format!("unexpected `{rest}`")));
        }
    }

    Ok(links)
}

fn parse_link(input: &str) -> Result<(Link, &str)> {
    let input = input
        .strip_prefix('<')
        .ok_or_else(|| malformed(format!("a link must start with `<`, found `{input}`")))?;
    let (target, mut rest) = input
        .split_once('>')
        .ok_or_else(|| malformed("unterminated link target"))?;

    let mut attributes = Vec::new();
    while let Some(tail) = rest.trim_start().strip_prefix(';') {
        let tail = tail.trim_start();
        let end = tail
            .find(|c: char| matches!(c, '=' | ';' | ',') || c.is_whitespace())
            .unwrap_or(tail.len());
        let (name, tail) = tail.split_at(end);
        if name.is_empty() {
            return Err(malformed(format!("missing attribute name for `<{target}>`")));
        }

        let tail = tail.trim_start();
        let value = match tail.strip_prefix('=') {
            Some(tail) => {
                let tail = tail.trim_start();
                let (value, tail) = match tail.strip_prefix('"') {
                    Some(quoted) => parse_quoted(quoted)?,
                    None => {
                        let end = tail.find([';', ',']).unwrap_or(tail.len());
                        (tail[..end].trim_end().to_owned(), &tail[end..])
                    }
                };
                rest = tail;
                Some(value)
            }
            None => {
                rest = tail;
                None
            }
        };

        attributes.push((name.to_owned(), value));
    }

    Ok((
        Link {
            target: target.trim().to_owned(),
            attributes,
        },
        rest,
    ))
}

fn parse_quoted(input: &str) -> Result<(String, &str)> {
    let mut value = String::new();
    let mut chars = input.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '"' => return Ok((value, &input[index + 1..])),
            '\\' => match chars.next() {
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            c => value.push(c),
        }
    }
    Err(malformed("unterminated quoted value"))
}

#[cfg(test)]
mod tests {
    use url::Url;

    use crate::error::ErrorKind;

    use super::parse;

    #[test]
    fn parse_links() {
        let links = parse(
            r#"</sensors/temp>;rt="temperature-c";if="sensor";obs,
               </sensors/light>;title="Light, \"lux\"; indoor";ct=50,</td>"#,
        )
        .unwrap();

        assert_eq!(links.len(), 3);

        assert_eq!(links[0].target(), "/sensors/temp");
        assert_eq!(links[0].attribute("rt"), Some("temperature-c"));
        assert_eq!(links[0].attribute("if"), Some("sensor"));
        assert!(links[0].has_attribute("obs"));
        assert_eq!(links[0].attribute("obs"), None);

        assert_eq!(links[1].target(), "/sensors/light");
        assert_eq!(links[1].attribute("title"), Some(r#"Light, "lux"; indoor"#));
        assert_eq!(links[1].attribute("ct"), Some("50"));

        assert_eq!(links[2].target(), "/td");
        assert!(links[2].attributes().is_empty());
    }

    #[test]
    fn parse_empty_payload() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("  \n").unwrap().is_empty());
        // Trailing separator.
        assert_eq!(parse("</td>,").unwrap().len(), 1);
    }

    #[test]
    fn parse_malformed_payload() {
        for payload in [
            "/td",
            "</td",
            "</td>;",
            r#"</td>;title="unterminated"#,
            "</td> </other>",
        ] {
            assert_eq!(
                parse(payload).unwrap_err().kind(),
                ErrorKind::LinkFormat,
                "{payload}"
            );
        }

        assert_eq!(
            parse([0xff, 0xfe]).unwrap_err().kind(),
            ErrorKind::LinkFormat
        );
    }

    #[test]
    fn resolve_links() {
        let links = parse("</td>,<things/lamp>,<coap://[ff02::fd]/td>").unwrap();
        let base = Url::parse("coap://192.168.1.10:5683/.well-known/core").unwrap();

        let uris: Vec<String> = links
            .iter()
            .map(|link| link.resolve(&base).unwrap().to_string())
            .collect();

        assert_eq!(
            uris,
            [
                "coap://192.168.1.10:5683/td",
                "coap://192.168.1.10:5683/.well-known/things/lamp",
                "coap://[ff02::fd]/td",
            ]
        );
    }
}
