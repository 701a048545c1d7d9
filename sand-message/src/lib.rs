//! SAND message validation primitives.
//!
//! Checks that a byte buffer holds a conforming ISO/IEC 23009-5 `SANDMessage`
//! envelope: well-formed XML, the SAND namespace, the envelope attributes and
//! only known message elements directly below the root. Message payloads
//! (anything below a message element) are not inspected.

mod message_type;

pub use message_type::{MessageCategory, MessageType};

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{LocalName, Namespace, ResolveResult};
use thiserror::Error;

/// XML namespace of SAND messages.
pub const SAND_NAMESPACE: &str = "urn:mpeg:dash:schema:sandmessage:2016";

/// Local name of the envelope element.
pub const SAND_ENVELOPE: &str = "SANDMessage";

/// Media type SAND messages must be served with.
pub const SAND_CONTENT_TYPE: &str = "application/sand+xml";

/// HTTP header carrying the URL of a SAND message (lower case, headers are
/// case-insensitive).
pub const SAND_HEADER: &str = "mpeg-dash-sand";

/// Resource limits applied before and while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum accepted body size in bytes.
    pub max_bytes: usize,
    /// Maximum element nesting depth.
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_bytes: 1_048_576,
            max_depth: 64,
        }
    }
}

/// Errors from SAND envelope validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    /// The body is not well-formed XML.
    #[error("Malformed XML at byte {position}: {cause}")]
    Malformed {
        /// Byte offset where the parser stopped.
        position: u64,
        /// Human-readable description of the problem.
        cause: String,
    },

    /// The body is well-formed but violates the envelope rules.
    #[error("Schema violation at {path}: {cause}")]
    Schema {
        /// Element/attribute path of the offending node.
        path: String,
        /// Human-readable description of the problem.
        cause: String,
    },

    /// A configured resource limit was hit; the body was not fully checked.
    #[error("Limit exceeded: {cause}")]
    LimitExceeded {
        /// Human-readable description of the limit.
        cause: String,
    },
}

impl MessageError {
    fn schema(path: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            cause: cause.into(),
        }
    }
}

/// A single message found inside an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandMessage {
    pub message_type: MessageType,
    pub message_id: u32,
    pub validity_time: Option<DateTime<FixedOffset>>,
}

/// Summary of a valid `SANDMessage` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandEnvelope {
    pub sender_id: String,
    pub generation_time: Option<DateTime<FixedOffset>>,
    pub messages: Vec<SandMessage>,
}

impl SandEnvelope {
    /// Number of messages of the given category.
    #[must_use]
    pub fn count(&self, category: MessageCategory) -> usize {
        self.messages
            .iter()
            .filter(|m| m.message_type.category() == category)
            .count()
    }
}

/// Validate a SAND envelope.
///
/// # Errors
///
/// - [`MessageError::LimitExceeded`] if `body` is larger than `limits.max_bytes`
///   or nests deeper than `limits.max_depth`.
/// - [`MessageError::Malformed`] if `body` is not well-formed XML.
/// - [`MessageError::Schema`] if the document is not a conforming envelope.
pub fn validate_envelope(body: &[u8], limits: Limits) -> Result<SandEnvelope, MessageError> {
    if body.len() > limits.max_bytes {
        return Err(MessageError::LimitExceeded {
            cause: format!("message is larger than {} bytes", limits.max_bytes),
        });
    }

    let mut reader = NsReader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut depth: usize = 0;
    let mut envelope: Option<SandEnvelope> = None;
    let mut root_closed = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| malformed(&reader, e))?;

        match event {
            Event::Start(ref start) | Event::Empty(ref start) => {
                if root_closed {
                    return Err(malformed(&reader, "more than one root element"));
                }
                if depth == 0 {
                    envelope = Some(read_envelope(&reader, start)?);
                } else if depth == 1
                    && let Some(env) = envelope.as_mut()
                {
                    let index = env.messages.len() + 1;
                    env.messages.push(read_message(&reader, start, index)?);
                } else {
                    check_payload_element(&reader, start)?;
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                    if depth > limits.max_depth {
                        return Err(MessageError::LimitExceeded {
                            cause: format!("element nesting exceeds {} levels", limits.max_depth),
                        });
                    }
                } else if depth == 0 {
                    root_closed = true;
                }
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed(&reader, "end tag without start tag"))?;
                if depth == 0 {
                    root_closed = true;
                }
            }
            Event::Text(ref text) => {
                text.unescape().map_err(|e| malformed(&reader, e))?;
                check_character_data(&reader, depth)?;
            }
            Event::CData(ref data) => {
                reader
                    .decoder()
                    .decode(data)
                    .map_err(|e| malformed(&reader, e))?;
                check_character_data(&reader, depth)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if depth > 0 {
        return Err(malformed(&reader, "unexpected end of document, unclosed element"));
    }
    envelope.ok_or_else(|| malformed(&reader, "document has no root element"))
}

fn malformed<R>(reader: &NsReader<R>, cause: impl ToString) -> MessageError {
    MessageError::Malformed {
        position: u64::try_from(reader.buffer_position()).unwrap_or(u64::MAX),
        cause: cause.to_string(),
    }
}

fn check_character_data<R>(reader: &NsReader<R>, depth: usize) -> Result<(), MessageError> {
    match depth {
        0 => Err(malformed(reader, "character data outside the root element")),
        1 => Err(MessageError::schema(
            envelope_path(),
            "character data is not allowed directly inside the envelope",
        )),
        _ => Ok(()),
    }
}

/// Well-formedness of an element below a message: its name and every
/// attribute must decode, and prefixes must be declared.
fn check_payload_element<R>(
    reader: &NsReader<R>,
    start: &BytesStart<'_>,
) -> Result<(), MessageError> {
    reader
        .decoder()
        .decode(start.name().as_ref())
        .map_err(|e| malformed(reader, e))?;
    let (ns, _) = reader.resolve_element(start.name());
    if let ResolveResult::Unknown(prefix) = &ns {
        return Err(undeclared_prefix(reader, prefix));
    }
    attributes(reader, start)?;
    Ok(())
}

fn undeclared_prefix<R>(reader: &NsReader<R>, prefix: &[u8]) -> MessageError {
    malformed(
        reader,
        format!(
            "undeclared namespace prefix '{}'",
            String::from_utf8_lossy(prefix)
        ),
    )
}

fn envelope_path() -> String {
    format!("/{SAND_ENVELOPE}")
}

fn is_sand_namespace(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == SAND_NAMESPACE.as_bytes())
}

fn display_name(ns: &ResolveResult<'_>, local: LocalName<'_>) -> String {
    let local = String::from_utf8_lossy(local.as_ref());
    match ns {
        ResolveResult::Bound(Namespace(uri)) => {
            format!("{{{}}}{local}", String::from_utf8_lossy(uri))
        }
        _ => local.into_owned(),
    }
}

/// Decode every attribute of `start` and return the ones that are not
/// namespace declarations as `(is_unqualified, local_name, value)`.
///
/// Duplicate names, unquoted values, bad entity references and invalid
/// UTF-8 are reported as [`MessageError::Malformed`].
fn attributes<R>(
    reader: &NsReader<R>,
    start: &BytesStart<'_>,
) -> Result<Vec<(bool, Vec<u8>, String)>, MessageError> {
    let mut out = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(reader, e))?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| malformed(reader, e))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let (ns, local) = reader.resolve_attribute(attr.key);
        if let ResolveResult::Unknown(prefix) = &ns {
            return Err(undeclared_prefix(reader, prefix));
        }
        out.push((
            matches!(ns, ResolveResult::Unbound),
            local.as_ref().to_vec(),
            value.into_owned(),
        ));
    }
    Ok(out)
}

fn read_envelope<R>(
    reader: &NsReader<R>,
    start: &BytesStart<'_>,
) -> Result<SandEnvelope, MessageError> {
    let (ns, local) = reader.resolve_element(start.name());
    if let ResolveResult::Unknown(prefix) = &ns {
        return Err(undeclared_prefix(reader, prefix));
    }
    if local.as_ref() != SAND_ENVELOPE.as_bytes() || !is_sand_namespace(&ns) {
        return Err(MessageError::schema(
            "/",
            format!(
                "root element must be {{{SAND_NAMESPACE}}}{SAND_ENVELOPE}, found {}",
                display_name(&ns, local)
            ),
        ));
    }

    let path = envelope_path();
    let mut sender_id = None;
    let mut generation_time = None;
    for (unqualified, name, value) in attributes(reader, start)? {
        if !unqualified {
            continue;
        }
        match name.as_slice() {
            b"senderId" => sender_id = Some(value),
            b"generationTime" => {
                generation_time = Some(parse_date_time(&path, "generationTime", &value)?);
            }
            other => {
                return Err(MessageError::schema(
                    &path,
                    format!("unexpected attribute '{}'", String::from_utf8_lossy(other)),
                ));
            }
        }
    }

    let sender_id = match sender_id {
        Some(id) if !id.trim().is_empty() => id,
        Some(_) => return Err(MessageError::schema(path, "senderId must not be empty")),
        None => return Err(MessageError::schema(path, "missing required attribute senderId")),
    };

    Ok(SandEnvelope {
        sender_id,
        generation_time,
        messages: Vec::new(),
    })
}

fn read_message<R>(
    reader: &NsReader<R>,
    start: &BytesStart<'_>,
    index: usize,
) -> Result<SandMessage, MessageError> {
    let (ns, local) = reader.resolve_element(start.name());
    let message_type = if is_sand_namespace(&ns) {
        MessageType::from_element_name(local.as_ref())
    } else {
        None
    };
    let Some(message_type) = message_type else {
        return Err(MessageError::schema(
            format!("{}/*[{index}]", envelope_path()),
            format!("unknown SAND message element {}", display_name(&ns, local)),
        ));
    };

    let path = format!("{}/{message_type}[{index}]", envelope_path());
    let mut message_id = None;
    let mut validity_time = None;
    for (unqualified, name, value) in attributes(reader, start)? {
        if !unqualified {
            continue;
        }
        match name.as_slice() {
            b"messageId" => {
                let id = value.trim().parse::<u32>().map_err(|_| {
                    MessageError::schema(
                        &path,
                        format!("messageId must be an unsigned integer, got '{value}'"),
                    )
                })?;
                message_id = Some(id);
            }
            b"validityTime" => {
                validity_time = Some(parse_date_time(&path, "validityTime", &value)?);
            }
            // Message-specific attributes are not checked here.
            _ => {}
        }
    }

    let Some(message_id) = message_id else {
        return Err(MessageError::schema(
            path,
            "missing required attribute messageId",
        ));
    };

    Ok(SandMessage {
        message_type,
        message_id,
        validity_time,
    })
}

/// Parse an `xs:dateTime`. A missing timezone is read as UTC.
fn parse_date_time(
    path: &str,
    attribute: &str,
    value: &str,
) -> Result<DateTime<FixedOffset>, MessageError> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc().fixed_offset())
        })
        .map_err(|_| {
            MessageError::schema(
                path,
                format!("{attribute} is not a valid xs:dateTime: '{value}'"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(xml: &str) -> Result<SandEnvelope, MessageError> {
        validate_envelope(xml.as_bytes(), Limits::default())
    }

    fn envelope(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<SANDMessage xmlns="{SAND_NAMESPACE}" senderId="dane-1" generationTime="2016-02-21T11:20:52-08:00">{inner}</SANDMessage>"#
        )
    }

    fn schema_cause(result: Result<SandEnvelope, MessageError>) -> String {
        match result {
            Err(MessageError::Schema { cause, .. }) => cause,
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_envelope_is_valid() {
        let env = validate(&format!(
            r#"<SANDMessage xmlns="{SAND_NAMESPACE}" senderId="abc1234"/>"#
        ))
        .unwrap();
        assert_eq!(env.sender_id, "abc1234");
        assert!(env.generation_time.is_none());
        assert!(env.messages.is_empty());
    }

    #[test]
    fn test_envelope_with_messages() {
        let env = validate(&envelope(
            r#"
  <ResourceStatus messageId="1" validityTime="2016-02-21T12:00:00Z">
    <resourceInfo bandwidth="2000000"/>
  </ResourceStatus>
  <MaxRTT messageId="2" maxRTT="200"/>
"#,
        ))
        .unwrap();

        assert_eq!(env.messages.len(), 2);
        assert_eq!(env.messages[0].message_type, MessageType::ResourceStatus);
        assert_eq!(env.messages[0].message_id, 1);
        assert!(env.messages[0].validity_time.is_some());
        assert_eq!(env.messages[1].message_type, MessageType::MaxRtt);
        assert_eq!(env.count(MessageCategory::Per), 1);
        assert_eq!(env.count(MessageCategory::Status), 1);
        assert!(env.generation_time.is_some());
    }

    #[test]
    fn test_prefixed_namespace_is_accepted() {
        let xml = format!(
            r#"<sand:SANDMessage xmlns:sand="{SAND_NAMESPACE}" senderId="x"><sand:Throughput messageId="7"/></sand:SANDMessage>"#
        );
        let env = validate(&xml).unwrap();
        assert_eq!(env.messages[0].message_type, MessageType::Throughput);
    }

    #[test]
    fn test_schema_location_attribute_is_allowed() {
        let xml = format!(
            r#"<SANDMessage xmlns="{SAND_NAMESPACE}" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="{SAND_NAMESPACE} sand_message.xsd" senderId="x"/>"#
        );
        assert!(validate(&xml).is_ok());
    }

    #[test]
    fn test_generation_time_without_offset_is_utc() {
        let xml = format!(
            r#"<SANDMessage xmlns="{SAND_NAMESPACE}" senderId="x" generationTime="2016-02-21T11:20:52"/>"#
        );
        let env = validate(&xml).unwrap();
        assert_eq!(
            env.generation_time.map(|t| t.offset().local_minus_utc()),
            Some(0)
        );
    }

    #[test]
    fn test_not_xml_is_malformed() {
        assert!(matches!(
            validate("this is not xml"),
            Err(MessageError::Malformed { .. })
        ));
    }

    #[test]
    fn test_empty_body_is_malformed() {
        let err = validate("").unwrap_err();
        assert!(err.to_string().contains("no root element"), "got: {err}");
    }

    #[test]
    fn test_mismatched_tags_are_malformed() {
        let xml = format!(r#"<SANDMessage xmlns="{SAND_NAMESPACE}" senderId="x"></Other>"#);
        assert!(matches!(
            validate(&xml),
            Err(MessageError::Malformed { .. })
        ));
    }

    #[test]
    fn test_unclosed_root_is_malformed() {
        let xml = format!(r#"<SANDMessage xmlns="{SAND_NAMESPACE}" senderId="x">"#);
        assert!(matches!(
            validate(&xml),
            Err(MessageError::Malformed { .. })
        ));
    }

    #[test]
    fn test_two_roots_are_malformed() {
        let one = format!(r#"<SANDMessage xmlns="{SAND_NAMESPACE}" senderId="x"/>"#);
        let err = validate(&format!("{one}{one}")).unwrap_err();
        assert!(err.to_string().contains("more than one root"), "got: {err}");
    }

    #[test]
    fn test_wrong_root_element() {
        let cause = schema_cause(validate(&format!(
            r#"<Envelope xmlns="{SAND_NAMESPACE}" senderId="x"/>"#
        )));
        assert!(cause.contains("found {urn:mpeg:dash:schema:sandmessage:2016}Envelope"));
    }

    #[test]
    fn test_wrong_namespace() {
        let cause = schema_cause(validate(
            r#"<SANDMessage xmlns="urn:example" senderId="x"/>"#,
        ));
        assert!(cause.contains("root element must be"), "got: {cause}");
        let cause = schema_cause(validate(r#"<SANDMessage senderId="x"/>"#));
        assert!(cause.contains("found SANDMessage"), "got: {cause}");
    }

    #[test]
    fn test_missing_sender_id() {
        let cause = schema_cause(validate(&format!(
            r#"<SANDMessage xmlns="{SAND_NAMESPACE}"/>"#
        )));
        assert!(cause.contains("senderId"));
        let cause = schema_cause(validate(&format!(
            r#"<SANDMessage xmlns="{SAND_NAMESPACE}" senderId="  "/>"#
        )));
        assert!(cause.contains("must not be empty"));
    }

    #[test]
    fn test_unexpected_envelope_attribute() {
        let cause = schema_cause(validate(&format!(
            r#"<SANDMessage xmlns="{SAND_NAMESPACE}" senderId="x" foo="bar"/>"#
        )));
        assert!(cause.contains("'foo'"));
    }

    #[test]
    fn test_bad_generation_time() {
        let cause = schema_cause(validate(&format!(
            r#"<SANDMessage xmlns="{SAND_NAMESPACE}" senderId="x" generationTime="yesterday"/>"#
        )));
        assert!(cause.contains("generationTime"));
    }

    #[test]
    fn test_unknown_message_element() {
        let err = validate(&envelope(r#"<Bogus messageId="1"/>"#)).unwrap_err();
        match err {
            MessageError::Schema { path, cause } => {
                assert_eq!(path, "/SANDMessage/*[1]");
                assert!(cause.contains("Bogus"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_message_in_foreign_namespace() {
        let cause = schema_cause(validate(&envelope(
            r#"<x:MaxRTT xmlns:x="urn:example" messageId="1"/>"#,
        )));
        assert!(cause.contains("{urn:example}MaxRTT"));
    }

    #[test]
    fn test_message_id_rules() {
        let cause = schema_cause(validate(&envelope("<MaxRTT/>")));
        assert!(cause.contains("messageId"));
        let cause = schema_cause(validate(&envelope(r#"<MaxRTT messageId="-3"/>"#)));
        assert!(cause.contains("unsigned integer"));
    }

    #[test]
    fn test_text_inside_envelope_is_rejected() {
        let cause = schema_cause(validate(&envelope("hello")));
        assert!(cause.contains("character data"));
    }

    #[test]
    fn test_text_inside_message_is_allowed() {
        assert!(validate(&envelope(r#"<Throughput messageId="1">free text</Throughput>"#)).is_ok());
    }

    fn validate_payload(payload: &[u8]) -> Result<SandEnvelope, MessageError> {
        let mut body = format!(
            r#"<SANDMessage xmlns="{SAND_NAMESPACE}" senderId="x"><ResourceStatus messageId="1">"#
        )
        .into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(b"</ResourceStatus></SANDMessage>");
        validate_envelope(&body, Limits::default())
    }

    fn assert_malformed_payload(payload: &[u8]) {
        let result = validate_payload(payload);
        assert!(
            matches!(result, Err(MessageError::Malformed { .. })),
            "payload {:?}: got {result:?}",
            String::from_utf8_lossy(payload)
        );
    }

    #[test]
    fn test_payload_escapes_are_accepted() {
        assert!(validate_payload(b"AT&amp;T &#x41; &lt;ok&gt;").is_ok());
        assert!(validate_payload(br#"<info name="a &quot;b&quot;"/>"#).is_ok());
        assert!(validate_payload(b"<![CDATA[a & b < c]]>").is_ok());
    }

    #[test]
    fn test_payload_bare_ampersand_is_malformed() {
        assert_malformed_payload(b"AT&T");
        assert_malformed_payload(b"<info>AT&T</info>");
    }

    #[test]
    fn test_payload_undefined_entity_is_malformed() {
        assert_malformed_payload(b"&undefined;");
        assert_malformed_payload(br#"<info name="&undefined;"/>"#);
    }

    #[test]
    fn test_payload_duplicate_attribute_is_malformed() {
        assert_malformed_payload(br#"<a b="1" b="2"/>"#);
    }

    #[test]
    fn test_payload_unquoted_attribute_is_malformed() {
        assert_malformed_payload(b"<a b=1/>");
    }

    #[test]
    fn test_payload_invalid_utf8_is_malformed() {
        assert_malformed_payload(b"\xff\xfe");
        assert_malformed_payload(b"<a b=\"\xff\"/>");
        assert_malformed_payload(b"<![CDATA[\xff]]>");
    }

    #[test]
    fn test_payload_undeclared_prefix_is_malformed() {
        assert_malformed_payload(b"<x:info/>");
        assert_malformed_payload(br#"<info x:name="1"/>"#);
    }

    #[test]
    fn test_message_attribute_is_decoded() {
        let err = validate(&envelope(r#"<MaxRTT messageId="1" maxRTT="&bogus;"/>"#)).unwrap_err();
        assert!(matches!(err, MessageError::Malformed { .. }), "got: {err:?}");
    }

    #[test]
    fn test_size_limit() {
        let xml = envelope("");
        let limits = Limits {
            max_bytes: 10,
            ..Limits::default()
        };
        assert!(matches!(
            validate_envelope(xml.as_bytes(), limits),
            Err(MessageError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let xml = envelope(r#"<ResourceStatus messageId="1"><a><b><c/></b></a></ResourceStatus>"#);
        let limits = Limits {
            max_depth: 3,
            ..Limits::default()
        };
        assert!(matches!(
            validate_envelope(xml.as_bytes(), limits),
            Err(MessageError::LimitExceeded { .. })
        ));
        assert!(validate(&xml).is_ok());
    }
}
