//! Version-index document (`maven-metadata.xml`) model.
//!
//! The document is always rebuilt in full from a known version set and
//! serialized once; nothing edits an existing document in place.

use crate::version::{self, compare_versions};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::BTreeSet;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// `lastUpdated` timestamp layout (`yyyyMMddHHmmss`, UTC).
const LAST_UPDATED_FORMAT: &[FormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

/// A package's version index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionIndex {
    pub group_id: String,
    pub artifact_id: String,
    pub versions: BTreeSet<String>,
    pub latest: Option<String>,
    pub release: Option<String>,
    pub last_updated: Option<OffsetDateTime>,
}

impl VersionIndex {
    /// Create an index with no versions.
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            versions: BTreeSet::new(),
            latest: None,
            release: None,
            last_updated: None,
        }
    }

    /// Parse a version-index document.
    pub fn parse(xml: &str) -> crate::Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut path: Vec<String> = Vec::new();
        let mut saw_root = false;

        let mut group_id = None;
        let mut artifact_id = None;
        let mut versions = BTreeSet::new();
        let mut latest = None;
        let mut release = None;
        let mut last_updated = None;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| crate::Error::MalformedDocument(e.to_string()))?;
            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if path.is_empty() {
                        if name != "metadata" {
                            return Err(crate::Error::MalformedDocument(format!(
                                "unexpected root element <{name}>"
                            )));
                        }
                        saw_root = true;
                    }
                    path.push(name);
                }
                Event::Empty(e) => {
                    if path.is_empty() {
                        return Err(crate::Error::MalformedDocument(format!(
                            "unexpected empty root element <{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        )));
                    }
                }
                Event::End(_) => {
                    path.pop();
                }
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| crate::Error::MalformedDocument(e.to_string()))?
                        .trim()
                        .to_string();
                    if text.is_empty() {
                        continue;
                    }
                    let segments: Vec<&str> = path.iter().map(String::as_str).collect();
                    match segments.as_slice() {
                        ["metadata", "groupId"] => group_id = Some(text),
                        ["metadata", "artifactId"] => artifact_id = Some(text),
                        ["metadata", "versioning", "latest"] => latest = Some(text),
                        ["metadata", "versioning", "release"] => release = Some(text),
                        ["metadata", "versioning", "versions", "version"] => {
                            versions.insert(text);
                        }
                        ["metadata", "versioning", "lastUpdated"] => {
                            last_updated = Some(parse_last_updated(&text)?);
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_root {
            return Err(crate::Error::MalformedDocument(
                "missing <metadata> root element".to_string(),
            ));
        }

        let group_id = group_id
            .ok_or_else(|| crate::Error::InvalidMetadata("missing <groupId>".to_string()))?;
        let artifact_id = artifact_id
            .ok_or_else(|| crate::Error::InvalidMetadata("missing <artifactId>".to_string()))?;

        Ok(Self {
            group_id,
            artifact_id,
            versions,
            latest,
            release,
            last_updated,
        })
    }

    /// The version an upload of this document is publishing.
    ///
    /// The `release` tag wins, `latest` is the fallback.
    pub fn published_version(&self) -> crate::Result<&str> {
        self.release
            .as_deref()
            .or(self.latest.as_deref())
            .ok_or_else(|| {
                crate::Error::InvalidMetadata(format!(
                    "no <release> or <latest> tag for {}:{}",
                    self.group_id, self.artifact_id
                ))
            })
    }

    /// Rebuild the versioning block from `versions`, stamped with the current time.
    pub fn reconcile<I, S>(&self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reconcile_at(versions, OffsetDateTime::now_utc())
    }

    /// Rebuild the versioning block from `versions` with an explicit timestamp.
    ///
    /// Only `groupId` and `artifactId` survive from `self`; every versioning
    /// field is derived from the new set.
    pub fn reconcile_at<I, S>(&self, versions: I, now: OffsetDateTime) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let versions: BTreeSet<String> = versions.into_iter().map(Into::into).collect();
        let latest = version::latest(versions.iter().map(String::as_str)).map(str::to_string);
        let release = version::release(versions.iter().map(String::as_str)).map(str::to_string);

        Self {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            versions,
            latest,
            release,
            last_updated: Some(now),
        }
    }

    /// Versions in ascending version order.
    pub fn sorted_versions(&self) -> Vec<&str> {
        let mut sorted: Vec<&str> = self.versions.iter().map(String::as_str).collect();
        sorted.sort_by(|a, b| compare_versions(a, b));
        sorted
    }

    /// `lastUpdated` in its persisted numeric form.
    pub fn last_updated_string(&self) -> Option<String> {
        self.last_updated
            .and_then(|ts| ts.to_offset(time::UtcOffset::UTC).format(LAST_UPDATED_FORMAT).ok())
    }

    /// Serialize to XML. Absent `latest`/`release` tags are omitted entirely.
    pub fn to_xml(&self) -> crate::Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        write(&mut writer, Event::Start(BytesStart::new("metadata")))?;
        write_text_element(&mut writer, "groupId", &self.group_id)?;
        write_text_element(&mut writer, "artifactId", &self.artifact_id)?;

        write(&mut writer, Event::Start(BytesStart::new("versioning")))?;
        if let Some(latest) = &self.latest {
            write_text_element(&mut writer, "latest", latest)?;
        }
        if let Some(release) = &self.release {
            write_text_element(&mut writer, "release", release)?;
        }
        write(&mut writer, Event::Start(BytesStart::new("versions")))?;
        for version in self.sorted_versions() {
            write_text_element(&mut writer, "version", version)?;
        }
        write(&mut writer, Event::End(BytesEnd::new("versions")))?;
        if let Some(last_updated) = self.last_updated_string() {
            write_text_element(&mut writer, "lastUpdated", &last_updated)?;
        }
        write(&mut writer, Event::End(BytesEnd::new("versioning")))?;
        write(&mut writer, Event::End(BytesEnd::new("metadata")))?;

        let mut xml = String::from_utf8(writer.into_inner())
            .map_err(|e| crate::Error::Serialization(e.to_string()))?;
        xml.push('\n');
        Ok(xml)
    }
}

/// Rebuild an existing document against a known version set and re-serialize it.
pub fn reconcile_document<I, S>(existing: &str, versions: I) -> crate::Result<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    VersionIndex::parse(existing)?.reconcile(versions).to_xml()
}

fn parse_last_updated(text: &str) -> crate::Result<OffsetDateTime> {
    PrimitiveDateTime::parse(text, LAST_UPDATED_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| crate::Error::MalformedDocument(format!("invalid lastUpdated {text}: {e}")))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> crate::Result<()> {
    writer
        .write_event(event)
        .map_err(|e| crate::Error::Serialization(e.to_string()))
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> crate::Result<()> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const EXISTING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>com.artipie</groupId>
  <artifactId>asto</artifactId>
  <versioning>
    <latest>0.15</latest>
    <release>0.15</release>
    <versions>
      <version>0.15</version>
      <version>0.99</version>
    </versions>
    <lastUpdated>20200101120000</lastUpdated>
  </versioning>
</metadata>
"#;

    #[test]
    fn test_parse_document() {
        let index = VersionIndex::parse(EXISTING).unwrap();
        assert_eq!(index.group_id, "com.artipie");
        assert_eq!(index.artifact_id, "asto");
        assert_eq!(index.latest.as_deref(), Some("0.15"));
        assert_eq!(index.release.as_deref(), Some("0.15"));
        assert_eq!(index.versions.len(), 2);
        assert_eq!(
            index.last_updated,
            Some(datetime!(2020-01-01 12:00:00 UTC))
        );
    }

    #[test]
    fn test_reconcile_is_full_rebuild() {
        let existing = VersionIndex::parse(EXISTING).unwrap();
        let now = datetime!(2024-03-05 06:07:08 UTC);
        let rebuilt =
            existing.reconcile_at(["0.15", "0.11.1", "0.20.1", "0.20.2", "0.18"], now);

        assert_eq!(rebuilt.group_id, "com.artipie");
        assert_eq!(rebuilt.artifact_id, "asto");
        assert_eq!(rebuilt.versions.len(), 5);
        assert!(!rebuilt.versions.contains("0.99"));
        assert_eq!(rebuilt.latest.as_deref(), Some("0.20.2"));
        assert_eq!(rebuilt.release.as_deref(), Some("0.20.2"));
        assert_eq!(rebuilt.last_updated_string().as_deref(), Some("20240305060708"));
    }

    #[test]
    fn test_release_omitted_for_snapshot_only_sets() {
        let index = VersionIndex::new("com.example", "lib")
            .reconcile(["1.0-SNAPSHOT", "1.1-SNAPSHOT"]);
        assert_eq!(index.release, None);
        assert_eq!(index.latest.as_deref(), Some("1.1-SNAPSHOT"));

        let xml = index.to_xml().unwrap();
        assert!(!xml.contains("<release>"));
        assert!(xml.contains("<latest>1.1-SNAPSHOT</latest>"));
    }

    #[test]
    fn test_serialized_document_parses_back() {
        let index = VersionIndex::new("com.example", "lib").reconcile(["2.0", "1.0", "10.0"]);
        let xml = index.to_xml().unwrap();
        assert!(xml.starts_with("<?xml"));

        let first = xml.find("<version>1.0</version>").unwrap();
        let second = xml.find("<version>2.0</version>").unwrap();
        let third = xml.find("<version>10.0</version>").unwrap();
        assert!(first < second && second < third);

        let parsed = VersionIndex::parse(&xml).unwrap();
        assert_eq!(parsed.versions, index.versions);
        assert_eq!(parsed.latest.as_deref(), Some("10.0"));
        assert!(parsed.last_updated.is_some());
    }

    #[test]
    fn test_reconcile_document_drops_stale_entries() {
        let xml = reconcile_document(EXISTING, ["1.0"]).unwrap();
        let parsed = VersionIndex::parse(&xml).unwrap();
        assert_eq!(parsed.versions.len(), 1);
        assert!(!xml.contains("0.99"));
        assert!(!xml.contains("20200101120000"));
    }

    #[test]
    fn test_published_version_prefers_release() {
        let mut index = VersionIndex::new("g", "a");
        assert!(index.published_version().is_err());

        index.latest = Some("2.0-SNAPSHOT".to_string());
        assert_eq!(index.published_version().unwrap(), "2.0-SNAPSHOT");

        index.release = Some("1.9".to_string());
        assert_eq!(index.published_version().unwrap(), "1.9");
    }

    #[test]
    fn test_parse_rejects_wrong_root() {
        let err = VersionIndex::parse("<project><groupId>g</groupId></project>").unwrap_err();
        assert!(matches!(err, crate::Error::MalformedDocument(_)));
    }

    #[test]
    fn test_parse_requires_identity() {
        let err = VersionIndex::parse("<metadata><artifactId>a</artifactId></metadata>")
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidMetadata(_)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(VersionIndex::parse("not xml at all").is_err());
        assert!(VersionIndex::parse("<metadata><groupId>g</artifactId></metadata>").is_err());
    }
}
