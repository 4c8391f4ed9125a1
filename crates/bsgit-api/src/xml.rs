//! Wire format codec.
//!
//! The build service speaks small XML documents: `directory` listings
//! with `entry` and `linkinfo` children, `revisionlist` histories,
//! `person` records, and `status` error envelopes. Unknown elements
//! and attributes are skipped; optional attributes may be absent.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use bsgit_hash::Md5;

use crate::error::ApiError;
use crate::types::{FileEntry, LinkInfo, PackageStatus, RevisionEntry, UserRecord};
use crate::Result;

fn attr_string(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ApiError::xml(format!("bad attribute: {err}")))?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|err| ApiError::xml(format!("bad attribute value: {err}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn attr_md5(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<Md5>> {
    match attr_string(e, name)? {
        None => Ok(None),
        Some(value) => Md5::from_hex(&value)
            .map(Some)
            .map_err(|_| ApiError::xml(format!("invalid md5 '{value}'"))),
    }
}

fn parse_linkinfo(e: &BytesStart<'_>) -> Result<LinkInfo> {
    Ok(LinkInfo {
        project: attr_string(e, b"project")?,
        package: attr_string(e, b"package")?,
        lsrcmd5: attr_md5(e, b"lsrcmd5")?,
        srcmd5: attr_md5(e, b"srcmd5")?,
        baserev: attr_string(e, b"baserev")?,
        rev: attr_string(e, b"rev")?,
        xsrcmd5: attr_md5(e, b"xsrcmd5")?,
    })
}

/// Parse a `directory` document into a [`PackageStatus`].
pub fn parse_directory(text: &str) -> Result<PackageStatus> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut status: Option<PackageStatus> = None;
    loop {
        match reader
            .read_event()
            .map_err(|err| ApiError::xml(err.to_string()))?
        {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"directory" => {
                    let srcmd5 = attr_md5(&e, b"srcmd5")?
                        .ok_or_else(|| ApiError::xml("directory without srcmd5"))?;
                    status = Some(PackageStatus {
                        name: attr_string(&e, b"name")?,
                        rev: attr_string(&e, b"rev")?,
                        srcmd5,
                        xsrcmd5: attr_md5(&e, b"xsrcmd5")?,
                        link: None,
                        files: Vec::new(),
                    });
                }
                b"linkinfo" => {
                    if let Some(status) = status.as_mut() {
                        status.link = Some(parse_linkinfo(&e)?);
                    }
                }
                b"entry" => {
                    let status = status
                        .as_mut()
                        .ok_or_else(|| ApiError::xml("entry outside directory"))?;
                    let name = attr_string(&e, b"name")?
                        .ok_or_else(|| ApiError::xml("entry without name"))?;
                    let md5 = attr_md5(&e, b"md5")?
                        .ok_or_else(|| ApiError::xml(format!("entry '{name}' without md5")))?;
                    if name.contains('/') {
                        return Err(ApiError::xml(format!("entry name '{name}' contains '/'")));
                    }
                    status.files.push(FileEntry { name, md5 });
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let mut status = status.ok_or_else(|| ApiError::xml("no directory element"))?;
    status.files.sort_by(|a, b| a.name.cmp(&b.name));
    for pair in status.files.windows(2) {
        if pair[0].name == pair[1].name {
            return Err(ApiError::xml(format!("duplicate entry '{}'", pair[0].name)));
        }
    }
    Ok(status)
}

/// Parse a `revisionlist` document, newest revision first.
pub fn parse_revision_list(text: &str) -> Result<Vec<RevisionEntry>> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut revisions: Vec<RevisionEntry> = Vec::new();
    let mut current: Option<(String, Option<Md5>, Option<String>, i64, String, String)> = None;
    let mut field: Vec<u8> = Vec::new();

    loop {
        match reader
            .read_event()
            .map_err(|err| ApiError::xml(err.to_string()))?
        {
            Event::Start(e) => match e.name().as_ref() {
                b"revision" => {
                    let rev = attr_string(&e, b"rev")?
                        .ok_or_else(|| ApiError::xml("revision without rev"))?;
                    current = Some((rev, None, None, 0, "unknown".to_string(), String::new()));
                }
                name => field = name.to_vec(),
            },
            Event::Text(t) => {
                if let Some(current) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|err| ApiError::xml(err.to_string()))?;
                    match field.as_slice() {
                        b"srcmd5" => {
                            current.1 = Some(Md5::from_hex(text.trim()).map_err(|_| {
                                ApiError::xml(format!("invalid srcmd5 '{text}'"))
                            })?);
                        }
                        b"version" => current.2 = Some(text.trim().to_string()),
                        b"time" => {
                            current.3 = text.trim().parse().map_err(|_| {
                                ApiError::xml(format!("invalid time '{text}'"))
                            })?;
                        }
                        b"user" => current.4 = text.trim().to_string(),
                        b"comment" => current.5 = text.into_owned(),
                        _ => {}
                    }
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"revision" {
                    let (rev, srcmd5, version, time, user, comment) = current
                        .take()
                        .ok_or_else(|| ApiError::xml("stray </revision>"))?;
                    let srcmd5 = srcmd5.ok_or_else(|| {
                        ApiError::xml(format!("revision {rev} without srcmd5"))
                    })?;
                    revisions.push(RevisionEntry {
                        rev,
                        srcmd5,
                        version,
                        time,
                        user,
                        comment,
                    });
                }
                field.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // the server lists oldest first
    revisions.reverse();
    Ok(revisions)
}

/// Parse a `person` document.
pub fn parse_person(text: &str) -> Result<UserRecord> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut record = UserRecord::default();
    let mut field: Vec<u8> = Vec::new();
    loop {
        match reader
            .read_event()
            .map_err(|err| ApiError::xml(err.to_string()))?
        {
            Event::Start(e) => field = e.name().as_ref().to_vec(),
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|err| ApiError::xml(err.to_string()))?;
                match field.as_slice() {
                    b"email" => record.email = Some(text.trim().to_string()),
                    b"realname" => record.realname = Some(text.trim().to_string()),
                    _ => {}
                }
            }
            Event::End(_) => field.clear(),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(record)
}

/// Extract the `summary` of a `status` error envelope, if any.
pub fn parse_status_summary(text: &str) -> Option<String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut in_summary = false;
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) => in_summary = e.name().as_ref() == b"summary",
            Event::Text(t) if in_summary => {
                return t.unescape().ok().map(|s| s.into_owned());
            }
            Event::End(_) => in_summary = false,
            Event::Eof => return None,
            _ => {}
        }
    }
}

/// Encode the `commitfilelist` request body.
pub fn filelist_body(files: &[FileEntry]) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Start(BytesStart::new("directory")))
        .map_err(|err| ApiError::xml(err.to_string()))?;
    for file in files {
        let mut entry = BytesStart::new("entry");
        entry.push_attribute(("name", file.name.as_str()));
        entry.push_attribute(("md5", file.md5.to_hex().as_str()));
        writer
            .write_event(Event::Empty(entry))
            .map_err(|err| ApiError::xml(err.to_string()))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("directory")))
        .map_err(|err| ApiError::xml(err.to_string()))?;
    String::from_utf8(writer.into_inner()).map_err(|err| ApiError::xml(err.to_string()))
}
