//! IPTC-IIM datasets wrapped in a Photoshop 3.0 (APP13) image resource block.

use anyhow::{Context, Result};

pub const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const SIGNATURE_8BIM: &[u8] = b"8BIM";
const RESOURCE_IPTC: u16 = 0x0404;
const TAG_MARKER: u8 = 0x1C;

/// An IIM dataset address (record, dataset number).
pub type DataSet = (u8, u8);

pub const RECORD_VERSION: DataSet = (2, 0);
pub const CODED_CHARACTER_SET: DataSet = (1, 90);
pub const OBJECT_NAME: DataSet = (2, 5);
pub const KEYWORDS: DataSet = (2, 25);
pub const CAPTION: DataSet = (2, 120);

/// ESC % G, declaring UTF-8 for the record 2 text that follows.
const UTF8_ESCAPE: &[u8] = &[0x1B, 0x25, 0x47];

/// Datasets this crate owns; any other dataset found in the source is kept.
const OWNED: &[DataSet] = &[RECORD_VERSION, CODED_CHARACTER_SET, OBJECT_NAME, KEYWORDS, CAPTION];

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub set: DataSet,
    pub value: Vec<u8>,
}

/// The IPTC fields written for a JPEG.
pub struct IptcFields<'a> {
    pub object_name: &'a str,
    pub caption: &'a str,
    pub keywords: &'a [String],
}

/// Parse IIM datasets. Stops quietly at the first byte that isn't a tag marker
/// (IIM blocks are often zero padded).
pub fn parse_records(data: &[u8]) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut pos = 0;
    while pos + 5 <= data.len() && data[pos] == TAG_MARKER {
        let set = (data[pos + 1], data[pos + 2]);
        let len = u16::from_be_bytes([data[pos + 3], data[pos + 4]]);
        if len & 0x8000 != 0 {
            anyhow::bail!("Extended IPTC dataset {}:{} is not supported", set.0, set.1);
        }
        let start = pos + 5;
        let end = start + len as usize;
        let value = data
            .get(start..end)
            .with_context(|| format!("IPTC dataset {}:{} is truncated", set.0, set.1))?;
        records.push(Record { set, value: value.to_vec() });
        pos = end;
    }
    Ok(records)
}

fn encode_record(out: &mut Vec<u8>, set: DataSet, value: &[u8]) -> Result<()> {
    // Lengths with the top bit set mean "extended dataset"
    if value.len() > 0x7FFF {
        anyhow::bail!(
            "Value for IPTC dataset {}:{} is too long ({} bytes)",
            set.0,
            set.1,
            value.len()
        );
    }
    out.extend_from_slice(&[TAG_MARKER, set.0, set.1]);
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
    Ok(())
}

/// Build the IIM stream: record 1 before record 2, datasets in ascending order,
/// foreign datasets from `existing` kept in place.
pub fn build_records(existing: &[Record], fields: &IptcFields<'_>) -> Result<Vec<u8>> {
    let mut records: Vec<Record> = existing
        .iter()
        .filter(|r| !OWNED.contains(&r.set))
        .cloned()
        .collect();

    records.push(Record { set: CODED_CHARACTER_SET, value: UTF8_ESCAPE.to_vec() });
    records.push(Record { set: RECORD_VERSION, value: vec![0x00, 0x04] });
    records.push(Record { set: OBJECT_NAME, value: fields.object_name.as_bytes().to_vec() });
    for k in fields.keywords {
        records.push(Record { set: KEYWORDS, value: k.as_bytes().to_vec() });
    }
    records.push(Record { set: CAPTION, value: fields.caption.as_bytes().to_vec() });

    // Stable: repeated keywords keep their order
    records.sort_by_key(|r| r.set);

    let mut out = Vec::new();
    for r in &records {
        encode_record(&mut out, r.set, &r.value)?;
    }
    Ok(out)
}

/// One image resource inside a Photoshop block.
struct Resource<'a> {
    id: u16,
    /// The full resource, header included, padding included.
    raw: &'a [u8],
    data: &'a [u8],
}

fn parse_resources(block: &[u8]) -> Vec<Resource<'_>> {
    let mut resources = Vec::new();
    let mut pos = 0;
    while pos + 12 <= block.len() && &block[pos..pos + 4] == SIGNATURE_8BIM {
        let id = u16::from_be_bytes([block[pos + 4], block[pos + 5]]);
        // Pascal string name, padded so length byte + name is even
        let name_len = block[pos + 6] as usize;
        let name_padded = (name_len + 2) & !1;
        let size_at = pos + 6 + name_padded;
        let Some(size) = block.get(size_at..size_at + 4) else { break };
        let size = u32::from_be_bytes([size[0], size[1], size[2], size[3]]) as usize;
        let data_start = size_at + 4;
        let data_end = data_start + size;
        if data_end > block.len() {
            log::debug!("Truncated 8BIM resource 0x{id:04X}, ignoring the rest");
            break;
        }
        let padded_end = (data_end + (size & 1)).min(block.len());
        resources.push(Resource {
            id,
            raw: &block[pos..padded_end],
            data: &block[data_start..data_end],
        });
        pos = padded_end;
    }
    resources
}

/// Extract the IIM stream from APP13 segment contents.
pub fn iim_from_app13(contents: &[u8]) -> Option<&[u8]> {
    let block = contents.strip_prefix(PHOTOSHOP_HEADER)?;
    parse_resources(block)
        .into_iter()
        .find(|r| r.id == RESOURCE_IPTC)
        .map(|r| r.data)
}

/// Build new APP13 segment contents, keeping every non-IPTC resource of the
/// existing segment and merging the IIM datasets.
pub fn build_app13(existing: Option<&[u8]>, fields: &IptcFields<'_>) -> Result<Vec<u8>> {
    let mut out = PHOTOSHOP_HEADER.to_vec();

    let mut existing_records = Vec::new();
    if let Some(block) = existing.and_then(|c| c.strip_prefix(PHOTOSHOP_HEADER)) {
        for resource in parse_resources(block) {
            if resource.id == RESOURCE_IPTC {
                existing_records = parse_records(resource.data).unwrap_or_else(|e| {
                    log::debug!("Discarding unreadable IPTC block: {e}");
                    Vec::new()
                });
            } else {
                out.extend_from_slice(resource.raw);
            }
        }
    }

    let iim = build_records(&existing_records, fields)?;
    out.extend_from_slice(SIGNATURE_8BIM);
    out.extend_from_slice(&RESOURCE_IPTC.to_be_bytes());
    out.extend_from_slice(&[0x00, 0x00]); // empty pascal name, padded
    out.extend_from_slice(&(iim.len() as u32).to_be_bytes());
    out.extend_from_slice(&iim);
    if iim.len() % 2 != 0 {
        out.push(0x00);
    }
    Ok(out)
}

/// Values of one dataset, decoded as UTF-8.
pub fn values(records: &[Record], set: DataSet) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.set == set)
        .map(|r| String::from_utf8_lossy(&r.value).into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields<'a>(keywords: &'a [String]) -> IptcFields<'a> {
        IptcFields {
            object_name: "Sunset",
            caption: "A beach at dusk",
            keywords,
        }
    }

    #[test]
    fn build_and_parse_records() {
        let kw = vec!["beach".to_string(), "sunset".to_string()];
        let iim = build_records(&[], &fields(&kw)).unwrap();
        let records = parse_records(&iim).unwrap();

        assert_eq!(records[0].set, CODED_CHARACTER_SET);
        assert_eq!(values(&records, OBJECT_NAME), vec!["Sunset"]);
        assert_eq!(values(&records, CAPTION), vec!["A beach at dusk"]);
        assert_eq!(values(&records, KEYWORDS), vec!["beach", "sunset"]);
    }

    #[test]
    fn long_values_are_not_truncated() {
        let long_title = "t".repeat(200);
        let iim = build_records(
            &[],
            &IptcFields { object_name: &long_title, caption: "", keywords: &[] },
        )
        .unwrap();
        let records = parse_records(&iim).unwrap();
        assert_eq!(values(&records, OBJECT_NAME), vec![long_title]);
    }

    #[test]
    fn oversized_value_fails() {
        let huge = "x".repeat(0x8000);
        assert!(build_records(&[], &IptcFields { object_name: "", caption: &huge, keywords: &[] })
            .is_err());
    }

    #[test]
    fn foreign_datasets_survive_merge() {
        let byline = Record { set: (2, 80), value: b"Jane".to_vec() };
        let old_name = Record { set: OBJECT_NAME, value: b"Old".to_vec() };
        let iim = build_records(&[byline.clone(), old_name], &fields(&[])).unwrap();
        let records = parse_records(&iim).unwrap();

        assert!(records.contains(&byline));
        assert_eq!(values(&records, OBJECT_NAME), vec!["Sunset"]);
    }

    #[test]
    fn app13_roundtrip_preserves_other_resources() {
        // A fake 0x040C resource with an odd-length payload
        let mut existing = PHOTOSHOP_HEADER.to_vec();
        existing.extend_from_slice(b"8BIM");
        existing.extend_from_slice(&0x040Cu16.to_be_bytes());
        existing.extend_from_slice(&[0, 0]);
        existing.extend_from_slice(&3u32.to_be_bytes());
        existing.extend_from_slice(&[1, 2, 3, 0]);

        let kw = vec!["beach".to_string()];
        let contents = build_app13(Some(&existing), &fields(&kw)).unwrap();
        assert!(contents.starts_with(&existing));

        let iim = iim_from_app13(&contents).unwrap();
        let records = parse_records(iim).unwrap();
        assert_eq!(values(&records, KEYWORDS), vec!["beach"]);
    }

    #[test]
    fn app13_without_iptc_resource() {
        assert!(iim_from_app13(b"Photoshop 3.0\0").is_none());
        assert!(iim_from_app13(b"not photoshop").is_none());
    }

    #[test]
    fn truncated_record_fails() {
        assert!(parse_records(&[0x1C, 0x02, 0x05, 0x00, 0x10, b'a']).is_err());
    }

    #[test]
    fn trailing_padding_ignored() {
        let mut iim = build_records(&[], &fields(&[])).unwrap();
        iim.extend_from_slice(&[0, 0, 0]);
        assert!(parse_records(&iim).is_ok());
    }
}
