//! XMP packet building, merging, and field extraction.
//!
//! Fields written:
//! - `dc:title` / `dc:description`: language alternatives (`x-default`)
//! - `pdf:Keywords`: the keyword string, joined by the caller
//! - `dc:subject`: one bag entry per keyword

const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
const NS_PDF: &str = "http://ns.adobe.com/pdf/1.3/";

/// The values written into an XMP packet.
pub struct XmpFields<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub keywords: &'a [String],
    pub joined_keywords: &'a str,
}

fn field_elements(fields: &XmpFields<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  <dc:title><rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt></dc:title>\n",
        xml_escape(fields.title)
    ));
    out.push_str(&format!(
        "  <dc:description><rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt></dc:description>\n",
        xml_escape(fields.description)
    ));
    out.push_str("  <dc:subject><rdf:Bag>\n");
    for k in fields.keywords {
        out.push_str(&format!("    <rdf:li>{}</rdf:li>\n", xml_escape(k)));
    }
    out.push_str("  </rdf:Bag></dc:subject>\n");
    out.push_str(&format!(
        "  <pdf:Keywords>{}</pdf:Keywords>\n",
        xml_escape(fields.joined_keywords)
    ));
    out
}

/// Build a complete XMP packet, merging into `existing` when given.
pub fn build_packet(existing: Option<&str>, fields: &XmpFields<'_>) -> String {
    if let Some(xmp) = existing {
        if let Some(merged) = merge_into_existing(xmp, fields) {
            return merged;
        }
        log::debug!("Existing XMP has no usable rdf:Description, writing a fresh packet");
    }

    let mut xmp = String::new();
    xmp.push_str("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
    xmp.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n");
    xmp.push_str("<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n");
    xmp.push_str("<rdf:Description rdf:about=\"\"\n");
    xmp.push_str(&format!("  xmlns:dc=\"{NS_DC}\"\n"));
    xmp.push_str(&format!("  xmlns:pdf=\"{NS_PDF}\">\n"));
    xmp.push_str(&field_elements(fields));
    xmp.push_str("</rdf:Description>\n");
    xmp.push_str("</rdf:RDF>\n");
    xmp.push_str("</x:xmpmeta>\n");
    xmp.push_str("<?xpacket end=\"w\"?>");
    xmp
}

/// Replace our fields inside the first `rdf:Description` of an existing packet.
/// Returns `None` when the packet has no description element to extend.
fn merge_into_existing(xmp: &str, fields: &XmpFields<'_>) -> Option<String> {
    let mut result = xmp.to_string();
    let desc_start = result.find("<rdf:Description")?;
    let open_end = desc_start + result[desc_start..].find('>')?;

    // Self-closing description: open it up
    if result[..open_end].ends_with('/') {
        result.replace_range(open_end - 1..open_end + 1, ">\n</rdf:Description>");
    }

    // A prefix is in scope for the target description only if declared on its
    // own opening tag or on an ancestor, all of which precede `open_end`.
    // Declarations on sibling descriptions don't count.
    let unbound: Vec<_> = [("dc", NS_DC), ("pdf", NS_PDF)]
        .into_iter()
        .filter(|(prefix, _)| !result[..open_end].contains(&format!("xmlns:{prefix}=")))
        .collect();
    for (prefix, ns) in unbound {
        let at = desc_start + "<rdf:Description".len();
        result.insert_str(at, &format!("\n  xmlns:{prefix}=\"{ns}\""));
    }

    for tag in ["dc:title", "dc:description", "dc:subject", "pdf:Keywords"] {
        remove_xml_element(&mut result, tag);
    }
    // pdf:Keywords may also live in attribute form
    remove_attribute(&mut result, "pdf:Keywords");

    let close = result.find("</rdf:Description>")?;
    result.insert_str(close, &field_elements(fields));
    Some(result)
}

/// Remove every occurrence of an XML element and its contents from a string.
fn remove_xml_element(xml: &mut String, tag: &str) {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    while let Some(start) = find_tag_start(xml, &open) {
        let Some(end) = xml[start..].find(&close) else { return };
        let mut end_abs = start + end + close.len();
        if xml.as_bytes().get(end_abs) == Some(&b'\n') {
            end_abs += 1;
        }
        xml.replace_range(start..end_abs, "");
    }
}

/// Find `<tag` followed by a delimiter, so `<dc:title` doesn't match `<dc:titleFoo`.
fn find_tag_start(xml: &str, open: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = xml[from..].find(open) {
        let at = from + rel;
        match xml.as_bytes().get(at + open.len()) {
            Some(b'>' | b' ' | b'\n' | b'\t' | b'\r' | b'/') => return Some(at),
            _ => from = at + open.len(),
        }
    }
    None
}

fn remove_attribute(xml: &mut String, name: &str) {
    let pattern = format!("{name}=\"");
    if let Some(start) = xml.find(&pattern) {
        let value_start = start + pattern.len();
        if let Some(len) = xml[value_start..].find('"') {
            xml.replace_range(start..value_start + len + 1, "");
        }
    }
}

/// Escape special XML characters.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Text content of the first element named `tag`.
fn element_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let start = find_tag_start(xml, &format!("<{tag}"))?;
    let content_start = start + xml[start..].find('>')? + 1;
    let content_end = content_start + xml[content_start..].find(&format!("</{tag}>"))?;
    Some(&xml[content_start..content_end])
}

/// Read the x-default (or first) entry of a language alternative like `dc:title`.
pub fn read_alt(xml: &str, tag: &str) -> Option<String> {
    let inner = element_text(xml, tag)?;
    element_text(inner, "rdf:li").map(xml_unescape)
}

/// Read a simple-valued property, in element or attribute form.
pub fn read_simple(xml: &str, tag: &str) -> Option<String> {
    if let Some(text) = element_text(xml, tag) {
        return Some(xml_unescape(text));
    }
    let pattern = format!("{tag}=\"");
    let start = xml.find(&pattern)? + pattern.len();
    let len = xml[start..].find('"')?;
    Some(xml_unescape(&xml[start..start + len]))
}

/// Read all entries of a bag like `dc:subject`.
pub fn read_bag(xml: &str, tag: &str) -> Vec<String> {
    let Some(mut inner) = element_text(xml, tag) else { return Vec::new() };
    let mut items = Vec::new();
    while let Some(text) = element_text(inner, "rdf:li") {
        items.push(xml_unescape(text));
        let Some(close) = inner.find("</rdf:li>") else { break };
        inner = &inner[close + "</rdf:li>".len()..];
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample<'a>(keywords: &'a [String], joined: &'a str) -> XmpFields<'a> {
        XmpFields {
            title: "Sunset",
            description: "A beach at dusk",
            keywords,
            joined_keywords: joined,
        }
    }

    #[test]
    fn fresh_packet_fields() {
        let kw = vec!["beach".to_string(), "sunset".to_string()];
        let xmp = build_packet(None, &sample(&kw, "beach, sunset"));

        assert!(xmp.starts_with("<?xpacket begin="));
        assert_eq!(read_alt(&xmp, "dc:title").as_deref(), Some("Sunset"));
        assert_eq!(read_alt(&xmp, "dc:description").as_deref(), Some("A beach at dusk"));
        assert_eq!(read_simple(&xmp, "pdf:Keywords").as_deref(), Some("beach, sunset"));
        assert_eq!(read_bag(&xmp, "dc:subject"), kw);
    }

    #[test]
    fn escapes_markup() {
        let fields = XmpFields {
            title: "Fish & <Chips>",
            description: "\"quoted\" 'single'",
            keywords: &[],
            joined_keywords: "",
        };
        let xmp = build_packet(None, &fields);
        assert!(xmp.contains("Fish &amp; &lt;Chips&gt;"));
        assert_eq!(read_alt(&xmp, "dc:title").as_deref(), Some("Fish & <Chips>"));
        assert_eq!(
            read_alt(&xmp, "dc:description").as_deref(),
            Some("\"quoted\" 'single'")
        );
    }

    #[test]
    fn merge_replaces_fields_and_keeps_others() {
        let existing = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
<rdf:Description rdf:about="" xmlns:xmp="http://ns.adobe.com/xap/1.0/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <xmp:CreatorTool>Camera</xmp:CreatorTool>
  <dc:title><rdf:Alt><rdf:li xml:lang="x-default">Old</rdf:li></rdf:Alt></dc:title>
</rdf:Description>
</rdf:RDF>
</x:xmpmeta>"#;
        let kw = vec!["a".to_string()];
        let xmp = build_packet(Some(existing), &sample(&kw, "a"));

        assert!(xmp.contains("<xmp:CreatorTool>Camera</xmp:CreatorTool>"));
        assert!(xmp.contains("xmlns:pdf="));
        assert_eq!(xmp.matches("<dc:title>").count(), 1);
        assert_eq!(read_alt(&xmp, "dc:title").as_deref(), Some("Sunset"));
        assert_eq!(read_simple(&xmp, "pdf:Keywords").as_deref(), Some("a"));
    }

    #[test]
    fn merge_self_closing_description() {
        let existing = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><rdf:Description rdf:about="" pdf:Keywords="old"/></rdf:RDF></x:xmpmeta>"#;
        let xmp = build_packet(Some(existing), &sample(&[], "new"));

        assert!(!xmp.contains("pdf:Keywords=\"old\""));
        assert!(xmp.contains("</rdf:Description>"));
        assert_eq!(read_simple(&xmp, "pdf:Keywords").as_deref(), Some("new"));
        assert_eq!(read_alt(&xmp, "dc:title").as_deref(), Some("Sunset"));
    }

    #[test]
    fn merge_binds_prefixes_declared_only_on_a_sibling_description() {
        let existing = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
<rdf:Description rdf:about="" xmlns:exif="http://ns.adobe.com/exif/1.0/">
  <exif:PixelXDimension>16</exif:PixelXDimension>
</rdf:Description>
<rdf:Description rdf:about="" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <dc:creator><rdf:Seq><rdf:li>Someone</rdf:li></rdf:Seq></dc:creator>
</rdf:Description>
</rdf:RDF>
</x:xmpmeta>"#;
        let kw = vec!["a".to_string()];
        let xmp = build_packet(Some(existing), &sample(&kw, "a"));

        // Fields go into the first description, so it must declare dc itself
        let first_start = xmp.find("<rdf:Description").unwrap();
        let first_end = first_start + xmp[first_start..].find("</rdf:Description>").unwrap();
        let first = &xmp[first_start..first_end];
        let open_tag = &first[..first.find('>').unwrap()];
        assert!(first.contains("<dc:title>"));
        assert!(open_tag.contains(&format!("xmlns:dc=\"{NS_DC}\"")));
        assert!(open_tag.contains(&format!("xmlns:pdf=\"{NS_PDF}\"")));
        assert!(open_tag.contains("xmlns:exif="));

        // The sibling keeps its own declaration and content
        assert!(xmp.contains("<dc:creator><rdf:Seq><rdf:li>Someone</rdf:li></rdf:Seq></dc:creator>"));
        assert_eq!(read_alt(&xmp, "dc:title").as_deref(), Some("Sunset"));
    }

    #[test]
    fn merge_uses_namespace_declared_on_an_ancestor() {
        let existing = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:dc="http://purl.org/dc/elements/1.1/"><rdf:Description rdf:about=""></rdf:Description></rdf:RDF></x:xmpmeta>"#;
        let xmp = build_packet(Some(existing), &sample(&[], ""));

        assert_eq!(xmp.matches("xmlns:dc=").count(), 1);
        assert_eq!(xmp.matches("xmlns:pdf=").count(), 1);
    }

    #[test]
    fn unusable_existing_packet_falls_back_to_fresh() {
        let xmp = build_packet(Some("garbage"), &sample(&[], ""));
        assert!(xmp.starts_with("<?xpacket begin="));
    }

    #[test]
    fn read_attribute_form() {
        let xml = r#"<rdf:Description pdf:Keywords="x, y"/>"#;
        assert_eq!(read_simple(xml, "pdf:Keywords").as_deref(), Some("x, y"));
        assert!(read_alt(xml, "dc:title").is_none());
        assert!(read_bag(xml, "dc:subject").is_empty());
    }
}
