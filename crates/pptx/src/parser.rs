//! PPTX file parser implementation.

use deck_core::{Error, ExtractedSlide, Presentation, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

const PRESENTATION_PATH: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PATH: &str = "ppt/_rels/presentation.xml.rels";

/// Parser for PPTX (Office Open XML) files.
pub struct PptxParser;

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse a PPTX file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R, filename: &str) -> Result<Presentation> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut presentation = Presentation::new(filename);

        let slide_order = self.get_slide_order(&mut archive)?;
        log::info!("Processing {} slides from {}", slide_order.len(), filename);

        for (idx, slide_path) in slide_order.iter().enumerate() {
            let slide = self.parse_slide(&mut archive, slide_path, idx + 1)?;
            presentation.add_slide(slide);
        }

        Ok(presentation)
    }

    /// Get the ordered list of slide paths.
    ///
    /// The slide list in `presentation.xml` is authoritative. When it is
    /// missing or unusable, slides are ordered by the number in their
    /// relationship id or file name.
    fn get_slide_order<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
        let rels_content = self.read_file_from_archive(archive, PRESENTATION_RELS_PATH)?;
        let slide_rels = parse_slide_relationships(&rels_content)?;

        if let Ok(content) = self.read_file_from_archive(archive, PRESENTATION_PATH) {
            let listed = parse_slide_id_list(&content)?;
            let ordered: Vec<String> = listed
                .iter()
                .filter_map(|rid| slide_rels.get(rid).cloned())
                .collect();
            if !ordered.is_empty() && ordered.len() == listed.len() {
                return Ok(ordered);
            }
            log::warn!("Slide list in presentation.xml is incomplete, falling back to numbering");
        }

        let mut slides: Vec<(String, Option<usize>)> = slide_rels
            .into_iter()
            .map(|(id, path)| {
                let order_num = extract_slide_number(&path).or_else(|| extract_slide_number(&id));
                (path, order_num)
            })
            .collect();

        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }

    /// Parse a single slide from the archive.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        slide_number: usize,
    ) -> Result<ExtractedSlide> {
        let content = self.read_file_from_archive(archive, slide_path)?;
        let mut slide = ExtractedSlide::new(slide_number);

        for shape in extract_shapes_from_xml(&content) {
            slide.add_line_with_position(shape.text, shape.y, shape.x);
        }

        // Top-to-bottom, left-to-right reading order
        slide.sort_by_position();

        Ok(slide)
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Map of relationship id to archive path for every slide relationship.
fn parse_slide_relationships(content: &str) -> Result<HashMap<String, String>> {
    let mut slides = HashMap::new();
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let rel_type = attribute(e, b"Type").unwrap_or_default();
                let target = attribute(e, b"Target").unwrap_or_default();
                let id = attribute(e, b"Id").unwrap_or_default();

                if rel_type.ends_with("/slide") {
                    let full_path = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("ppt/{}", target),
                    };
                    slides.insert(id, full_path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(slides)
}

/// Relationship ids of the slides listed in `presentation.xml`, in order.
fn parse_slide_id_list(content: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                // The relationship id is the namespaced `r:id`, not the numeric `id`.
                let rid = e.attributes().flatten().find_map(|attr| {
                    let key = attr.key.as_ref();
                    (key != b"id" && local_name(key) == b"id")
                        .then(|| String::from_utf8_lossy(&attr.value).to_string())
                });
                if let Some(rid) = rid {
                    ids.push(rid);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing presentation.xml: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(ids)
}

/// Information about a shape extracted from XML.
#[derive(Debug, Default)]
struct ShapeInfo {
    text: String,
    x: f64,
    y: f64,
}

/// Extract shapes with text and position from slide XML.
///
/// Text boxes, pictures with captions and table frames are treated as
/// shapes. Each paragraph becomes a line; `<a:br/>` soft breaks also split
/// lines.
fn extract_shapes_from_xml(xml_content: &str) -> Vec<ShapeInfo> {
    let mut shapes = Vec::new();
    let mut reader = Reader::from_str(xml_content);
    // Run text must keep its spaces; "Bug: " + "leak" must not become "Bug:leak".
    reader.trim_text(false);

    let mut current_shape: Option<ShapeInfo> = None;
    let mut in_paragraph = false;
    let mut in_run_text = false;
    let mut current_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" | b"pic" | b"graphicFrame" => {
                    current_shape = Some(ShapeInfo::default());
                    current_text.clear();
                }
                b"off" => set_offset(&mut current_shape, e),
                b"p" if current_shape.is_some() => {
                    in_paragraph = true;
                    if !current_text.is_empty() {
                        current_text.push('\n');
                    }
                }
                b"t" if in_paragraph => in_run_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()) {
                b"off" => set_offset(&mut current_shape, e),
                b"br" if in_paragraph => current_text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_run_text {
                    let text = e.unescape().unwrap_or_default();
                    current_text.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" | b"pic" | b"graphicFrame" => {
                    if let Some(mut shape) = current_shape.take() {
                        shape.text = current_text.trim().to_string();
                        if !shape.text.is_empty() {
                            shapes.push(shape);
                        }
                    }
                    current_text.clear();
                    in_paragraph = false;
                    in_run_text = false;
                }
                b"p" => in_paragraph = false,
                b"t" => in_run_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("XML parsing error (continuing): {}", e);
                break;
            }
            _ => {}
        }
    }

    shapes
}

/// Record the first offset seen for the current shape.
///
/// Tables and grouped content carry nested offsets; the shape's own `xfrm`
/// comes first.
fn set_offset(current_shape: &mut Option<ShapeInfo>, e: &BytesStart<'_>) {
    let Some(shape) = current_shape.as_mut() else {
        return;
    };
    if shape.x != 0.0 || shape.y != 0.0 {
        return;
    }
    if let Some(x) = attribute(e, b"x").and_then(|v| v.parse::<f64>().ok()) {
        shape.x = x;
    }
    if let Some(y) = attribute(e, b"y").and_then(|v| v.parse::<f64>().ok()) {
        shape.y = y;
    }
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Extract a slide number from a string like "rId2" or "slides/slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn slide_xml(shapes: &[(&str, i64, i64)]) -> String {
        let mut body = String::new();
        for (text, x, y) in shapes {
            let paragraphs: String = text
                .split('\n')
                .map(|p| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", p))
                .collect();
            body.push_str(&format!(
                r#"<p:sp><p:spPr><a:xfrm><a:off x="{}" y="{}"/></a:xfrm></p:spPr><p:txBody>{}</p:txBody></p:sp>"#,
                x, y, paragraphs
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>{}</p:spTree></p:cSld></p:sld>"#,
            body
        )
    }

    fn build_pptx(slides: &[(&str, String)], listed: Option<&[&str]>) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();

        let mut rels = String::from(r#"<?xml version="1.0"?><Relationships>"#);
        for (idx, (name, _)) in slides.iter().enumerate() {
            rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/{}"/>"#,
                idx + 10,
                name
            ));
        }
        rels.push_str(r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>"#);
        rels.push_str("</Relationships>");
        writer.start_file(PRESENTATION_RELS_PATH, options).unwrap();
        writer.write_all(rels.as_bytes()).unwrap();

        if let Some(listed) = listed {
            let ids: String = listed
                .iter()
                .enumerate()
                .map(|(i, rid)| format!(r#"<p:sldId id="{}" r:id="{}"/>"#, 256 + i, rid))
                .collect();
            writer.start_file(PRESENTATION_PATH, options).unwrap();
            writer
                .write_all(
                    format!(
                        r#"<?xml version="1.0"?><p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst>{}</p:sldIdLst></p:presentation>"#,
                        ids
                    )
                    .as_bytes(),
                )
                .unwrap();
        }

        for (name, xml) in slides {
            writer
                .start_file(format!("ppt/slides/{}", name), options)
                .unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
        }

        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("slide1.xml"), Some(1));
        assert_eq!(extract_slide_number("ppt/slides/slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits"), None);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }

    #[test]
    fn test_runs_keep_spaces_and_breaks() {
        let xml = r#"<p:sld xmlns:a="a" xmlns:p="p"><p:sp><p:txBody>
            <a:p><a:r><a:t>Bug: </a:t></a:r><a:r><a:t>memory leak</a:t></a:r></a:p>
            <a:p><a:r><a:t>seen in</a:t></a:r><a:br/><a:r><a:t>Issue: prod</a:t></a:r></a:p>
        </p:txBody></p:sp></p:sld>"#;

        let shapes = extract_shapes_from_xml(xml);
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].text, "Bug: memory leak\nseen in\nIssue: prod");
    }

    #[test]
    fn test_table_cells_are_extracted() {
        let xml = r#"<p:sld xmlns:a="a" xmlns:p="p"><p:graphicFrame><p:xfrm><a:off x="5" y="7"/></p:xfrm>
            <a:graphic><a:graphicData><a:tbl><a:tr>
              <a:tc><a:txBody><a:p><a:r><a:t>DB issue: locks</a:t></a:r></a:p></a:txBody></a:tc>
              <a:tc><a:txBody><a:p><a:r><a:t>owner</a:t></a:r></a:p></a:txBody></a:tc>
            </a:tr></a:tbl></a:graphicData></a:graphic></p:graphicFrame></p:sld>"#;

        let shapes = extract_shapes_from_xml(xml);
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].text, "DB issue: locks\nowner");
        assert_eq!((shapes[0].x, shapes[0].y), (5.0, 7.0));
    }

    #[test]
    fn test_escaped_text() {
        let xml = r#"<p:sld xmlns:a="a" xmlns:p="p"><p:sp><p:txBody><a:p><a:r><a:t>Issue: A &amp; B</a:t></a:r></a:p></p:txBody></p:sp></p:sld>"#;
        let shapes = extract_shapes_from_xml(xml);
        assert_eq!(shapes[0].text, "Issue: A & B");
    }

    #[test]
    fn test_parse_orders_by_presentation_list() {
        let bytes = build_pptx(
            &[
                ("slide1.xml", slide_xml(&[("First in archive", 0, 0)])),
                ("slide2.xml", slide_xml(&[("Issue: shown first", 0, 0)])),
            ],
            Some(&["rId11", "rId10"]),
        );

        let presentation = PptxParser::new()
            .parse(Cursor::new(bytes), "deck.pptx")
            .unwrap();

        assert_eq!(presentation.filename, "deck.pptx");
        assert_eq!(presentation.slide_count(), 2);
        assert_eq!(presentation.slides[0].number, 1);
        assert_eq!(presentation.slides[0].lines[0].text, "Issue: shown first");
        assert_eq!(presentation.slides[1].lines[0].text, "First in archive");
    }

    #[test]
    fn test_parse_falls_back_to_numbering() {
        let bytes = build_pptx(
            &[
                ("slide2.xml", slide_xml(&[("second", 0, 0)])),
                ("slide10.xml", slide_xml(&[("tenth", 0, 0)])),
                ("slide1.xml", slide_xml(&[("first", 0, 0)])),
            ],
            None,
        );

        let presentation = PptxParser::new()
            .parse(Cursor::new(bytes), "deck.pptx")
            .unwrap();

        let texts: Vec<&str> = presentation
            .slides
            .iter()
            .map(|s| s.lines[0].text.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "second", "tenth"]);
    }

    #[test]
    fn test_shapes_sorted_by_position() {
        let bytes = build_pptx(
            &[(
                "slide1.xml",
                slide_xml(&[("footer", 0, 900), ("Bug: title", 0, 10), ("right", 500, 10)]),
            )],
            Some(&["rId10"]),
        );

        let presentation = PptxParser::new()
            .parse(Cursor::new(bytes), "deck.pptx")
            .unwrap();
        let texts: Vec<&str> = presentation.slides[0]
            .lines
            .iter()
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(texts, vec!["Bug: title", "right", "footer"]);
    }

    #[test]
    fn test_not_a_zip() {
        let result = PptxParser::new().parse(Cursor::new(b"not a zip".to_vec()), "x.pptx");
        assert!(matches!(result, Err(Error::ZipError(_))));
    }
}
