//! Header metadata
//!
//! Title, composer and date from `<meiHead>`.

use crate::mei_import::parser::{find_descendants, get_child, get_text, is_tag};
use crate::mei_import::types::Metadata;
use roxmltree::Node;

/// Follow a path of child tags from `node`
fn child_path<'a, 'input>(node: Node<'a, 'input>, path: &[&str]) -> Option<Node<'a, 'input>> {
    path.iter().try_fold(node, |current, tag| get_child(current, tag))
}

/// Title from `fileDesc/titleStmt/title`
pub fn extract_title(head: Node) -> Option<String> {
    child_path(head, &["fileDesc", "titleStmt", "title"]).and_then(get_text)
}

/// Composer from a `persName @role="composer"` in the title statement's
/// `respStmt`, else from any `<composer>` in the header
pub fn extract_composer(head: Node) -> Option<String> {
    if let Some(resp) = child_path(head, &["fileDesc", "titleStmt", "respStmt"]) {
        let composer = resp
            .children()
            .filter(|n| is_tag(*n, "persName"))
            .find(|n| n.attribute("role") == Some("composer"))
            .and_then(get_text);
        if composer.is_some() {
            return composer;
        }
    }

    find_descendants(head, "composer").find_map(get_text)
}

/// Date from `fileDesc/pubStmt/date`, either its text or `@isodate`
pub fn extract_date(head: Node) -> Option<String> {
    let date = child_path(head, &["fileDesc", "pubStmt", "date"])?;
    get_text(date).or_else(|| date.attribute("isodate").map(str::to_string))
}

pub fn metadata_from_head(head: Node) -> Metadata {
    Metadata {
        title: extract_title(head),
        composer: extract_composer(head),
        date: extract_date(head),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn test_full_header() {
        let xml = r#"<meiHead xmlns="http://www.music-encoding.org/ns/mei">
              <fileDesc>
                <titleStmt>
                  <title>  Ein feste Burg  </title>
                  <respStmt>
                    <persName role="editor">Somebody Else</persName>
                    <persName role="composer">J. S. Bach</persName>
                  </respStmt>
                </titleStmt>
                <pubStmt><date isodate="2014-01-01">2014</date></pubStmt>
              </fileDesc>
            </meiHead>"#;
        let doc = Document::parse(xml).unwrap();
        let metadata = metadata_from_head(doc.root_element());
        assert_eq!(metadata.title.as_deref(), Some("Ein feste Burg"));
        assert_eq!(metadata.composer.as_deref(), Some("J. S. Bach"));
        assert_eq!(metadata.date.as_deref(), Some("2014"));
    }

    #[test]
    fn test_composer_fallback_and_isodate() {
        let xml = r#"<meiHead xmlns="http://www.music-encoding.org/ns/mei">
              <fileDesc>
                <titleStmt><title>Untitled</title></titleStmt>
                <pubStmt><date isodate="1723"/></pubStmt>
              </fileDesc>
              <workDesc><work><composer>Anonymous</composer></work></workDesc>
            </meiHead>"#;
        let doc = Document::parse(xml).unwrap();
        let metadata = metadata_from_head(doc.root_element());
        assert_eq!(metadata.composer.as_deref(), Some("Anonymous"));
        assert_eq!(metadata.date.as_deref(), Some("1723"));
    }

    #[test]
    fn test_empty_header() {
        let doc = Document::parse(r#"<meiHead xmlns="http://www.music-encoding.org/ns/mei"/>"#).unwrap();
        assert_eq!(metadata_from_head(doc.root_element()), Metadata::default());
    }
}
