use std::io::Cursor;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;
use tracing::debug;

use crate::types::{Result, TaggerError};

/// One node in an element's ordered child list. Text covers both plain
/// character data and CDATA sections; it is re-escaped on serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut el = Self::new(name);
        el.children.push(Node::Text(text.into()));
        el
    }

    /// Concatenated text of the element's direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    pub fn first_child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    pub fn child_elements(&self, name: &str) -> impl Iterator<Item = &Element> {
        let name = name.to_string();
        self.children.iter().filter_map(move |node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// Remove every direct child element with the given name. Returns how
    /// many were removed.
    pub fn remove_children(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children.retain(|node| match node {
            Node::Element(el) => el.name != name,
            Node::Text(_) => true,
        });
        before - self.children.len()
    }

    /// Insert `element` immediately after the first child named `anchor`.
    /// Falls back to appending at the end when no anchor exists.
    pub fn insert_after(&mut self, anchor: &str, element: Element) {
        let position = self.children.iter().position(|node| {
            matches!(node, Node::Element(el) if el.name == anchor)
        });
        match position {
            Some(idx) => self.children.insert(idx + 1, Node::Element(element)),
            None => self.children.push(Node::Element(element)),
        }
    }

    pub fn append(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }
}

/// A whole RSS document held as an ordered node tree, parsed and written
/// with quick-xml. Comments, processing instructions and the doctype are
/// dropped on parse.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedDocument {
    root: Element,
}

impl FeedDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    stack.push(element_from_start(&e)?);
                }
                Event::Empty(e) => {
                    let el = element_from_start(&e)?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::End(e) => {
                    let el = stack.pop().ok_or_else(|| {
                        TaggerError::MalformedFeed(format!(
                            "unexpected closing tag </{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        ))
                    })?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::Text(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(e.unescape()?.into_owned()));
                    }
                }
                Event::CData(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        parent.children.push(Node::Text(text));
                    }
                }
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(TaggerError::MalformedFeed(format!(
                "unclosed element <{}>",
                stack[stack.len() - 1].name
            )));
        }
        root.ok_or_else(|| TaggerError::MalformedFeed("document has no root element".to_string()))
            .map(|root| Self { root })
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Parsing feed document: {}", path.display());
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn channel(&self) -> Result<&Element> {
        self.root
            .first_child("channel")
            .ok_or_else(|| TaggerError::MalformedFeed("document has no channel element".to_string()))
    }

    pub fn channel_mut(&mut self) -> Result<&mut Element> {
        self.root
            .children
            .iter_mut()
            .find_map(|node| match node {
                Node::Element(el) if el.name == "channel" => Some(el),
                _ => None,
            })
            .ok_or_else(|| TaggerError::MalformedFeed("document has no channel element".to_string()))
    }

    /// Serialize back to UTF-8 bytes with an XML declaration.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner().into_inner())
    }

    /// Overwrite the file in place. No backup and no atomic swap.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut el = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| TaggerError::MalformedFeed(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| TaggerError::MalformedFeed(e.to_string()))?
            .into_owned();
        el.attributes.push((key, value));
    }
    Ok(el)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(el)),
        None => {
            if root.is_some() {
                return Err(TaggerError::MalformedFeed(
                    "document has more than one root element".to_string(),
                ));
            }
            *root = Some(el);
        }
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, el: &Element) -> Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        match child {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>World News</title>
    <item>
      <title>First</title>
      <description>Something happened</description>
      <link>https://example.com/1</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_channel_and_items() {
        let doc = FeedDocument::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(doc.root().name, "rss");
        assert_eq!(doc.root().attributes, vec![("version".to_string(), "2.0".to_string())]);

        let channel = doc.channel().unwrap();
        assert_eq!(channel.first_child("title").unwrap().text(), "World News");

        let items: Vec<_> = channel.child_elements("item").collect();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].first_child("description").unwrap().text(),
            "Something happened"
        );
    }

    #[test]
    fn cdata_reads_as_text() {
        let xml = "<rss><channel><item><description><![CDATA[a <b> & c]]></description></item></channel></rss>";
        let doc = FeedDocument::parse(xml.as_bytes()).unwrap();
        let channel = doc.channel().unwrap();
        let item = channel.first_child("item").unwrap();
        assert_eq!(item.first_child("description").unwrap().text(), "a <b> & c");
    }

    #[test]
    fn round_trip_preserves_order_and_escapes() {
        let doc = FeedDocument::parse(SAMPLE.as_bytes()).unwrap();
        let bytes = doc.to_bytes().unwrap();
        let out = String::from_utf8(bytes).unwrap();

        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        let title_pos = out.find("<title>First</title>").unwrap();
        let desc_pos = out.find("<description>Something happened</description>").unwrap();
        let link_pos = out.find("<link>https://example.com/1</link>").unwrap();
        assert!(title_pos < desc_pos && desc_pos < link_pos);

        // Re-parsing the output must give back the same tree.
        let again = FeedDocument::parse(out.as_bytes()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn text_is_escaped_on_write() {
        let mut doc = FeedDocument::parse(SAMPLE.as_bytes()).unwrap();
        let channel = doc.channel_mut().unwrap();
        channel.append(Element::with_text("note", "a < b & c"));
        let out = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert!(out.contains("<note>a &lt; b &amp; c</note>"));
    }

    #[test]
    fn remove_children_only_touches_named_elements() {
        let xml = "<rss><channel><item><keyword>old</keyword><description>d</description><keyword>older</keyword></item></channel></rss>";
        let mut doc = FeedDocument::parse(xml.as_bytes()).unwrap();
        let channel = doc.channel_mut().unwrap();
        let item = match &mut channel.children[0] {
            Node::Element(el) => el,
            _ => panic!("expected item element"),
        };
        assert_eq!(item.remove_children("keyword"), 2);
        assert!(item.first_child("keyword").is_none());
        assert_eq!(item.first_child("description").unwrap().text(), "d");
    }

    #[test]
    fn insert_after_places_element_behind_anchor() {
        let mut item = Element::new("item");
        item.append(Element::with_text("title", "t"));
        item.append(Element::with_text("description", "d"));
        item.append(Element::with_text("link", "l"));

        item.insert_after("description", Element::with_text("keyword", "k"));

        let names: Vec<_> = item
            .children
            .iter()
            .filter_map(|n| match n {
                Node::Element(el) => Some(el.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["title", "description", "keyword", "link"]);
    }

    #[test]
    fn insert_after_appends_when_anchor_missing() {
        let mut item = Element::new("item");
        item.append(Element::with_text("title", "t"));
        item.insert_after("description", Element::with_text("keyword", "k"));

        match item.children.last().unwrap() {
            Node::Element(el) => assert_eq!(el.name, "keyword"),
            _ => panic!("expected keyword element"),
        }
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(FeedDocument::parse(b"<rss><channel></rss>").is_err());
        assert!(FeedDocument::parse(b"<rss><channel>").is_err());
        assert!(FeedDocument::parse(b"").is_err());
    }

    #[test]
    fn missing_channel_is_an_error() {
        let doc = FeedDocument::parse(b"<rss><other/></rss>").unwrap();
        assert!(doc.channel().is_err());
    }
}
