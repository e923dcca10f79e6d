use crate::config_type::ConfigType;
use crate::error::{NacosConfigError, Result};
use crate::flatten::{flatten, ConfigNode};
use crate::key_space::FlattenedKeySpace;
use crate::parser::ConfigParser;
use anyhow::{anyhow, bail};
use indexmap::map::Entry;
use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;

/// 允许在 XML 声明中出现的编码
///
/// 内容到达这里时已经是 Unicode 文本，声明为其他编码的文档视为不支持
const SUPPORTED_ENCODINGS: &[&str] = &[
    "utf-8", "utf8", "utf-16", "utf-16le", "utf-16be", "us-ascii", "ascii",
];

/// XML 格式解析器
///
/// 只支持受限的文档形态：
/// - 根元素名不进入键，根元素的子元素构成顶层映射
/// - 没有子元素的元素是叶子，值为去除首尾空白的文本
/// - 有子元素的元素递归为有序映射，忽略其中的文本
/// - 同级重名元素按出现顺序聚合为列表
/// - 属性、注释、处理指令被忽略
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlConfigParser;

impl XmlConfigParser {
    pub fn new() -> Self {
        Self
    }
}

impl ConfigParser for XmlConfigParser {
    fn parse(&self, content: &str) -> Result<FlattenedKeySpace> {
        let root = read_document(content)
            .map_err(|e| NacosConfigError::parse(ConfigType::Xml.as_str(), content, e))?;
        flatten(&root).map_err(|e| NacosConfigError::parse(ConfigType::Xml.as_str(), content, e))
    }

    fn process_type(&self) -> &str {
        ConfigType::Xml.as_str()
    }
}

/// 解析中的元素
struct XmlFrame {
    name: String,
    children: IndexMap<String, ConfigNode>,
    has_children: bool,
    text: String,
}

impl XmlFrame {
    fn new(name: String) -> Self {
        Self {
            name,
            children: IndexMap::new(),
            has_children: false,
            text: String::new(),
        }
    }

    fn into_node(self) -> ConfigNode {
        if self.has_children {
            ConfigNode::Map(self.children)
        } else {
            ConfigNode::String(self.text.trim().to_string())
        }
    }

    fn add_child(&mut self, name: String, value: ConfigNode) {
        self.has_children = true;
        match self.children.entry(name) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            // 元素值只会是字符串或映射，出现 List 说明已经发生过重名聚合
            Entry::Occupied(mut entry) => match entry.get_mut() {
                ConfigNode::List(items) => items.push(value),
                existing => {
                    let first = std::mem::replace(existing, ConfigNode::Null);
                    *existing = ConfigNode::List(vec![first, value]);
                }
            },
        }
    }
}

fn element_name(raw: &[u8]) -> anyhow::Result<String> {
    Ok(std::str::from_utf8(raw)?.to_string())
}

fn read_document(content: &str) -> anyhow::Result<IndexMap<String, ConfigNode>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlFrame> = Vec::new();
    let mut root: Option<IndexMap<String, ConfigNode>> = None;

    loop {
        match reader.read_event()? {
            Event::Decl(decl) => {
                if let Some(encoding) = decl.encoding() {
                    let label = String::from_utf8_lossy(&encoding?).to_lowercase();
                    if !SUPPORTED_ENCODINGS.contains(&label.as_str()) {
                        bail!("Unsupported XML encoding '{}'", label);
                    }
                }
            }
            Event::Start(start) => {
                if stack.is_empty() && root.is_some() {
                    bail!("XML document has more than one root element");
                }
                stack.push(XmlFrame::new(element_name(start.name().as_ref())?));
            }
            Event::Empty(empty) => {
                let name = element_name(empty.name().as_ref())?;
                match stack.last_mut() {
                    Some(parent) => parent.add_child(name, ConfigNode::String(String::new())),
                    None if root.is_some() => {
                        bail!("XML document has more than one root element")
                    }
                    None => root = Some(IndexMap::new()),
                }
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => bail!("Text content outside of the root element"),
                }
            }
            Event::CData(cdata) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| anyhow!("Unexpected closing tag"))?;
                let name = frame.name.clone();
                let node = frame.into_node();
                match stack.last_mut() {
                    Some(parent) => parent.add_child(name, node),
                    None => {
                        root = Some(match node {
                            ConfigNode::Map(children) => children,
                            _ => IndexMap::new(),
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = stack.last() {
        bail!("Unclosed element <{}>", unclosed.name);
    }
    root.ok_or_else(|| anyhow!("XML document has no root element"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_leaves_and_nested_maps() {
        let content = r#"<?xml version="1.0" encoding="UTF-8"?>
<config>
    <!-- datasource -->
    <datasource>
        <url>jdbc:mysql://localhost/db</url>
        <pool size="ignored">
            <max>16</max>
        </pool>
    </datasource>
    <name> demo </name>
    <flag/>
</config>"#;
        let space = XmlConfigParser.parse(content).unwrap();
        let entries: Vec<_> = space.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("datasource.url", "jdbc:mysql://localhost/db"),
                ("datasource.pool.max", "16"),
                ("name", "demo"),
                ("flag", ""),
            ]
        );
    }

    #[test]
    fn test_xml_repeated_siblings_under_dotted_path() {
        let content = r#"<config>
    <server>
        <cluster>
            <node>a</node>
            <node>b</node>
            <zone>z1</zone>
            <node>c</node>
        </cluster>
    </server>
    <peer><host>h1</host></peer>
    <peer><host>h2</host></peer>
</config>"#;
        let space = XmlConfigParser.parse(content).unwrap();
        let entries: Vec<_> = space.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("server.cluster.node[0]", "a"),
                ("server.cluster.node[1]", "b"),
                ("server.cluster.node[2]", "c"),
                ("server.cluster.zone", "z1"),
                ("peer[0].host", "h1"),
                ("peer[1].host", "h2"),
            ]
        );
    }

    #[test]
    fn test_xml_escapes_and_cdata() {
        let content = "<c><a>x &amp; y</a><b><![CDATA[<raw>]]></b></c>";
        let space = XmlConfigParser.parse(content).unwrap();
        assert_eq!(space.get("a"), Some("x & y"));
        assert_eq!(space.get("b"), Some("<raw>"));
    }

    #[test]
    fn test_xml_malformed() {
        assert!(XmlConfigParser.parse("<a><b></a>").unwrap_err().is_parse_error());
        assert!(XmlConfigParser.parse("<a><b>x</b>").unwrap_err().is_parse_error());
        assert!(XmlConfigParser.parse("").unwrap_err().is_parse_error());
        assert!(XmlConfigParser.parse("<a/><b/>").unwrap_err().is_parse_error());
    }

    #[test]
    fn test_xml_unsupported_encoding() {
        let content = r#"<?xml version="1.0" encoding="bogus-8"?><a><b>1</b></a>"#;
        let err = XmlConfigParser.parse(content).unwrap_err();
        assert!(err.to_string().contains("Unsupported XML encoding"));
    }
}
