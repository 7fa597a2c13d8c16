use crate::io::archive::write_flat_archive;
use crate::types::{PackError, PackResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::path::{Path, PathBuf};

/// Minimal XML tree for the metadata delivered with every product
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), text: None, children: Vec::new() }
    }

    /// Leaf element holding `text`
    pub fn leaf<T: ToString>(name: &str, text: T) -> Self {
        Self { name: name.to_string(), text: Some(text.to_string()), children: Vec::new() }
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// First child named `name`
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Pretty-printed document with an XML declaration
    pub fn to_xml_string(&self) -> PackResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        self.write_to(&mut writer)?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| PackError::XmlParsing(format!("generated XML is not UTF-8: {}", e)))
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> PackResult<()> {
        let name = self.name.as_str();
        if self.text.is_none() && self.children.is_empty() {
            writer.write_event(Event::Empty(BytesStart::new(name)))?;
            return Ok(());
        }

        writer.write_event(Event::Start(BytesStart::new(name)))?;
        if let Some(text) = &self.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }
}

/// Zip the data files of a product together with its metadata document
///
/// Writes `<out_dir>/<name>.xml`, zips it with `data_files` into
/// `<out_dir>/<name>.zip` and removes the loose files afterwards.
pub fn package_product<P: AsRef<Path>>(
    out_dir: P,
    name: &str,
    metadata: &XmlElement,
    data_files: &[PathBuf],
) -> PackResult<PathBuf> {
    let out_dir = out_dir.as_ref();
    let metadata_path = out_dir.join(format!("{}.xml", name));
    log::info!("Generating metadata file {}", metadata_path.display());
    std::fs::write(&metadata_path, metadata.to_xml_string()?)?;

    let mut members = Vec::with_capacity(data_files.len() + 1);
    for path in std::iter::once(&metadata_path).chain(data_files.iter()) {
        let file_name = path.file_name()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| {
                PackError::InvalidFormat(format!("invalid file name {}", path.display()))
            })?;
        members.push((file_name, std::fs::read(path)?));
    }

    let zip_path = out_dir.join(format!("{}.zip", name));
    log::info!("Creating new zipfile {}", zip_path.display());
    write_flat_archive(&zip_path, &members)?;

    std::fs::remove_file(&metadata_path)?;
    for path in data_files {
        std::fs::remove_file(path)?;
    }

    Ok(zip_path)
}
