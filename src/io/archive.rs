use crate::types::{PackError, PackResult};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Product description stored as XML inside every delivered archive
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductMetadata {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub production_date: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub crs: Option<String>,
    #[serde(default)]
    pub burst_id: Option<String>,
    #[serde(default)]
    pub tile_id: Option<String>,
}

impl ProductMetadata {
    /// Parse a product XML document; the root element name is not checked
    pub fn parse(xml_content: &str) -> PackResult<Self> {
        from_str::<ProductMetadata>(xml_content)
            .map_err(|e| PackError::XmlParsing(format!("Failed to parse product XML: {}", e)))
    }

    /// Value of a field that must be present
    pub fn require<'a>(&self, value: &'a Option<String>, field: &str) -> PackResult<&'a str> {
        value.as_deref().ok_or_else(|| {
            PackError::Metadata(format!(
                "field '{}' missing from metadata of product {}",
                field,
                self.product_id.as_deref().unwrap_or("<unknown>")
            ))
        })
    }
}

/// Drop the separators of an ISO date (`2023-01-31` -> `20230131`)
pub fn compact_date(date: &str) -> String {
    date.replace('-', "")
}

/// Zip archive of a delivered product
pub struct ProductArchive {
    zip_path: PathBuf,
    archive: Option<ZipArchive<File>>,
}

impl ProductArchive {
    /// Create a reader for a product archive
    pub fn new<P: AsRef<Path>>(zip_path: P) -> PackResult<Self> {
        let zip_path = zip_path.as_ref().to_path_buf();

        if !zip_path.exists() {
            return Err(PackError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", zip_path.display()),
            )));
        }

        Ok(Self {
            zip_path,
            archive: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.zip_path
    }

    /// File name of the archive without extension
    pub fn stem(&self) -> String {
        self.zip_path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Open the ZIP archive
    fn open_archive(&mut self) -> PackResult<&mut ZipArchive<File>> {
        if self.archive.is_none() {
            let file = File::open(&self.zip_path)?;
            let archive = ZipArchive::new(file).map_err(|e| {
                PackError::InvalidFormat(format!(
                    "Failed to open ZIP {}: {}",
                    self.zip_path.display(),
                    e
                ))
            })?;
            self.archive = Some(archive);
        }
        self.archive.as_mut().ok_or_else(|| {
            PackError::InvalidFormat(format!("Archive {} is not open", self.zip_path.display()))
        })
    }

    /// List all files in the archive, in central directory order
    pub fn list_files(&mut self) -> PackResult<Vec<String>> {
        let archive = self.open_archive()?;
        let mut files = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            files.push(file.name().to_string());
        }

        Ok(files)
    }

    /// Read one member of the archive
    pub fn read_entry(&mut self, name: &str) -> PackResult<Vec<u8>> {
        let archive = self.open_archive()?;
        let mut file = archive.by_name(name)?;
        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Parse every XML member of the archive, in archive order
    pub fn read_metadata(&mut self) -> PackResult<Vec<ProductMetadata>> {
        let mut xml_files: Vec<String> = self.list_files()?
            .into_iter()
            .filter(|name| name.ends_with(".xml"))
            .collect();
        let mut documents = Vec::with_capacity(xml_files.len());

        for name in xml_files.drain(..) {
            let content = self.read_entry(&name)?;
            let xml_content = String::from_utf8(content).map_err(|e| {
                PackError::XmlParsing(format!("{} is not valid UTF-8: {}", name, e))
            })?;
            documents.push(ProductMetadata::parse(&xml_content)?);
        }

        Ok(documents)
    }

    /// Metadata of the first XML document in the archive
    pub fn primary_metadata(&mut self) -> PackResult<ProductMetadata> {
        self.read_metadata()?
            .into_iter()
            .next()
            .ok_or_else(|| PackError::Metadata(format!(
                "No XML metadata found in {}",
                self.zip_path.display()
            )))
    }

    /// Archive member whose file name (without directories) equals `file_name`
    pub fn find_member(&mut self, file_name: &str) -> PackResult<Option<String>> {
        Ok(self.list_files()?
            .into_iter()
            .find(|name| member_file_name(name) == file_name))
    }
}

/// Last path component of an archive member name
pub fn member_file_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Create `zip_path` holding `members` at the archive root
pub fn write_flat_archive<P: AsRef<Path>>(
    zip_path: P,
    members: &[(String, Vec<u8>)],
) -> PackResult<()> {
    let file = File::create(zip_path.as_ref())?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, content) in members {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

/// Re-pack the XML and CSV members of a provider archive at the root of a new archive
///
/// Only members whose name contains the archive stem are kept. The new archive is
/// written to `out_dir` under the same file name.
pub fn flatten_archive<P, Q>(zip_path: P, out_dir: Q) -> PackResult<PathBuf>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let mut archive = ProductArchive::new(&zip_path)?;
    let stem = archive.stem();
    log::info!("Reading file {}", archive.path().display());

    let mut members = Vec::new();
    for name in archive.list_files()? {
        let file_name = member_file_name(&name).to_string();
        let wanted = (file_name.ends_with(".xml") || file_name.ends_with(".csv"))
            && file_name.contains(&stem);
        if wanted {
            log::debug!("Keeping member {}", name);
            let content = archive.read_entry(&name)?;
            members.push((file_name, content));
        }
    }

    if members.is_empty() {
        log::warn!("No XML or CSV members matching {} in {}", stem, archive.path().display());
    }

    std::fs::create_dir_all(out_dir.as_ref())?;
    let out_path = out_dir.as_ref().join(format!("{}.zip", stem));
    if out_path == archive.path() {
        return Err(PackError::Config(format!(
            "Refusing to overwrite input archive {}",
            out_path.display()
        )));
    }
    log::info!("Creating new zipfile {}", out_path.display());
    write_flat_archive(&out_path, &members)?;
    Ok(out_path)
}
