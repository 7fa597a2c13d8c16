use crate::io::vector::{srs_from_epsg, union_all, VectorLayer};
use crate::types::{PackError, PackResult, EPSG_WGS84};
use gdal::spatial_ref::CoordTransform;
use gdal::vector::Geometry;
use std::path::{Path, PathBuf};

/// Tag and display name of a registered area of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AoiInfo {
    pub tag: &'static str,
    pub name: &'static str,
}

/// Accepted lower-case aliases, tag and name of every known AOI
const AOI_REGISTRY: &[(&[&str], &str, &str)] = &[
    (&["nocera_terinese", "ntr", "nocera terinese"], "NTR", "A2 - Nocera Terinese"),
    (&["palermo", "pal"], "PAL", "Palermo"),
    (&["brennero", "brn"], "BRN", "Brennero Area"),
    (&["cortina", "crt"], "CRT", "Cortina"),
    (&["norcia", "nri"], "NRI", "Norcia"),
    (&["pistoia", "pst"], "PST", "Pistoia"),
    (&["mattinata", "mti"], "mti", "Mattinata"),
    (&["colli_albani", "coa"], "coa", "Colli ALbani Area"),
    (&["vulcano", "vla"], "VLA", "Vulcano Island"),
    // regions
    (&["calabria", "cal"], "CAL", "Calabria"),
    (&["sicilia", "sic"], "SIC", "Sicilia"),
    (&["basilicata", "bas"], "BAS", "Basilicata"),
    (&["puglia", "pug"], "PUG", "Puglia"),
    (&["campania", "cam"], "CAM", "Campania"),
    (&["molise", "mol"], "MOL", "Molise"),
    (&["abruzzo", "abr"], "ABR", "Abruzzo"),
    (&["lazio", "laz"], "LAZ", "Lazio"),
    (&["umbria", "umb"], "UMB", "Umbria"),
    (&["marche", "mar"], "MAR", "Marche"),
    (&["emilia_romagna", "era"], "ERA", "Emilia Romagna"),
    (&["toscana", "tos"], "TOS", "Toscana"),
    (&["lombardia", "lom"], "LOM", "Lombardia"),
    (&["piemonte", "pie"], "PIE", "Piemonte"),
    (&["sardegna", "sar"], "SAR", "Sardegna"),
    (&["trentino", "taa"], "TAA", "Trentino Alto Adige"),
    (&["veneto", "ven"], "VEN", "Veneto"),
    (&["friuli_venezia_giulia", "fvg"], "FVG", "Friuli Venezia Giulia"),
    (&["liguria", "lig"], "LIG", "Liguria"),
    (&["valle_d_aosta", "vda"], "VDA", "Valle d'Aosta"),
];

/// Look up an AOI by full name or tag, ignoring case
pub fn aoi_info(aoi: &str) -> PackResult<AoiInfo> {
    let key = aoi.trim().to_lowercase();
    AOI_REGISTRY.iter()
        .find(|(aliases, _, _)| aliases.contains(&key.as_str()))
        .map(|(_, tag, name)| AoiInfo { tag, name })
        .ok_or_else(|| PackError::UnknownAoi(aoi.to_string()))
}

/// AOI named by the file stem of an index shapefile (`.../palermo.shp` -> PAL)
pub fn aoi_info_from_path<P: AsRef<Path>>(path: P) -> PackResult<AoiInfo> {
    let stem = path.as_ref().file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| PackError::UnknownAoi(path.as_ref().display().to_string()))?;
    aoi_info(&stem)
}

/// Area of interest: the union of all polygons of an AOI file, in EPSG:4326
pub struct AreaOfInterest {
    source: PathBuf,
    geometry: Geometry,
}

impl AreaOfInterest {
    /// Load an AOI vector file
    ///
    /// Fails when the file is missing, has no features, or carries no
    /// coordinate reference system.
    pub fn load<P: AsRef<Path>>(path: P) -> PackResult<Self> {
        let source = path.as_ref().to_path_buf();
        if !source.exists() {
            return Err(PackError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("AOI file {} does not exist", source.display()),
            )));
        }

        let layer = VectorLayer::read(&source)?;
        if layer.srs.is_none() {
            return Err(PackError::Crs(format!(
                "AOI file {} has no coordinate reference system",
                source.display()
            )));
        }
        let layer = layer.reproject(EPSG_WGS84)?;

        let geometry = union_all(layer.features.iter().map(|f| &f.geometry))?
            .ok_or_else(|| PackError::InvalidFormat(format!(
                "AOI file {} has no geometries",
                source.display()
            )))?;
        log::debug!("Loaded AOI from {} ({} features)", source.display(), layer.len());

        Ok(Self { source, geometry })
    }

    /// Build an AOI directly from an EPSG:4326 geometry
    pub fn from_geometry(source: &str, geometry: Geometry) -> Self {
        Self { source: PathBuf::from(source), geometry }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// File name of the AOI source, used to name index outputs
    pub fn file_name(&self) -> PackResult<String> {
        self.source.file_name()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| PackError::Config(format!("invalid AOI path {}", self.source.display())))
    }

    /// AOI geometry in EPSG:4326
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn intersects(&self, geometry: &Geometry) -> bool {
        self.geometry.intersects(geometry)
    }

    /// AOI geometry transformed to `epsg`
    pub fn geometry_in(&self, epsg: u32) -> PackResult<Geometry> {
        if epsg == EPSG_WGS84 {
            return Ok(self.geometry.clone());
        }
        let transform = CoordTransform::new(&srs_from_epsg(EPSG_WGS84)?, &srs_from_epsg(epsg)?)?;
        Ok(self.geometry.transform(&transform)?)
    }
}
