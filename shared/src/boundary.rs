use serde::Deserialize;
use serde_json::Value;

/// One named region: its polygons, each a list of rings (outer first, holes after).
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRegion {
    pub name: String,
    pub polygons: Vec<Vec<Vec<[f64; 2]>>>,
    bbox: (f64, f64, f64, f64),
}

impl BoundaryRegion {
    pub fn new(name: String, polygons: Vec<Vec<Vec<[f64; 2]>>>) -> Self {
        let mut bbox = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for ring in polygons.iter().filter_map(|p| p.first()) {
            for &[x, y] in ring {
                bbox.0 = bbox.0.min(x);
                bbox.1 = bbox.1.min(y);
                bbox.2 = bbox.2.max(x);
                bbox.3 = bbox.3.max(y);
            }
        }
        Self {
            name,
            polygons,
            bbox,
        }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let (x0, y0, x1, y1) = self.bbox;
        if lon < x0 || lon > x1 || lat < y0 || lat > y1 {
            return false;
        }
        self.polygons.iter().any(|rings| {
            // Even-odd over all rings handles holes.
            rings.iter().filter(|r| ring_contains(r, lon, lat)).count() % 2 == 1
        })
    }
}

fn ring_contains(ring: &[[f64; 2]], lon: f64, lat: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[derive(Deserialize)]
struct RawCollection {
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum RawGeometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

const NAME_KEYS: [&str; 5] = ["name", "NAME", "admin", "ADMIN", "name_en"];

fn feature_name(props: Option<&serde_json::Map<String, Value>>) -> Option<String> {
    let props = props?;
    NAME_KEYS
        .iter()
        .find_map(|k| props.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

fn convert_ring(raw: Vec<Vec<f64>>) -> Vec<[f64; 2]> {
    raw.into_iter()
        .filter_map(|p| match p.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Some([*x, *y]),
            _ => None,
        })
        .collect()
}

/// A loaded boundary feature collection (country or province level).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundarySet {
    regions: Vec<BoundaryRegion>,
}

impl BoundarySet {
    pub fn from_regions(regions: Vec<BoundaryRegion>) -> Self {
        Self { regions }
    }

    /// Parse a GeoJSON FeatureCollection. Features without a name or with
    /// non-polygonal geometry are skipped.
    pub fn parse_geojson(json: &str) -> Result<Self, String> {
        let raw: RawCollection =
            serde_json::from_str(json).map_err(|e| format!("parse error: {e}"))?;
        let regions = raw
            .features
            .into_iter()
            .filter_map(|f| {
                let name = feature_name(f.properties.as_ref())?;
                let polygons = match f.geometry? {
                    RawGeometry::Polygon { coordinates } => {
                        vec![coordinates.into_iter().map(convert_ring).collect()]
                    }
                    RawGeometry::MultiPolygon { coordinates } => coordinates
                        .into_iter()
                        .map(|poly| poly.into_iter().map(convert_ring).collect())
                        .collect(),
                    RawGeometry::Unsupported => return None,
                };
                Some(BoundaryRegion::new(name, polygons))
            })
            .collect();
        Ok(Self { regions })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Name of the first region containing the point.
    pub fn locate(&self, lon: f64, lat: f64) -> Option<&str> {
        self.regions
            .iter()
            .find(|r| r.contains(lon, lat))
            .map(|r| r.name.as_str())
    }

    /// Every outer-ring segment, for drawing the basemap outline.
    pub fn outline_segments(&self) -> impl Iterator<Item = ([f64; 2], [f64; 2])> + '_ {
        self.regions
            .iter()
            .flat_map(|r| r.polygons.iter())
            .filter_map(|p| p.first())
            .flat_map(|ring| ring.windows(2).map(|w| (w[0], w[1])))
    }
}
