use std::io::Write;

use itertools::Itertools;
use tempfile::NamedTempFile;
use tracing::info;

use super::error::Result;
use super::raw::GAZETTEER_DELIMITER;

/// Column layout of the GNIS domestic names national file.
pub const GNIS_HEADER: [&str; 20] = [
    "FEATURE_ID",
    "FEATURE_NAME",
    "FEATURE_CLASS",
    "STATE_ALPHA",
    "STATE_NUMERIC",
    "COUNTY_NAME",
    "COUNTY_NUMERIC",
    "PRIMARY_LAT_DMS",
    "PRIM_LONG_DMS",
    "PRIM_LAT_DEC",
    "PRIM_LONG_DEC",
    "SOURCE_LAT_DMS",
    "SOURCE_LONG_DMS",
    "SOURCE_LAT_DEC",
    "SOURCE_LONG_DEC",
    "ELEV_IN_M",
    "ELEV_IN_FT",
    "MAP_NAME",
    "DATE_CREATED",
    "DATE_EDITED",
];

/// A gazetteer row used by fixtures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixturePlace {
    pub id: u32,
    pub name: &'static str,
    pub class: &'static str,
    pub state: &'static str,
    pub county: &'static str,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub elev_m: Option<f64>,
    pub map: &'static str,
}

impl FixturePlace {
    /// Renders the place as a GNIS line; missing values become empty cells.
    pub fn to_line(&self) -> String {
        let number = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        let elev_ft = self.elev_m.map(|m| (m * 3.28084).round());
        [
            self.id.to_string(),
            self.name.to_owned(),
            self.class.to_owned(),
            self.state.to_owned(),
            String::new(),
            self.county.to_owned(),
            String::new(),
            String::new(),
            String::new(),
            number(self.lat),
            number(self.lon),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            number(self.elev_m),
            number(elev_ft),
            self.map.to_owned(),
            "01/19/1981".to_owned(),
            String::new(),
        ]
        .iter()
        .join(&GAZETTEER_DELIMITER.to_string())
    }
}

/// Hand-picked places with known coordinates.
pub const MINIMAL_PLACES: [FixturePlace; 5] = [
    FixturePlace {
        id: 1397658,
        name: "Mount Example",
        class: "Summit",
        state: "CO",
        county: "Chaffee",
        lat: Some(38.75),
        lon: Some(-106.25),
        elev_m: Some(4200.0),
        map: "Mount Harvard",
    },
    FixturePlace {
        id: 531723,
        name: "Washington Monument",
        class: "Locale",
        state: "DC",
        county: "District of Columbia",
        lat: Some(38.8895),
        lon: Some(-77.0353),
        elev_m: Some(10.0),
        map: "Washington West",
    },
    FixturePlace {
        id: 1199876,
        name: "Example Creek",
        class: "Stream",
        state: "PA",
        county: "Chester",
        lat: Some(40.0),
        lon: Some(-75.0),
        elev_m: None,
        map: "Malvern",
    },
    FixturePlace {
        id: 1657046,
        name: "Golden Gate Park",
        class: "Park",
        state: "CA",
        county: "San Francisco",
        lat: Some(37.7694),
        lon: Some(-122.4862),
        elev_m: Some(62.0),
        map: "San Francisco North",
    },
    FixturePlace {
        id: 858001,
        name: "Lost Spring",
        class: "Spring",
        state: "NV",
        county: "Nye",
        lat: None,
        lon: Some(-116.5),
        elev_m: Some(1650.0),
        map: "Lost Spring Canyon",
    },
];

/// Configuration for test data generation
#[derive(Debug, Clone)]
pub struct TestDataConfig {
    /// Number of synthetic places appended after the hand-picked ones
    pub generated_rows: usize,
    /// Whether to append a row whose latitude is not a number
    pub include_malformed: bool,
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self {
            generated_rows: 100,
            include_malformed: false,
        }
    }
}

impl TestDataConfig {
    /// Minimal data for unit tests
    pub fn minimal() -> Self {
        Self {
            generated_rows: 0,
            include_malformed: false,
        }
    }

    /// Sample data for integration tests
    pub fn sample() -> Self {
        Self::default()
    }

    /// Minimal data plus one malformed row
    pub fn with_malformed() -> Self {
        Self {
            generated_rows: 0,
            include_malformed: true,
        }
    }

    /// Number of data rows that will be written.
    pub fn row_count(&self) -> usize {
        MINIMAL_PLACES.len() + self.generated_rows + usize::from(self.include_malformed)
    }
}

/// Create a gazetteer file in a temporary file.
///
/// The hand-picked [`MINIMAL_PLACES`] come first, followed by the synthetic
/// rows spread across the contiguous United States and, if requested, one
/// malformed row.
pub fn create_test_data(config: &TestDataConfig) -> Result<NamedTempFile> {
    info!("Creating test data with config: {:?}", config);

    let mut file = NamedTempFile::new()?;
    write_gazetteer(&mut file, config)?;
    file.flush()?;
    Ok(file)
}

/// Writes the header and rows described by `config` to `out`.
pub fn write_gazetteer<W: Write>(out: &mut W, config: &TestDataConfig) -> Result<()> {
    writeln!(
        out,
        "{}",
        GNIS_HEADER.iter().join(&GAZETTEER_DELIMITER.to_string())
    )?;
    for place in &MINIMAL_PLACES {
        writeln!(out, "{}", place.to_line())?;
    }
    for i in 0..config.generated_rows {
        writeln!(out, "{}", generated_place(i).to_line())?;
    }
    if config.include_malformed {
        let mut broken = generated_place(config.generated_rows).to_line();
        broken = broken.replacen("|Generated", "|Malformed", 1);
        let cells: Vec<&str> = broken.split(GAZETTEER_DELIMITER).collect();
        let line = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| if i == 9 { "north" } else { *cell })
            .join(&GAZETTEER_DELIMITER.to_string());
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Synthetic place number `i`, laid out on a grid inside
/// `lat 30..45`, `lon -120..-75`.
pub fn generated_place(i: usize) -> FixturePlace {
    const NAMES: [&str; 5] = [
        "Generated Hill",
        "Generated Lake",
        "Generated Creek",
        "Generated Butte",
        "Generated Spring",
    ];
    const CLASSES: [&str; 5] = ["Summit", "Lake", "Stream", "Summit", "Spring"];
    let row = (i / 10) as f64;
    let col = (i % 10) as f64;
    FixturePlace {
        id: 2_000_000 + i as u32,
        name: NAMES[i % NAMES.len()],
        class: CLASSES[i % CLASSES.len()],
        state: "US",
        county: "Synthetic",
        lat: Some(30.0 + (row * 1.5) % 15.0),
        lon: Some(-120.0 + col * 4.5),
        elev_m: Some(100.0 + i as f64),
        map: "Synthetic Quad",
    }
}
