use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::route::AreaLabel;

/* Reference table mapping the region identifier found on boundary polygons
to display names. Expected schema:

    CREATE TABLE `area_code` (
        `code`     TEXT PRIMARY KEY NOT NULL,
        `province` TEXT,
        `city`     TEXT,
        `area`     TEXT
    );

The table is small (a few thousand rows), so it is read into memory once and
the connection is closed. Lookups during resolution never touch sqlite and can
run from any number of threads.
*/
pub struct AreaCodeTable {
    labels: HashMap<String, AreaLabel>,
}

impl AreaCodeTable {
    pub fn open(path: &Path) -> Result<AreaCodeTable, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::MissingReferenceDb(path.to_path_buf()));
        }
        debug!("opening area code db {:?}", path);
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let table = Self::load(&conn)?;
        conn.close().map_err(|(_, e)| e)?;
        Ok(table)
    }

    pub fn load(conn: &Connection) -> Result<AreaCodeTable, ConfigError> {
        let mut query = conn.prepare("SELECT code, province, city, area FROM area_code;")?;
        let rows = query.query_map((), |row| {
            let code: String = row.get(0)?;
            let province: Option<String> = row.get(1)?;
            let city: Option<String> = row.get(2)?;
            let area: Option<String> = row.get(3)?;
            Ok((
                code,
                AreaLabel {
                    province: province.unwrap_or_default(),
                    city: city.unwrap_or_default(),
                    district: area.unwrap_or_default(),
                },
            ))
        })?;
        let labels = rows.collect::<Result<HashMap<_, _>, _>>()?;
        info!("loaded {} area codes", labels.len());
        Ok(AreaCodeTable { labels })
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, AreaLabel)>) -> Self {
        AreaCodeTable {
            labels: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, code: &str) -> Option<&AreaLabel> {
        self.labels.get(code)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
