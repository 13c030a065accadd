use std::collections::HashMap;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Transaction};
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};
use crate::model::{Aggregate, LookupSets, RawVariantRecord};
use crate::parser::tokens::TypedValue;

pub const SCHEMA_VERSION: i64 = 1;

/// One entry of the schema manifest.
struct Table {
    name: &'static str,
    columns: &'static [(&'static str, &'static str)],
    unique: Option<&'static str>,
    foreign_keys: &'static [(&'static str, &'static str)],
}

const NAME_COLUMNS: &[(&str, &str)] = &[("name", "TEXT")];
const IMAGE_COLUMNS: &[(&str, &str)] = &[("path", "TEXT"), ("data", "BLOB")];

/// Fact columns that are not stats.
const WEAPON_COLUMNS: &[(&str, &str)] = &[
    ("name", "INTEGER"),
    ("image", "INTEGER"),
    ("class", "INTEGER"),
    ("quality", "INTEGER"),
    ("homemade", "INTEGER"),
    ("image_url", "TEXT"),
];

pub const STAT_COLUMNS: &[(&str, &str)] = &[
    ("armour_penetration", "REAL"),
    ("attack_bonus", "INTEGER"),
    ("blood_loss", "REAL"),
    ("blunt_damage", "REAL"),
    ("cutting_damage", "REAL"),
    ("damage_vs_animals", "REAL"),
    ("damage_vs_beak_thing", "REAL"),
    ("damage_vs_bonedog", "REAL"),
    ("damage_vs_gorillo", "REAL"),
    ("damage_vs_humans", "REAL"),
    ("damage_vs_leviathan", "REAL"),
    ("damage_vs_robots", "REAL"),
    ("damage_vs_skimmer", "REAL"),
    ("damage_vs_small_spider", "REAL"),
    ("damage_vs_spider", "REAL"),
    ("defence_bonus", "INTEGER"),
    ("indoors_bonus", "INTEGER"),
    ("required_strength_level", "INTEGER"),
    ("sell_value", "INTEGER"),
    ("value", "INTEGER"),
    ("weight", "INTEGER"),
];

const WEAPON_FOREIGN_KEYS: &[(&str, &str)] = &[
    ("name", "WeaponName"),
    ("image", "WeaponImage"),
    ("class", "WeaponClass"),
    ("quality", "WeaponQuality"),
];

const LOOKUP_TABLES: &[Table] = &[
    Table { name: "WeaponName", columns: NAME_COLUMNS, unique: Some("name"), foreign_keys: &[] },
    Table { name: "WeaponClass", columns: NAME_COLUMNS, unique: Some("name"), foreign_keys: &[] },
    Table { name: "WeaponQuality", columns: NAME_COLUMNS, unique: Some("name"), foreign_keys: &[] },
    Table { name: "WeaponImage", columns: IMAGE_COLUMNS, unique: Some("path"), foreign_keys: &[] },
];

/// Stat columns are appended to these when the table is created.
const WEAPON_TABLE: Table = Table {
    name: "Weapon",
    columns: WEAPON_COLUMNS,
    unique: None,
    foreign_keys: WEAPON_FOREIGN_KEYS,
};

const VIEWS: &str = "
    CREATE VIEW IF NOT EXISTS WeaponNamesByClass(name, type) AS
        SELECT DISTINCT WeaponName.name, WeaponClass.name
        FROM Weapon
        JOIN WeaponName ON Weapon.name = WeaponName.id
        JOIN WeaponClass ON Weapon.class = WeaponClass.id;

    CREATE VIEW IF NOT EXISTS WeaponNamesByQuality(name, quality) AS
        SELECT DISTINCT WeaponName.name, WeaponQuality.name
        FROM Weapon
        JOIN WeaponName ON Weapon.name = WeaponName.id
        JOIN WeaponQuality ON Weapon.quality = WeaponQuality.id;

    CREATE VIEW IF NOT EXISTS WeaponNamesByQualityAndImage(name, quality, path) AS
        SELECT DISTINCT WeaponName.name, WeaponQuality.name, WeaponImage.path
        FROM Weapon
        JOIN WeaponName ON Weapon.name = WeaponName.id
        JOIN WeaponQuality ON Weapon.quality = WeaponQuality.id
        JOIN WeaponImage ON Weapon.image = WeaponImage.id;
";

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn user_version(conn: &Connection) -> Result<i64> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

fn create_table_sql(table: &Table, extra_columns: &'static [(&'static str, &'static str)]) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS \"{}\" (\n", table.name);
    sql.push_str("    \"id\" INTEGER NOT NULL UNIQUE,\n");
    for (column, ty) in table.columns.iter().chain(extra_columns) {
        let unique = if table.unique == Some(*column) { " UNIQUE" } else { "" };
        sql.push_str(&format!("    \"{column}\" {ty}{unique},\n"));
    }
    for (column, target) in table.foreign_keys {
        sql.push_str(&format!("    FOREIGN KEY(\"{column}\") REFERENCES \"{target}\"(\"id\"),\n"));
    }
    sql.push_str("    PRIMARY KEY(\"id\" AUTOINCREMENT)\n);\n");
    sql
}

/// Create tables and views once per database; a non-zero `user_version`
/// means it has been done already.
pub fn ensure_schema(conn: &Connection) -> Result<bool> {
    if user_version(conn)? != 0 {
        debug!("schema already present, keeping it");
        return Ok(false);
    }

    let mut sql = String::new();
    for table in LOOKUP_TABLES {
        sql.push_str(&create_table_sql(table, &[]));
    }
    sql.push_str(&create_table_sql(&WEAPON_TABLE, STAT_COLUMNS));
    sql.push_str(VIEWS);
    sql.push_str(&format!("PRAGMA user_version = {SCHEMA_VERSION};"));
    debug!(%sql, "creating schema");

    conn.execute_batch(&sql)?;
    info!(version = SCHEMA_VERSION, "schema created");
    Ok(true)
}

#[derive(Debug, Default, PartialEq)]
pub struct LoadStats {
    pub names: usize,
    pub classes: usize,
    pub qualities: usize,
    pub images: usize,
    pub weapons: usize,
}

/// Replace the whole dataset with `aggregate` in one transaction.
///
/// Any error rolls back, leaving the previous contents untouched.
pub fn reload(conn: &Connection, aggregate: &Aggregate) -> Result<LoadStats> {
    let sets = aggregate.lookup_sets();
    load_with(conn, aggregate, &sets)
}

fn load_with(conn: &Connection, aggregate: &Aggregate, sets: &LookupSets) -> Result<LoadStats> {
    let tx = conn.unchecked_transaction()?;
    reset(&tx)?;

    let names = insert_names(&tx, "WeaponName", sets.names.iter().copied())?;
    let classes = insert_names(&tx, "WeaponClass", sets.classes.iter().copied())?;
    let qualities = insert_names(&tx, "WeaponQuality", sets.qualities.iter().copied())?;
    let images = insert_images(&tx, sets.images.iter().copied())?;

    let ids = LookupIds {
        classes: &classes,
        qualities: &qualities,
        images: &images,
    };
    let weapons = insert_weapons(&tx, aggregate, &names, &ids)?;
    tx.commit()?;

    let stats = LoadStats {
        names: names.len(),
        classes: classes.len(),
        qualities: qualities.len(),
        images: images.len(),
        weapons,
    };
    info!(?stats, "store reloaded");
    Ok(stats)
}

/// Empty every table and restart its id sequence.
fn reset(tx: &Transaction) -> Result<()> {
    tx.execute_batch(
        "DELETE FROM Weapon;
         DELETE FROM WeaponName;
         DELETE FROM WeaponClass;
         DELETE FROM WeaponQuality;
         DELETE FROM WeaponImage;
         DELETE FROM sqlite_sequence
            WHERE name IN ('Weapon', 'WeaponName', 'WeaponClass', 'WeaponQuality', 'WeaponImage');
         REINDEX Weapon;
         REINDEX WeaponName;
         REINDEX WeaponClass;
         REINDEX WeaponQuality;
         REINDEX WeaponImage;",
    )?;
    debug!("store cleared");
    Ok(())
}

fn insert_names<'a>(
    tx: &Transaction,
    table: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<HashMap<String, i64>> {
    let mut stmt = tx.prepare(&format!("INSERT INTO \"{table}\" (name) VALUES (?1)"))?;
    let mut ids = HashMap::new();
    for name in names {
        stmt.execute(params![name])?;
        ids.insert(name.to_string(), tx.last_insert_rowid());
    }
    debug!(table, rows = ids.len(), "lookup rows inserted");
    Ok(ids)
}

fn insert_images<'a>(
    tx: &Transaction,
    paths: impl Iterator<Item = &'a str>,
) -> Result<HashMap<String, i64>> {
    let mut stmt = tx.prepare("INSERT INTO \"WeaponImage\" (path, data) VALUES (?1, ?2)")?;
    let mut ids = HashMap::new();
    for path in paths {
        let data = match std::fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path, error = %e, "image file unreadable, storing path only");
                None
            }
        };
        stmt.execute(params![path, data])?;
        ids.insert(path.to_string(), tx.last_insert_rowid());
    }
    debug!(rows = ids.len(), "image rows inserted");
    Ok(ids)
}

struct LookupIds<'a> {
    classes: &'a HashMap<String, i64>,
    qualities: &'a HashMap<String, i64>,
    images: &'a HashMap<String, i64>,
}

fn insert_weapons(
    tx: &Transaction,
    aggregate: &Aggregate,
    names: &HashMap<String, i64>,
    ids: &LookupIds,
) -> Result<usize> {
    let columns: Vec<&str> = WEAPON_COLUMNS
        .iter()
        .chain(STAT_COLUMNS)
        .map(|(c, _)| *c)
        .collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO \"Weapon\" ({}) VALUES ({})",
        columns.iter().map(|c| format!("\"{c}\"")).collect::<Vec<_>>().join(", "),
        placeholders
    );
    let mut stmt = tx.prepare(&sql)?;

    let mut count = 0;
    for (name, variants) in aggregate.weapons() {
        let name_id = *names.get(name).ok_or_else(|| {
            ScrapeError::StoreIntegrity(format!("weapon name {name:?} has no WeaponName row"))
        })?;
        debug!(weapon = name, id = name_id, variants = variants.len(), "inserting weapon");
        for variant in variants {
            let row = fact_row(name, name_id, variant, ids)?;
            stmt.execute(params_from_iter(row))?;
            count += 1;
        }
    }
    Ok(count)
}

fn fact_row(name: &str, name_id: i64, variant: &RawVariantRecord, ids: &LookupIds) -> Result<Vec<Value>> {
    let missing = |what: &str, key: &str| {
        ScrapeError::StoreIntegrity(format!("{what} {key:?} of weapon {name:?} has no lookup row"))
    };

    let class = match variant.class.as_str() {
        "" => Value::Null,
        class => Value::Integer(*ids.classes.get(class).ok_or_else(|| missing("class", class))?),
    };
    let quality = *ids
        .qualities
        .get(&variant.quality)
        .ok_or_else(|| missing("quality", &variant.quality))?;
    let image = match variant.local_image.as_deref() {
        None => Value::Null,
        Some(path) => Value::Integer(*ids.images.get(path).ok_or_else(|| missing("image", path))?),
    };

    for stat in variant.stats.keys() {
        if !STAT_COLUMNS.iter().any(|(c, _)| *c == stat.as_str()) {
            warn!(weapon = name, stat = %stat, "stat has no column, dropped");
        }
    }

    let mut row = vec![
        Value::Integer(name_id),
        image,
        class,
        Value::Integer(quality),
        Value::Integer(variant.homemade as i64),
        Value::Text(variant.image_url.clone()),
    ];
    row.extend(
        STAT_COLUMNS
            .iter()
            .map(|(column, _)| variant.stats.get(*column).map_or(Value::Null, sql_value)),
    );
    Ok(row)
}

fn sql_value(value: &TypedValue) -> Value {
    match *value {
        TypedValue::Integer(v) | TypedValue::Weight(v) => Value::Integer(v),
        TypedValue::Float(v) | TypedValue::Multiplier(v) | TypedValue::Percentage(v) => Value::Real(v),
    }
}
