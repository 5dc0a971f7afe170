//! Store (C2): the single shared mutable resource (§5). A transactional
//! SQLite-backed store, guarded by its own mutex and retrying on
//! `SQLITE_BUSY` (§9 "Global mutable state via the store handle", option
//! (b): guard writes with the store's own lock and retry on BUSY).

mod schema;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as Json;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::StoreError;
use crate::math::stable_hash;
use crate::types::{Image, PhaseRun, RunStatus, StoreStats, Tier};

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Mutates `value.exposure_quality` to `null` if present and outside
/// `[0, 100]`. Returns whether a change was made.
fn clamp_exposure_quality(value: &mut Json) -> bool {
    let Some(obj) = value.as_object_mut() else {
        return false;
    };
    let Some(field) = obj.get("exposure_quality") else {
        return false;
    };
    if field.is_null() {
        return false;
    }
    let in_range = field.as_f64().is_some_and(|f| (0.0..=100.0).contains(&f));
    if in_range {
        false
    } else {
        obj.insert("exposure_quality".to_string(), Json::Null);
        true
    }
}

/// The persistent per-image record, tier index, phase run log, and
/// enhancement plans (§4.2).
pub struct Store {
    conn: Mutex<Connection>,
    busy_retries: u32,
}

impl Store {
    /// Open (creating if absent) the store at `path`, enabling WAL mode and
    /// a busy timeout, and running the idempotent schema migration.
    pub fn open(path: &Path, busy_timeout_ms: u64, busy_retries: u32) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        for stmt in schema::DDL {
            conn.execute(stmt, [])?;
        }
        let version: Option<i64> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |r| r.get(0))
            .optional()?;
        if version.is_none() {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::SCHEMA_VERSION],
            )?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
            busy_retries,
        })
    }

    /// Open an in-memory store, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        for stmt in schema::DDL {
            conn.execute(stmt, [])?;
        }
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![schema::SCHEMA_VERSION],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            busy_retries: 10,
        })
    }

    /// Run `f` against the connection, retrying up to `busy_retries` times
    /// with ~1s linear back-off on `SQLITE_BUSY` (§4.2).
    fn with_retry<T>(&self, mut f: impl FnMut(&Connection) -> rusqlite::Result<T>) -> Result<T, StoreError> {
        let mut attempt = 0u32;
        loop {
            let result = {
                let conn = self.conn.lock().expect("store mutex poisoned");
                f(&conn)
            };
            match result {
                Ok(v) => return Ok(v),
                Err(rusqlite::Error::SqliteFailure(e, msg))
                    if e.code == rusqlite::ErrorCode::DatabaseBusy =>
                {
                    if attempt >= self.busy_retries {
                        return Err(StoreError::Locked {
                            attempts: attempt,
                            message: msg.unwrap_or_default(),
                        });
                    }
                    attempt += 1;
                    std::thread::sleep(Duration::from_millis(1000 * attempt as u64));
                }
                Err(e) => return Err(StoreError::Sqlite(e)),
            }
        }
    }

    // ---- Images ----------------------------------------------------

    pub fn upsert_image(&self, image: &Image) -> Result<(), StoreError> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO images (id, source_path, file_name, category, subcategory,
                    source_format, width, height, aspect_ratio, orientation, source_bytes,
                    exif_blob, camera_body, medium, film_stock, monochrome, curation_status,
                    content_hash, created_at, updated_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)
                 ON CONFLICT(id) DO UPDATE SET
                    source_path=excluded.source_path, file_name=excluded.file_name,
                    category=excluded.category, subcategory=excluded.subcategory,
                    source_format=excluded.source_format, width=excluded.width,
                    height=excluded.height, aspect_ratio=excluded.aspect_ratio,
                    orientation=excluded.orientation, source_bytes=excluded.source_bytes,
                    exif_blob=excluded.exif_blob, camera_body=excluded.camera_body,
                    medium=excluded.medium, film_stock=excluded.film_stock,
                    monochrome=excluded.monochrome, curation_status=excluded.curation_status,
                    content_hash=excluded.content_hash, updated_at=excluded.updated_at",
                params![
                    image.id,
                    image.source_path,
                    image.file_name,
                    image.category,
                    image.subcategory,
                    image.source_format,
                    image.width,
                    image.height,
                    image.aspect_ratio,
                    serde_json::to_string(&image.orientation).unwrap(),
                    image.source_bytes,
                    image.exif_blob,
                    image.camera_body,
                    serde_json::to_string(&image.medium).unwrap(),
                    image.film_stock,
                    image.monochrome as i64,
                    serde_json::to_string(&image.curation_status).unwrap(),
                    image.content_hash,
                    image.created_at,
                    image.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn image_exists(&self, id: &str) -> Result<bool, StoreError> {
        self.with_retry(|conn| {
            conn.query_row("SELECT 1 FROM images WHERE id = ?1", params![id], |_| Ok(()))
                .optional()
                .map(|r| r.is_some())
        })
    }

    pub fn get_image(&self, id: &str) -> Result<Option<Image>, StoreError> {
        self.with_retry(|conn| {
            conn.query_row("SELECT * FROM images WHERE id = ?1", params![id], row_to_image)
                .optional()
        })
    }

    pub fn all_image_ids(&self) -> Result<Vec<String>, StoreError> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM images ORDER BY id")?;
            let ids = stmt
                .query_map([], |r| r.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
    }

    // ---- Tiers -------------------------------------------------------

    pub fn tier_exists(
        &self,
        image_id: &str,
        variant_id: Option<&str>,
        tier_name: &str,
        format: &str,
    ) -> Result<bool, StoreError> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT 1 FROM tiers WHERE image_id=?1 AND variant_id IS ?2 AND tier_name=?3 AND format=?4",
                params![image_id, variant_id, tier_name, format],
                |_| Ok(()),
            )
            .optional()
            .map(|r| r.is_some())
        })
    }

    pub fn upsert_tier(&self, tier: &Tier) -> Result<(), StoreError> {
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO tiers (image_id, variant_id, tier_name, format, local_path,
                    remote_url, public_url, width, height, bytes, uploaded_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
                 ON CONFLICT(image_id, variant_id, tier_name, format) DO UPDATE SET
                    local_path=excluded.local_path, width=excluded.width,
                    height=excluded.height, bytes=excluded.bytes",
                params![
                    tier.image_id,
                    tier.variant_id,
                    tier.tier_name,
                    tier.format,
                    tier.local_path,
                    tier.remote_url,
                    tier.public_url,
                    tier.width,
                    tier.height,
                    tier.bytes,
                    tier.uploaded_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_tier_remote(
        &self,
        image_id: &str,
        variant_id: Option<&str>,
        tier_name: &str,
        format: &str,
        remote_url: &str,
        public_url: &str,
    ) -> Result<(), StoreError> {
        let uploaded_at = now();
        self.with_retry(|conn| {
            conn.execute(
                "UPDATE tiers SET remote_url=?1, public_url=?2, uploaded_at=?3
                 WHERE image_id=?4 AND variant_id IS ?5 AND tier_name=?6 AND format=?7",
                params![remote_url, public_url, uploaded_at, image_id, variant_id, tier_name, format],
            )?;
            Ok(())
        })
    }

    pub fn tiers_for_image(&self, image_id: &str) -> Result<Vec<Tier>, StoreError> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM tiers WHERE image_id = ?1")?;
            let rows = stmt
                .query_map(params![image_id], row_to_tier)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    // ---- Signals (generic, additive per §3/§9) ------------------------

    /// Replace all rows for `(table_name, image_id)` with `rows`. A single
    /// row is `rows.len() == 1`; many-rows-per-image tables (dominant
    /// colors, detections, OCR) pass the full set.
    pub fn upsert_signal(&self, table_name: &str, image_id: &str, rows: &[Json]) -> Result<(), StoreError> {
        let analyzed_at = now();
        self.with_retry(|conn| {
            conn.execute(
                "DELETE FROM signals WHERE table_name = ?1 AND image_id = ?2",
                params![table_name, image_id],
            )?;
            for (i, row) in rows.iter().enumerate() {
                conn.execute(
                    "INSERT INTO signals (table_name, image_id, row_index, payload, analyzed_at)
                     VALUES (?1,?2,?3,?4,?5)",
                    params![table_name, image_id, i as i64, row.to_string(), analyzed_at],
                )?;
            }
            Ok(())
        })
    }

    pub fn delete_signal(&self, table_name: &str, image_id: &str) -> Result<(), StoreError> {
        self.with_retry(|conn| {
            conn.execute(
                "DELETE FROM signals WHERE table_name = ?1 AND image_id = ?2",
                params![table_name, image_id],
            )?;
            Ok(())
        })
    }

    pub fn signal_rows(&self, table_name: &str, image_id: &str) -> Result<Vec<Json>, StoreError> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT payload FROM signals WHERE table_name = ?1 AND image_id = ?2 ORDER BY row_index",
            )?;
            let rows = stmt
                .query_map(params![table_name, image_id], |r| r.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows
                .into_iter()
                .filter_map(|s| serde_json::from_str(&s).ok())
                .collect())
        })
    }

    pub fn has_signal(&self, table_name: &str, image_id: &str) -> Result<bool, StoreError> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT 1 FROM signals WHERE table_name = ?1 AND image_id = ?2 LIMIT 1",
                params![table_name, image_id],
                |_| Ok(()),
            )
            .optional()
            .map(|r| r.is_some())
        })
    }

    /// Work discovery (§C5 `discover`): images that either lack `table_name`
    /// entirely, or (when `force`) are reprocessed unconditionally; filtered
    /// to images that carry every entry in `requires`, then by `N/M`
    /// sharding and `limit`.
    pub fn discover_missing(
        &self,
        table_name: &str,
        requires: &[&str],
        shard: Option<(u64, u64)>,
        limit: Option<usize>,
        force: bool,
    ) -> Result<Vec<String>, StoreError> {
        let ids = self.all_image_ids()?;
        let mut out = Vec::new();
        for id in ids {
            if !force && self.has_signal(table_name, &id)? {
                continue;
            }
            let mut satisfied = true;
            for req in requires {
                if !self.has_signal(req, &id)? {
                    satisfied = false;
                    break;
                }
            }
            if !satisfied {
                continue;
            }
            if let Some((n, m)) = shard {
                if m == 0 || stable_hash(&id) % m != n {
                    continue;
                }
            }
            out.push(id);
            if let Some(limit) = limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    // ---- Enhancement plans ---------------------------------------------

    pub fn upsert_plan_raw(
        &self,
        image_id: &str,
        version: u8,
        pre_metrics_json: &str,
        steps_json: [&str; 6],
        status: &str,
    ) -> Result<(), StoreError> {
        let ts = now();
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO enhancement_plans (image_id, version, pre_metrics_json,
                    white_balance_json, exposure_json, shadow_highlight_json, contrast_json,
                    saturation_json, sharpening_json, status, created_at, updated_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?11)
                 ON CONFLICT(image_id, version) DO UPDATE SET
                    pre_metrics_json=excluded.pre_metrics_json,
                    white_balance_json=excluded.white_balance_json,
                    exposure_json=excluded.exposure_json,
                    shadow_highlight_json=excluded.shadow_highlight_json,
                    contrast_json=excluded.contrast_json,
                    saturation_json=excluded.saturation_json,
                    sharpening_json=excluded.sharpening_json,
                    status=excluded.status, updated_at=excluded.updated_at",
                params![
                    image_id, version, pre_metrics_json,
                    steps_json[0], steps_json[1], steps_json[2],
                    steps_json[3], steps_json[4], steps_json[5],
                    status, ts,
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_plan_status(
        &self,
        image_id: &str,
        version: u8,
        status: &str,
        output_path: Option<&str>,
        post_metrics_json: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let ts = now();
        self.with_retry(|conn| {
            conn.execute(
                "UPDATE enhancement_plans SET status=?1, output_path=?2, post_metrics_json=?3,
                    error=?4, updated_at=?5 WHERE image_id=?6 AND version=?7",
                params![status, output_path, post_metrics_json, error, ts, image_id, version],
            )?;
            Ok(())
        })
    }

    pub fn plan_status(&self, image_id: &str, version: u8) -> Result<Option<String>, StoreError> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT status FROM enhancement_plans WHERE image_id=?1 AND version=?2",
                params![image_id, version],
                |r| r.get(0),
            )
            .optional()
        })
    }

    pub fn load_plan(&self, image_id: &str, version: u8) -> Result<Option<crate::types::EnhancementPlan>, StoreError> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT image_id, version, pre_metrics_json, white_balance_json, exposure_json,
                    shadow_highlight_json, contrast_json, saturation_json, sharpening_json,
                    output_path, post_metrics_json, status, error, created_at, updated_at
                 FROM enhancement_plans WHERE image_id=?1 AND version=?2",
                params![image_id, version],
                |r| {
                    let parse_step = |s: String| serde_json::from_str(&s).unwrap_or_default();
                    let status_str: String = r.get(11)?;
                    Ok(crate::types::EnhancementPlan {
                        image_id: r.get(0)?,
                        version: r.get::<_, i64>(1)? as u8,
                        pre_metrics_json: r.get(2)?,
                        white_balance: parse_step(r.get(3)?),
                        exposure: parse_step(r.get(4)?),
                        shadow_highlight: parse_step(r.get(5)?),
                        contrast: parse_step(r.get(6)?),
                        saturation: parse_step(r.get(7)?),
                        sharpening: parse_step(r.get(8)?),
                        output_path: r.get(9)?,
                        post_metrics_json: r.get(10)?,
                        status: match status_str.as_str() {
                            "enhanced" => crate::types::PlanStatus::Enhanced,
                            "accepted" => crate::types::PlanStatus::Accepted,
                            "failed" => crate::types::PlanStatus::Failed,
                            _ => crate::types::PlanStatus::Planned,
                        },
                        error: r.get(12)?,
                        created_at: r.get(13)?,
                        updated_at: r.get(14)?,
                    })
                },
            )
            .optional()
        })
    }

    /// §9 binary-corruption migration (`core fix-blobs`, §8 scenario 6):
    /// some `quality` signal rows were written with `exposure_quality` as a
    /// raw little-endian float32 BLOB instead of a JSON payload. Returns
    /// `(scanned, repaired)`. Every such row is rewritten as JSON; a decoded
    /// value outside `[0, 100]` becomes `null`. Rows already holding clean
    /// JSON are left untouched unless their `exposure_quality` is itself
    /// out of range, in which case it too is nulled.
    pub fn fix_blobs(&self) -> Result<(u64, u64), StoreError> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT rowid, payload FROM signals WHERE table_name = 'quality'",
            )?;
            let mut raw_rows: Vec<(i64, Vec<u8>)> = Vec::new();
            let mut cursor = stmt.query([])?;
            while let Some(row) = cursor.next()? {
                let rowid: i64 = row.get(0)?;
                let bytes = match row.get_ref(1)? {
                    rusqlite::types::ValueRef::Blob(b) => b.to_vec(),
                    rusqlite::types::ValueRef::Text(t) => t.to_vec(),
                    _ => Vec::new(),
                };
                raw_rows.push((rowid, bytes));
            }
            drop(cursor);

            let mut scanned = 0u64;
            let mut repaired = 0u64;
            for (rowid, bytes) in raw_rows {
                scanned += 1;
                match std::str::from_utf8(&bytes).ok().and_then(|s| serde_json::from_str::<Json>(s).ok()) {
                    Some(mut value) => {
                        if clamp_exposure_quality(&mut value) {
                            conn.execute(
                                "UPDATE signals SET payload = ?1 WHERE rowid = ?2",
                                params![value.to_string(), rowid],
                            )?;
                            repaired += 1;
                        }
                    }
                    None => {
                        let clean = (bytes.len() == 4)
                            .then(|| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
                            .filter(|f| (0.0..=100.0).contains(f));
                        let value = serde_json::json!({ "exposure_quality": clean });
                        conn.execute(
                            "UPDATE signals SET payload = ?1 WHERE rowid = ?2",
                            params![value.to_string(), rowid],
                        )?;
                        repaired += 1;
                    }
                }
            }
            Ok((scanned, repaired))
        })
    }

    // ---- Phase runs -----------------------------------------------------

    pub fn start_run(&self, phase: &str, config_json: Option<&str>) -> Result<i64, StoreError> {
        let started_at = now();
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO phase_runs (phase, status, started_at, config_json)
                 VALUES (?1, 'started', ?2, ?3)",
                params![phase, started_at, config_json],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn finish_run(
        &self,
        run_id: i64,
        processed: u64,
        failed: u64,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let finished_at = now();
        let status_str = serde_json::to_string(&status).unwrap().trim_matches('"').to_string();
        self.with_retry(|conn| {
            conn.execute(
                "UPDATE phase_runs SET status=?1, processed=?2, failed=?3, finished_at=?4, error=?5
                 WHERE run_id=?6",
                params![status_str, processed, failed, finished_at, error, run_id],
            )?;
            Ok(())
        })
    }

    pub fn runs_for_phase(&self, phase: &str) -> Result<Vec<PhaseRun>, StoreError> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT run_id, phase, status, processed, failed, started_at, finished_at, error, config_json
                 FROM phase_runs WHERE phase = ?1 ORDER BY run_id",
            )?;
            let rows = stmt
                .query_map(params![phase], row_to_phase_run)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    // ---- Uploads ----------------------------------------------------

    pub fn record_upload(&self, local: &str, remote: &str, bytes: u64) -> Result<(), StoreError> {
        let uploaded_at = now();
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO uploads (local_path, remote_path, bytes, uploaded_at, verified)
                 VALUES (?1,?2,?3,?4,0)
                 ON CONFLICT(remote_path) DO UPDATE SET local_path=excluded.local_path,
                    bytes=excluded.bytes, uploaded_at=excluded.uploaded_at",
                params![local, remote, bytes, uploaded_at],
            )?;
            Ok(())
        })
    }

    pub fn is_uploaded(&self, remote: &str) -> Result<bool, StoreError> {
        self.with_retry(|conn| {
            conn.query_row(
                "SELECT 1 FROM uploads WHERE remote_path = ?1",
                params![remote],
                |_| Ok(()),
            )
            .optional()
            .map(|r| r.is_some())
        })
    }

    // ---- Stats / bulk read --------------------------------------------

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        self.with_retry(|conn| {
            let mut stats = StoreStats::default();
            for table in ["images", "tiers", "variants", "enhancement_plans", "uploads"] {
                let count: u64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
                stats.table_counts.insert(table.to_string(), count);
            }
            let mut stmt = conn.prepare("SELECT DISTINCT table_name FROM signals")?;
            let names = stmt
                .query_map([], |r| r.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for name in names {
                let count: u64 = conn.query_row(
                    "SELECT COUNT(DISTINCT image_id) FROM signals WHERE table_name = ?1",
                    params![name],
                    |r| r.get(0),
                )?;
                stats.table_counts.insert(format!("signal:{name}"), count);
            }
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM phase_runs GROUP BY status")?;
            let runs = stmt
                .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, u64>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (status, count) in runs {
                stats.run_status_counts.insert(status, count);
            }
            Ok(stats)
        })
    }

    /// Join every per-image signal for C8 (exporter). The exporter itself
    /// decides how to interpret each named table's rows.
    pub fn load_image_full(&self, id: &str) -> Result<Option<(Image, Vec<Tier>, std::collections::BTreeMap<String, Vec<Json>>)>, StoreError> {
        let image = match self.get_image(id)? {
            Some(i) => i,
            None => return Ok(None),
        };
        let tiers = self.tiers_for_image(id)?;
        let signal_tables = self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT table_name FROM signals WHERE image_id = ?1",
            )?;
            let names = stmt
                .query_map(params![id], |r| r.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok::<_, rusqlite::Error>(names)
        })?;
        let mut signals = std::collections::BTreeMap::new();
        for table in signal_tables {
            let rows = self.signal_rows(&table, id)?;
            signals.insert(table, rows);
        }
        Ok(Some((image, tiers, signals)))
    }
}

fn row_to_image(row: &rusqlite::Row) -> rusqlite::Result<Image> {
    Ok(Image {
        id: row.get("id")?,
        source_path: row.get("source_path")?,
        file_name: row.get("file_name")?,
        category: row.get("category")?,
        subcategory: row.get("subcategory")?,
        source_format: row.get("source_format")?,
        width: row.get("width")?,
        height: row.get("height")?,
        aspect_ratio: row.get("aspect_ratio")?,
        orientation: serde_json::from_str(&row.get::<_, String>("orientation")?).unwrap(),
        source_bytes: row.get("source_bytes")?,
        exif_blob: row.get("exif_blob")?,
        camera_body: row.get("camera_body")?,
        medium: serde_json::from_str(&row.get::<_, String>("medium")?).unwrap(),
        film_stock: row.get("film_stock")?,
        monochrome: row.get::<_, i64>("monochrome")? != 0,
        curation_status: serde_json::from_str(&row.get::<_, String>("curation_status")?).unwrap(),
        content_hash: row.get("content_hash")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_tier(row: &rusqlite::Row) -> rusqlite::Result<Tier> {
    Ok(Tier {
        image_id: row.get("image_id")?,
        variant_id: row.get("variant_id")?,
        tier_name: row.get("tier_name")?,
        format: row.get("format")?,
        local_path: row.get("local_path")?,
        remote_url: row.get("remote_url")?,
        public_url: row.get("public_url")?,
        width: row.get("width")?,
        height: row.get("height")?,
        bytes: row.get("bytes")?,
        uploaded_at: row.get("uploaded_at")?,
    })
}

fn row_to_phase_run(row: &rusqlite::Row) -> rusqlite::Result<PhaseRun> {
    let status_str: String = row.get("status")?;
    Ok(PhaseRun {
        run_id: row.get("run_id")?,
        phase: row.get("phase")?,
        status: serde_json::from_str(&format!("\"{status_str}\"")).unwrap(),
        processed: row.get("processed")?,
        failed: row.get("failed")?,
        started_at: row.get("started_at")?,
        finished_at: row.get("finished_at")?,
        error: row.get("error")?,
        config_json: row.get("config_json")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CurationStatus, Medium, Orientation};

    fn sample_image(id: &str, path: &str) -> Image {
        let ts = now();
        Image {
            id: id.to_string(),
            source_path: path.to_string(),
            file_name: "a.jpg".to_string(),
            category: "Test".to_string(),
            subcategory: "Mini".to_string(),
            source_format: "jpg".to_string(),
            width: 3000,
            height: 2000,
            aspect_ratio: 1.5,
            orientation: Orientation::Landscape,
            source_bytes: 1000,
            exif_blob: None,
            camera_body: None,
            medium: Medium::Digital,
            film_stock: None,
            monochrome: false,
            curation_status: CurationStatus::Pending,
            content_hash: "abc".to_string(),
            created_at: ts.clone(),
            updated_at: ts,
        }
    }

    #[test]
    fn test_upsert_and_get_image_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let image = sample_image("id-1", "Test/Mini/a.jpg");
        store.upsert_image(&image).unwrap();
        assert!(store.image_exists("id-1").unwrap());
        let fetched = store.get_image("id-1").unwrap().unwrap();
        assert_eq!(fetched.source_path, "Test/Mini/a.jpg");
        assert_eq!(fetched.orientation, Orientation::Landscape);
    }

    #[test]
    fn test_discover_missing_respects_force_and_requires() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_image(&sample_image("id-1", "a.jpg")).unwrap();
        store.upsert_image(&sample_image("id-2", "b.jpg")).unwrap();

        let missing = store.discover_missing("hashes", &[], None, None, false).unwrap();
        assert_eq!(missing.len(), 2);

        store
            .upsert_signal("hashes", "id-1", &[serde_json::json!({"phash": "abc"})])
            .unwrap();
        let missing = store.discover_missing("hashes", &[], None, None, false).unwrap();
        assert_eq!(missing, vec!["id-2".to_string()]);

        let missing = store.discover_missing("hashes", &[], None, None, true).unwrap();
        assert_eq!(missing.len(), 2);

        let gated = store
            .discover_missing("face-identity", &["face-detections"], None, None, false)
            .unwrap();
        assert!(gated.is_empty());
    }

    #[test]
    fn test_sharding_partitions_without_overlap() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..20 {
            store
                .upsert_image(&sample_image(&format!("id-{i}"), &format!("{i}.jpg")))
                .unwrap();
        }
        let shard0 = store
            .discover_missing("pixel-analysis", &[], Some((0, 2)), None, false)
            .unwrap();
        let shard1 = store
            .discover_missing("pixel-analysis", &[], Some((1, 2)), None, false)
            .unwrap();
        assert_eq!(shard0.len() + shard1.len(), 20);
        let overlap: Vec<_> = shard0.iter().filter(|id| shard1.contains(id)).collect();
        assert!(overlap.is_empty());
    }

    #[test]
    fn test_phase_run_lifecycle() {
        let store = Store::open_in_memory().unwrap();
        let run_id = store.start_run("render", None).unwrap();
        store.finish_run(run_id, 10, 0, RunStatus::Completed, None).unwrap();
        let runs = store.runs_for_phase("render").unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Completed);
        assert_eq!(runs[0].processed, 10);
    }

    #[test]
    fn test_upload_dedup_by_remote_path() {
        let store = Store::open_in_memory().unwrap();
        store.record_upload("local/a.jpg", "remote/a.jpg", 100).unwrap();
        assert!(store.is_uploaded("remote/a.jpg").unwrap());
        assert!(!store.is_uploaded("remote/b.jpg").unwrap());
    }

    #[test]
    fn test_stats_counts_images_and_signals() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_image(&sample_image("id-1", "a.jpg")).unwrap();
        store
            .upsert_signal("dominant-colors", "id-1", &[serde_json::json!({"rank": 1})])
            .unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.table_counts["images"], 1);
        assert_eq!(stats.table_counts["signal:dominant-colors"], 1);
    }

    #[test]
    fn test_fix_blobs_repairs_raw_float_and_out_of_range_json() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_image(&sample_image("id-1", "a.jpg")).unwrap();
        store.upsert_image(&sample_image("id-2", "b.jpg")).unwrap();
        store.upsert_image(&sample_image("id-3", "c.jpg")).unwrap();

        store
            .upsert_signal("quality", "id-1", &[serde_json::json!({"exposure_quality": 250.0})])
            .unwrap();
        store
            .upsert_signal("quality", "id-2", &[serde_json::json!({"exposure_quality": 50.0})])
            .unwrap();

        store.with_retry(|conn| {
            conn.execute(
                "INSERT INTO signals (table_name, image_id, row_index, payload, analyzed_at) VALUES (?1,?2,?3,?4,?5)",
                params!["quality", "id-3", 0i64, 12.5f32.to_le_bytes().to_vec(), now()],
            )?;
            Ok(())
        }).unwrap();

        let (scanned, repaired) = store.fix_blobs().unwrap();
        assert_eq!(scanned, 3);
        assert_eq!(repaired, 2);

        let row1 = &store.signal_rows("quality", "id-1").unwrap()[0];
        assert!(row1["exposure_quality"].is_null());
        let row2 = &store.signal_rows("quality", "id-2").unwrap()[0];
        assert_eq!(row2["exposure_quality"].as_f64().unwrap(), 50.0);
        let row3 = &store.signal_rows("quality", "id-3").unwrap()[0];
        assert_eq!(row3["exposure_quality"].as_f64().unwrap(), 12.5);
    }
}
