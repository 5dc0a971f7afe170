//! Schema DDL (§4.2). Additive only: every statement is `IF NOT EXISTS`;
//! code never drops or rewrites a column, only adds new tables/indexes.

pub const SCHEMA_VERSION: i64 = 1;

pub const DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
    "CREATE TABLE IF NOT EXISTS images (
        id TEXT PRIMARY KEY,
        source_path TEXT NOT NULL UNIQUE,
        file_name TEXT NOT NULL,
        category TEXT NOT NULL,
        subcategory TEXT NOT NULL,
        source_format TEXT NOT NULL,
        width INTEGER NOT NULL,
        height INTEGER NOT NULL,
        aspect_ratio REAL NOT NULL,
        orientation TEXT NOT NULL,
        source_bytes INTEGER NOT NULL,
        exif_blob TEXT,
        camera_body TEXT,
        medium TEXT NOT NULL,
        film_stock TEXT,
        monochrome INTEGER NOT NULL,
        curation_status TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tiers (
        image_id TEXT NOT NULL,
        variant_id TEXT,
        tier_name TEXT NOT NULL,
        format TEXT NOT NULL,
        local_path TEXT NOT NULL,
        remote_url TEXT,
        public_url TEXT,
        width INTEGER NOT NULL,
        height INTEGER NOT NULL,
        bytes INTEGER NOT NULL,
        uploaded_at TEXT,
        PRIMARY KEY (image_id, variant_id, tier_name, format)
    )",
    "CREATE INDEX IF NOT EXISTS idx_tiers_image ON tiers(image_id)",
    "CREATE TABLE IF NOT EXISTS variants (
        id TEXT PRIMARY KEY,
        image_id TEXT NOT NULL,
        variant_type TEXT NOT NULL,
        source_tier TEXT NOT NULL,
        status TEXT NOT NULL,
        error TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_variants_image ON variants(image_id)",
    "CREATE TABLE IF NOT EXISTS signals (
        table_name TEXT NOT NULL,
        image_id TEXT NOT NULL,
        row_index INTEGER NOT NULL DEFAULT 0,
        payload TEXT NOT NULL,
        analyzed_at TEXT,
        PRIMARY KEY (table_name, image_id, row_index)
    )",
    "CREATE INDEX IF NOT EXISTS idx_signals_table_image ON signals(table_name, image_id)",
    "CREATE TABLE IF NOT EXISTS enhancement_plans (
        image_id TEXT NOT NULL,
        version INTEGER NOT NULL,
        pre_metrics_json TEXT NOT NULL,
        white_balance_json TEXT NOT NULL,
        exposure_json TEXT NOT NULL,
        shadow_highlight_json TEXT NOT NULL,
        contrast_json TEXT NOT NULL,
        saturation_json TEXT NOT NULL,
        sharpening_json TEXT NOT NULL,
        output_path TEXT,
        post_metrics_json TEXT,
        status TEXT NOT NULL,
        error TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (image_id, version)
    )",
    "CREATE TABLE IF NOT EXISTS phase_runs (
        run_id INTEGER PRIMARY KEY AUTOINCREMENT,
        phase TEXT NOT NULL,
        status TEXT NOT NULL,
        processed INTEGER NOT NULL DEFAULT 0,
        failed INTEGER NOT NULL DEFAULT 0,
        started_at TEXT NOT NULL,
        finished_at TEXT,
        error TEXT,
        config_json TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_phase_runs_phase ON phase_runs(phase)",
    "CREATE TABLE IF NOT EXISTS uploads (
        local_path TEXT NOT NULL,
        remote_path TEXT NOT NULL UNIQUE,
        bytes INTEGER NOT NULL,
        uploaded_at TEXT NOT NULL,
        verified INTEGER NOT NULL
    )",
];
