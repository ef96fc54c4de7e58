/// Ledger tables. Table and column names are a compatibility contract with
/// existing databases; indices are not.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS builds (
    build_num INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    branch TEXT NOT NULL,
    subject TEXT NOT NULL,
    "commit" TEXT NOT NULL,
    parallel INTEGER NOT NULL,
    workflow TEXT,
    start_time TEXT,
    -- NULL while the build is running
    outcome TEXT,
    -- local metadata, never written by an upsert
    archived BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE INDEX IF NOT EXISTS idx_builds_branch ON builds(branch);

CREATE TABLE IF NOT EXISTS artifacts (
    url TEXT PRIMARY KEY,
    build_num INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_artifacts_build ON artifacts(build_num);
"#;
