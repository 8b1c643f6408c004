pub const SCHEMA: &str = r#"
-- embeddings table (semantic deduplication cache)
CREATE TABLE IF NOT EXISTS embeddings (
    cache_key TEXT NOT NULL,
    model TEXT NOT NULL,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    vector BLOB NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (cache_key, model)
);

CREATE INDEX IF NOT EXISTS idx_embeddings_created_at ON embeddings(created_at);
"#;
