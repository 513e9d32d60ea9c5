pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS devices (
        id INTEGER PRIMARY KEY,
        name TEXT UNIQUE NOT NULL,
        device_type TEXT NOT NULL,
        image_url TEXT
    );

    CREATE TABLE IF NOT EXISTS components (
        id INTEGER PRIMARY KEY,
        device_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        FOREIGN KEY(device_id) REFERENCES devices(id)
    );

    CREATE TABLE IF NOT EXISTS guides (
        id INTEGER PRIMARY KEY,
        device_id INTEGER,
        title TEXT NOT NULL,
        date_created TEXT NOT NULL,
        url TEXT,
        category TEXT NOT NULL DEFAULT 'Other',
        FOREIGN KEY(device_id) REFERENCES devices(id)
    );

    CREATE TABLE IF NOT EXISTS steps (
        id INTEGER PRIMARY KEY,
        guide_id INTEGER NOT NULL,
        step_number INTEGER NOT NULL,
        description TEXT NOT NULL,
        FOREIGN KEY(guide_id) REFERENCES guides(id),
        UNIQUE(guide_id, step_number)
    );

    CREATE TABLE IF NOT EXISTS classified_images (
        id INTEGER PRIMARY KEY,
        hash_sha256 TEXT UNIQUE NOT NULL,
        filename TEXT NOT NULL,
        source_path TEXT NOT NULL,
        stored_path TEXT NOT NULL,
        category TEXT NOT NULL,
        confidence REAL NOT NULL,
        width INTEGER,
        height INTEGER
    );
";
