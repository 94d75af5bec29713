//! Relational shape required by the control plane. Applied with
//! `CREATE TABLE IF NOT EXISTS` so a fresh deployment and a test database
//! bootstrap the same way.

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS packages (
        package VARCHAR(200) PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS versions (
        package VARCHAR(200) NOT NULL REFERENCES packages (package),
        version VARCHAR(200) NOT NULL,
        PRIMARY KEY (package, version)
    )",
    "CREATE TABLE IF NOT EXISTS build_abis (
        abi_tag VARCHAR(100) PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS builds (
        build_id SERIAL PRIMARY KEY,
        package VARCHAR(200) NOT NULL,
        version VARCHAR(200) NOT NULL,
        built_by INTEGER NOT NULL,
        built_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        duration DOUBLE PRECISION NOT NULL CHECK (duration >= 0),
        status BOOLEAN NOT NULL DEFAULT true,
        abi_tag VARCHAR(100) NOT NULL,
        FOREIGN KEY (package, version) REFERENCES versions (package, version)
    )",
    "CREATE TABLE IF NOT EXISTS output (
        build_id INTEGER PRIMARY KEY REFERENCES builds (build_id),
        log_text TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS files (
        filename VARCHAR(255) PRIMARY KEY,
        build_id INTEGER NOT NULL REFERENCES builds (build_id),
        filesize BIGINT NOT NULL CHECK (filesize > 0),
        filehash CHAR(64) NOT NULL,
        package_tag VARCHAR(200) NOT NULL,
        package_version_tag VARCHAR(200) NOT NULL,
        py_version_tag VARCHAR(100) NOT NULL,
        abi_tag VARCHAR(100) NOT NULL,
        platform_tag VARCHAR(100) NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS downloads (
        filename VARCHAR(255) NOT NULL REFERENCES files (filename),
        host VARCHAR(100) NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        arch VARCHAR(100),
        distro_name VARCHAR(100),
        distro_version VARCHAR(100),
        os_name VARCHAR(100),
        os_version VARCHAR(100),
        py_name VARCHAR(100),
        py_version VARCHAR(100)
    )",
];
