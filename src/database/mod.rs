//! # Database Access
//!
//! The serialized resource each oracle worker wraps: exactly one PostgreSQL
//! connection, never shared. Every request executes inside a transaction;
//! commit on success, roll back on any failure.
//!
//! Constraint violations (duplicate key, missing foreign key) are not
//! transport failures: they decode to [`DbReply::Rejected`] so a client can
//! tell "my request was invalid" from "the worker is unavailable".

pub mod schema;

use crate::error::{DbError, Error, Result};
use crate::models::{DownloadState, FileState};
use crate::oracle::requests::{DbRequest, DbReply};
use sqlx::{Connection, PgConnection};
use std::time::Duration;
use tracing::{debug, warn};

// PostgreSQL SQLSTATE codes for constraint violations.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

pub struct Database {
    conn: PgConnection,
}

impl Database {
    /// Acquire the connection, retrying a bounded number of times with a
    /// linear backoff before giving up with `DbError::Unavailable`.
    pub async fn connect(dsn: &str, retries: u32) -> Result<Self> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match PgConnection::connect(dsn).await {
                Ok(conn) => return Ok(Self { conn }),
                Err(err) if attempt <= retries => {
                    warn!(attempt, error = %err, "database connect failed, retrying");
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                }
                Err(err) => {
                    return Err(Error::Db(DbError::Unavailable {
                        message: err.to_string(),
                    }))
                }
            }
        }
    }

    /// Apply the relational schema (idempotent).
    pub async fn ensure_schema(&mut self) -> sqlx::Result<()> {
        for statement in schema::SCHEMA {
            sqlx::query(statement).execute(&mut self.conn).await?;
        }
        Ok(())
    }

    /// Execute one request inside a transaction-scoped boundary.
    pub async fn execute(&mut self, request: &DbRequest) -> sqlx::Result<DbReply> {
        match request {
            DbRequest::NewPackage { package } => self.add_package(package).await,
            DbRequest::NewVersion { package, version } => {
                self.add_version(package, version).await
            }
            DbRequest::LogBuild { build } => self.log_build(build).await,
            DbRequest::LogDownload { download } => self.log_download(download).await,
            DbRequest::GetBuildAbis => self.get_build_abis().await,
            DbRequest::GetPackageNames => self.get_package_names().await,
            DbRequest::GetPackageVersions => self.get_package_versions().await,
        }
    }

    async fn add_package(&mut self, package: &str) -> sqlx::Result<DbReply> {
        let mut tx = self.conn.begin().await?;
        let result = sqlx::query("INSERT INTO packages (package) VALUES ($1)")
            .bind(package)
            .execute(&mut *tx)
            .await;
        match result {
            Ok(_) => {
                tx.commit().await?;
                Ok(DbReply::Done)
            }
            Err(err) => reject_or_fail(tx, err).await,
        }
    }

    async fn add_version(&mut self, package: &str, version: &str) -> sqlx::Result<DbReply> {
        let mut tx = self.conn.begin().await?;
        let result = sqlx::query("INSERT INTO versions (package, version) VALUES ($1, $2)")
            .bind(package)
            .bind(version)
            .execute(&mut *tx)
            .await;
        match result {
            Ok(_) => {
                tx.commit().await?;
                Ok(DbReply::Done)
            }
            Err(err) => reject_or_fail(tx, err).await,
        }
    }

    async fn log_build(
        &mut self,
        build: &crate::models::BuildState,
    ) -> sqlx::Result<DbReply> {
        let mut tx = self.conn.begin().await?;
        let inserted: sqlx::Result<i32> = sqlx::query_scalar(
            "INSERT INTO builds (package, version, built_by, duration, status, abi_tag) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING build_id",
        )
        .bind(&build.package)
        .bind(&build.version)
        .bind(build.built_by)
        .bind(build.duration)
        .bind(build.status)
        .bind(&build.abi_tag)
        .fetch_one(&mut *tx)
        .await;
        let build_id = match inserted {
            Ok(build_id) => build_id,
            Err(err) => return reject_or_fail(tx, err).await,
        };

        if let Err(err) = sqlx::query("INSERT INTO output (build_id, log_text) VALUES ($1, $2)")
            .bind(build_id)
            .bind(&build.output)
            .execute(&mut *tx)
            .await
        {
            return reject_or_fail(tx, err).await;
        }

        for file in build.files().values() {
            let result = sqlx::query(
                "INSERT INTO files (filename, build_id, filesize, filehash, package_tag, \
                 package_version_tag, py_version_tag, abi_tag, platform_tag) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(&file.filename)
            .bind(build_id)
            .bind(file.filesize)
            .bind(&file.filehash)
            .bind(&file.package_tag)
            .bind(&file.package_version_tag)
            .bind(&file.py_version_tag)
            .bind(&file.abi_tag)
            .bind(&file.platform_tag)
            .execute(&mut *tx)
            .await;
            if let Err(err) = result {
                return reject_or_fail(tx, err).await;
            }
        }

        tx.commit().await?;
        debug!(build_id, package = %build.package, version = %build.version, "build logged");
        Ok(DbReply::BuildLogged { build_id })
    }

    async fn log_download(&mut self, download: &DownloadState) -> sqlx::Result<DbReply> {
        let mut tx = self.conn.begin().await?;
        let result = sqlx::query(
            "INSERT INTO downloads (filename, host, timestamp, arch, distro_name, \
             distro_version, os_name, os_version, py_name, py_version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&download.filename)
        .bind(&download.host)
        .bind(download.timestamp)
        .bind(&download.arch)
        .bind(&download.distro_name)
        .bind(&download.distro_version)
        .bind(&download.os_name)
        .bind(&download.os_version)
        .bind(&download.py_name)
        .bind(&download.py_version)
        .execute(&mut *tx)
        .await;
        match result {
            Ok(_) => {
                tx.commit().await?;
                Ok(DbReply::Done)
            }
            Err(err) => reject_or_fail(tx, err).await,
        }
    }

    async fn get_build_abis(&mut self) -> sqlx::Result<DbReply> {
        let abis = sqlx::query_scalar::<_, String>("SELECT abi_tag FROM build_abis ORDER BY abi_tag")
            .fetch_all(&mut self.conn)
            .await?;
        Ok(DbReply::BuildAbis(abis))
    }

    async fn get_package_names(&mut self) -> sqlx::Result<DbReply> {
        let names = sqlx::query_scalar::<_, String>("SELECT package FROM packages ORDER BY package")
            .fetch_all(&mut self.conn)
            .await?;
        Ok(DbReply::PackageNames(names))
    }

    async fn get_package_versions(&mut self) -> sqlx::Result<DbReply> {
        let pairs = sqlx::query_as::<_, (String, String)>(
            "SELECT package, version FROM versions ORDER BY package, version",
        )
        .fetch_all(&mut self.conn)
        .await?;
        Ok(DbReply::PackageVersions(pairs))
    }

    /// Re-read the file rows of a build; the tags come back from the stored
    /// columns, not re-parsed from the filename.
    pub async fn files_for_build(&mut self, build_id: i32) -> Result<Vec<FileState>> {
        type FileRow = (String, i64, String, String, String, String, String, String);
        let rows = sqlx::query_as::<_, FileRow>(
            "SELECT filename, filesize, filehash, package_tag, package_version_tag, \
             py_version_tag, abi_tag, platform_tag \
             FROM files WHERE build_id = $1 ORDER BY filename",
        )
        .bind(build_id)
        .fetch_all(&mut self.conn)
        .await?;
        rows.into_iter()
            .map(|(filename, filesize, filehash, pkg, ver, py, abi, plat)| {
                FileState::from_parts(
                    &filename, filesize, &filehash, &pkg, &ver, &py, &abi, &plat, true,
                )
                .map_err(Error::from)
            })
            .collect()
    }

    /// Count persisted download events for one file.
    pub async fn download_count(&mut self, filename: &str) -> sqlx::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM downloads WHERE filename = $1")
            .bind(filename)
            .fetch_one(&mut self.conn)
            .await
    }

    /// Count build rows for a (package, version) pair.
    pub async fn build_count(&mut self, package: &str, version: &str) -> sqlx::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM builds WHERE package = $1 AND version = $2")
            .bind(package)
            .bind(version)
            .fetch_one(&mut self.conn)
            .await
    }
}

/// Roll back and translate a constraint violation into `Rejected`; anything
/// else propagates as a database failure.
async fn reject_or_fail(
    tx: sqlx::Transaction<'_, sqlx::Postgres>,
    err: sqlx::Error,
) -> sqlx::Result<DbReply> {
    tx.rollback().await?;
    match constraint_reason(&err) {
        Some(reason) => Ok(DbReply::Rejected { reason }),
        None => Err(err),
    }
}

fn constraint_reason(err: &sqlx::Error) -> Option<String> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    match db_err.code().as_deref() {
        Some(UNIQUE_VIOLATION) => Some(format!("duplicate key: {}", db_err.message())),
        Some(FOREIGN_KEY_VIOLATION) => {
            Some(format!("missing foreign key: {}", db_err.message()))
        }
        Some(CHECK_VIOLATION) => Some(format!("check failed: {}", db_err.message())),
        _ => None,
    }
}
