pub mod csv;
pub mod deflate;
pub mod options;

pub use csv::{DataSet, import_csv};
pub use deflate::{inflate_to, open_input};
pub use options::{ImportOptions, ImportReport};

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::Database;
use crate::collection::Collection;
use crate::errors::DbError;

/// Resolves the target collection, honoring `drop_existing`. `None` means
/// the target is already populated and must be left alone.
fn target(db: &Database, data_set: DataSet, opts: &ImportOptions) -> Option<Arc<Collection>> {
    let name = data_set.collection_name();
    let col = db.create_collection(name);
    if col.is_empty() {
        return Some(col);
    }
    if opts.drop_existing {
        log::info!("import: dropping existing {name} ({} documents)", col.len());
        db.drop_collection(name);
        return Some(db.create_collection(name));
    }
    log::warn!("import: {name} already holds {} documents, skipping", col.len());
    None
}

/// Imports rows from `reader` into the collection of `data_set`.
///
/// # Errors
/// The first malformed row unless `opts.skip_errors` is set.
pub fn import_from_reader<R: Read>(
    db: &Database,
    data_set: DataSet,
    reader: R,
    opts: &ImportOptions,
) -> Result<ImportReport, DbError> {
    let mut report = ImportReport { collection: data_set.collection_name().to_string(), ..ImportReport::default() };
    match target(db, data_set, opts) {
        Some(col) => import_csv(&col, data_set, reader, opts, &mut report)?,
        None => report.collection_skipped = true,
    }
    Ok(report)
}

/// Imports every file in `paths`, plain CSV or `.deflate`, in order.
///
/// # Errors
/// `Io` for unreadable files, or the first malformed row unless
/// `opts.skip_errors` is set.
pub fn import_files<P: AsRef<Path>>(
    db: &Database,
    data_set: DataSet,
    paths: &[P],
    opts: &ImportOptions,
) -> Result<ImportReport, DbError> {
    let mut report = ImportReport { collection: data_set.collection_name().to_string(), ..ImportReport::default() };
    let Some(col) = target(db, data_set, opts) else {
        report.collection_skipped = true;
        return Ok(report);
    };
    for p in paths {
        let path = p.as_ref();
        log::info!("import: path={}, collection={}", path.display(), col.name());
        let before = report.inserted;
        import_csv(&col, data_set, open_input(path)?, opts, &mut report)?;
        log::info!("import: {} documents from {}", report.inserted - before, path.display());
    }
    log::info!(
        "import into {} done: {} inserted, {} skipped",
        col.name(),
        report.inserted,
        report.skipped
    );
    Ok(report)
}

/// # Errors
/// See [`import_files`].
pub fn import_rankings<P: AsRef<Path>>(db: &Database, paths: &[P], opts: &ImportOptions) -> Result<ImportReport, DbError> {
    import_files(db, DataSet::Rankings, paths, opts)
}

/// # Errors
/// See [`import_files`].
pub fn import_uservisits<P: AsRef<Path>>(
    db: &Database,
    paths: &[P],
    opts: &ImportOptions,
) -> Result<ImportReport, DbError> {
    import_files(db, DataSet::UserVisits, paths, opts)
}
